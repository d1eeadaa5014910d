/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::provider::Participants;
use super::SPEED_OF_LIGHT_KM_S;
use crate::errors::MsrError;
use crate::linalg::{Vector3, Vector6};
use crate::time::{Epoch, TimeUnits};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Convergence settings of the light-time iteration.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightTimeCfg {
    /// Iteration stops when the light time changes by less than this, in seconds
    pub tolerance_s: f64,
    pub max_iterations: usize,
}

impl Default for LightTimeCfg {
    fn default() -> Self {
        Self {
            tolerance_s: 1e-9,
            max_iterations: 10,
        }
    }
}

/// One leg of a signal path: `receiver` gets at `rx_epoch` what `transmitter` sent at `tx_epoch`.
#[derive(Clone, Debug, PartialEq)]
pub struct Leg {
    pub receiver: String,
    pub transmitter: String,
    pub rx_epoch: Epoch,
    pub tx_epoch: Epoch,
    pub rx_state: Vector6<f64>,
    pub tx_state: Vector6<f64>,
}

impl Leg {
    /// Builds a leg without light time, i.e. both ends are taken at the same epoch.
    pub fn instantaneous(
        receiver: &str,
        transmitter: &str,
        epoch: Epoch,
        participants: &Participants,
    ) -> Result<Self, MsrError> {
        Ok(Self {
            receiver: receiver.to_string(),
            transmitter: transmitter.to_string(),
            rx_epoch: epoch,
            tx_epoch: epoch,
            rx_state: participants.state(receiver, epoch)?,
            tx_state: participants.state(transmitter, epoch)?,
        })
    }

    /// State of the transmitter relative to the receiver
    pub fn relative_state(&self) -> Vector6<f64> {
        self.tx_state - self.rx_state
    }

    pub fn relative_position(&self) -> Vector3<f64> {
        self.relative_state().fixed_rows::<3>(0).into_owned()
    }

    pub fn range_km(&self) -> f64 {
        self.relative_position().norm()
    }

    pub fn range_rate_km_s(&self) -> f64 {
        let rel = self.relative_state();
        let rho = rel.fixed_rows::<3>(0);
        let range = rho.norm();
        if range < f64::EPSILON {
            return 0.0;
        }
        rho.dot(&rel.fixed_rows::<3>(3)) / range
    }

    pub fn light_time_s(&self) -> f64 {
        (self.rx_epoch - self.tx_epoch).to_seconds()
    }

    /// Whether the provided participant is an end of this leg
    pub fn involves(&self, name: &str) -> bool {
        self.receiver == name || self.transmitter == name
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Converged,
    Failed,
}

/// A light-time event: the search for the transmission epoch of one leg of a signal path.
///
/// Events are created by the measurement models when calculating with events enabled, and are
/// owned by the measurement manager until processed.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: usize,
    /// Index of the leg in the signal path of the owning measurement
    pub leg: usize,
    pub receiver: String,
    pub transmitter: String,
    pub rx_epoch: Epoch,
    pub light_time_s: f64,
    pub iterations: usize,
    pub status: EventStatus,
    cfg: LightTimeCfg,
}

impl Event {
    pub fn new(
        id: usize,
        leg: usize,
        receiver: &str,
        transmitter: &str,
        rx_epoch: Epoch,
        cfg: LightTimeCfg,
    ) -> Self {
        Self {
            id,
            leg,
            receiver: receiver.to_string(),
            transmitter: transmitter.to_string(),
            rx_epoch,
            light_time_s: 0.0,
            iterations: 0,
            status: EventStatus::Pending,
            cfg,
        }
    }

    /// Iterates on the light time until convergence.
    ///
    /// Returns the solved leg, or None if the iteration did not converge within the maximum number of
    /// iterations, in which case the status is set to Failed. Errors are reserved for participants
    /// which cannot be located at all.
    pub fn locate(&mut self, participants: &Participants) -> Result<Option<Leg>, MsrError> {
        let rx_state = participants.state(&self.receiver, self.rx_epoch)?;
        let rx_pos = rx_state.fixed_rows::<3>(0).into_owned();

        let mut tau = self.light_time_s;
        while self.iterations < self.cfg.max_iterations {
            self.iterations += 1;
            let tx_epoch = self.rx_epoch - tau.seconds();
            let tx_state = participants.state(&self.transmitter, tx_epoch)?;
            let next_tau = (tx_state.fixed_rows::<3>(0) - rx_pos).norm() / SPEED_OF_LIGHT_KM_S;
            let delta = (next_tau - tau).abs();
            tau = next_tau;
            self.light_time_s = tau;
            if delta < self.cfg.tolerance_s {
                self.status = EventStatus::Converged;
                let tx_epoch = self.rx_epoch - tau.seconds();
                return Ok(Some(Leg {
                    receiver: self.receiver.clone(),
                    transmitter: self.transmitter.clone(),
                    rx_epoch: self.rx_epoch,
                    tx_epoch,
                    rx_state,
                    tx_state: participants.state(&self.transmitter, tx_epoch)?,
                }));
            }
        }
        self.status = EventStatus::Failed;
        Ok(None)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "light-time event #{} ({} <- {} @ {}): {:?} after {} iterations, tau = {:.9} s",
            self.id,
            self.receiver,
            self.transmitter,
            self.rx_epoch,
            self.status,
            self.iterations,
            self.light_time_s
        )
    }
}
