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

use super::MeasurementType;
use crate::io::{epoch_from_str, epoch_to_str};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Additional data attached to an observation record, as a name, a type label and a value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraData {
    pub name: String,
    pub kind: String,
    pub value: String,
}

/// One recorded measurement, as read from a tracking data file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationData {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    pub msr_type: MeasurementType,
    /// Participants of the signal path, starting with the tracking station
    pub participants: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub extra: Vec<ExtraData>,
    /// Name of the data file this observation was read from
    #[serde(default)]
    pub source: Option<String>,
}

impl ObservationData {
    pub fn new(
        epoch: Epoch,
        msr_type: MeasurementType,
        participants: Vec<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            epoch,
            msr_type,
            participants,
            values,
            extra: Vec::new(),
            source: None,
        }
    }

    /// Returns a copy of this observation with the provided extra data appended
    pub fn with_extra(mut self, name: &str, kind: &str, value: &str) -> Self {
        self.extra.push(ExtraData {
            name: name.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.msr_type.name()
    }

    pub fn type_id(&self) -> i32 {
        self.msr_type.type_id()
    }

    /// The tracking station which took this observation
    pub fn tracker(&self) -> Option<&str> {
        self.participants.first().map(|s| s.as_str())
    }

    /// Whether the provided participant is part of this observation
    pub fn involves(&self, participant: &str) -> bool {
        self.participants.iter().any(|p| p == participant)
    }
}

impl fmt::Display for ObservationData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {:?} = {:?}",
            self.epoch, self.msr_type, self.participants, self.values
        )
    }
}

/// How the transmitted frequency evolves from a ramp record until the next one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampType {
    /// The frequency jumps to the record's frequency and stays constant
    Snap,
    /// The frequency changes linearly at the record's rate
    Linear,
}

impl RampType {
    pub fn code(self) -> u8 {
        match self {
            Self::Snap => 1,
            Self::Linear => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Snap),
            2 => Some(Self::Linear),
            _ => None,
        }
    }
}

/// One record of a transmitter frequency-ramp table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampTableData {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    /// Transmitting station then spacecraft
    pub participants: Vec<String>,
    pub uplink_band: u8,
    pub ramp_type: RampType,
    pub frequency_hz: f64,
    pub rate_hz_s: f64,
    /// Name of the data file this record was read from
    #[serde(default)]
    pub source: Option<String>,
}

impl RampTableData {
    /// Transmitted frequency at the provided epoch, assuming this record is the latest one before it.
    pub fn frequency_at(&self, epoch: Epoch) -> f64 {
        match self.ramp_type {
            RampType::Snap => self.frequency_hz,
            RampType::Linear => {
                self.frequency_hz + self.rate_hz_s * (epoch - self.epoch).to_seconds()
            }
        }
    }
}

/// Returns the transmitted frequency at the provided epoch from a ramp table sorted by epoch,
/// or None if the table starts after that epoch.
pub fn ramped_frequency(table: &[RampTableData], station: &str, epoch: Epoch) -> Option<f64> {
    let latest = table.partition_point(|rec| rec.epoch <= epoch);
    table[..latest]
        .iter()
        .rev()
        .find(|rec| rec.participants.first().map(|s| s.as_str()) == Some(station))
        .map(|rec| rec.frequency_at(epoch))
}

/// A computed measurement, i.e. the value a model predicts for an observation.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementData {
    pub msr_type: MeasurementType,
    pub epoch: Epoch,
    pub participants: Vec<String>,
    pub values: Vec<f64>,
    /// Variance of each value, zero if the model has no noise configured
    pub covariance: Vec<f64>,
    pub is_feasible: bool,
    /// Empty when feasible, the blocking reason otherwise
    pub unfeasibility_reason: String,
    /// Smallest elevation, in degrees, of the signal path seen from a ground station
    pub feasibility_value: f64,
    /// Number of light-time events which must be processed before the values are final
    pub pending_events: usize,
    /// Transmitted frequency used for this measurement, if the type uses one
    pub uplink_frequency_hz: Option<f64>,
    /// Whether noise was added to the values
    pub is_noisy: bool,
}

impl MeasurementData {
    pub fn new(msr_type: MeasurementType, epoch: Epoch, participants: Vec<String>) -> Self {
        Self {
            msr_type,
            epoch,
            participants,
            values: vec![0.0; msr_type.dimension()],
            covariance: vec![0.0; msr_type.dimension()],
            is_feasible: false,
            unfeasibility_reason: "NotCalculated".to_string(),
            feasibility_value: 0.0,
            pending_events: 0,
            uplink_frequency_hz: None,
            is_noisy: false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.msr_type.name()
    }

    /// Whether the values are final, i.e. no light-time event is pending
    pub fn is_final(&self) -> bool {
        self.pending_events == 0
    }

    /// Builds the observation record which a simulator writes for this measurement
    pub fn to_observation(&self) -> ObservationData {
        ObservationData::new(
            self.epoch,
            self.msr_type,
            self.participants.clone(),
            self.values.clone(),
        )
    }
}

impl fmt::Display for MeasurementData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = if self.is_feasible {
            "feasible".to_string()
        } else {
            format!("infeasible ({})", self.unfeasibility_reason)
        };
        write!(
            f,
            "{} {} {:?} = {:?} [{}] {status}",
            self.epoch,
            self.msr_type,
            self.participants,
            self.values,
            self.msr_type.unit()
        )
    }
}
