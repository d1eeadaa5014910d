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

use super::GroundStation;
use crate::errors::MsrError;
use crate::io::{epoch_from_str, epoch_to_str};
use crate::linalg::{Matrix3, Vector3, Vector6};
use crate::time::Epoch;
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Earth gravitational parameter in km^3/s^2
pub const EARTH_GM_KM3_S2: f64 = 398_600.441_5;

/// Provides the inertial state of the moving participants of a measurement (spacecraft, relays).
///
/// This is the only thing the measurement models need from a propagator: one instance is shared by
/// the manager and every model which solves for light time. The manager never mutates it.
pub trait StateProvider: fmt::Debug + Send + Sync {
    /// Returns the position and velocity (km, km/s) of the named participant at the provided epoch,
    /// or None if this provider does not know that participant.
    fn state(&self, participant: &str, epoch: Epoch) -> Option<Vector6<f64>>;
}

/// Keplerian orbital elements of a two-body orbit around the Earth.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeplerianOrbit {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    pub sma_km: f64,
    pub ecc: f64,
    pub inc_deg: f64,
    pub raan_deg: f64,
    pub aop_deg: f64,
    pub ta_deg: f64,
}

impl KeplerianOrbit {
    /// Propagates this orbit to the provided epoch, returning the inertial position and velocity.
    pub fn state_at(&self, epoch: Epoch) -> Vector6<f64> {
        let e = self.ecc;
        let a = self.sma_km;
        let mean_motion = (EARTH_GM_KM3_S2 / a.powi(3)).sqrt();

        let ta0 = self.ta_deg.to_radians();
        let ea0 = 2.0 * (((1.0 - e) / (1.0 + e)).sqrt() * (ta0 * 0.5).tan()).atan();
        let ma = ea0 - e * ea0.sin() + mean_motion * (epoch - self.epoch).to_seconds();

        // Newton iterations on Kepler's equation
        let mut ea = ma;
        for _ in 0..50 {
            let delta = (ea - e * ea.sin() - ma) / (1.0 - e * ea.cos());
            ea -= delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }

        let ta = 2.0 * ((1.0 + e).sqrt() * (ea * 0.5).sin()).atan2((1.0 - e).sqrt() * (ea * 0.5).cos());
        let radius = a * (1.0 - e * ea.cos());
        let p = a * (1.0 - e.powi(2));
        let (sin_ta, cos_ta) = ta.sin_cos();

        let r_pqw = Vector3::new(radius * cos_ta, radius * sin_ta, 0.0);
        let v_pqw = Vector3::new(-sin_ta, e + cos_ta, 0.0) * (EARTH_GM_KM3_S2 / p).sqrt();

        let dcm = self.perifocal_to_inertial();
        let r = dcm * r_pqw;
        let v = dcm * v_pqw;
        Vector6::new(r.x, r.y, r.z, v.x, v.y, v.z)
    }

    fn perifocal_to_inertial(&self) -> Matrix3<f64> {
        let (so, co) = self.raan_deg.to_radians().sin_cos();
        let (si, ci) = self.inc_deg.to_radians().sin_cos();
        let (sw, cw) = self.aop_deg.to_radians().sin_cos();
        Matrix3::new(
            co * cw - so * sw * ci,
            -co * sw - so * cw * ci,
            so * si,
            so * cw + co * sw * ci,
            -so * sw + co * cw * ci,
            -co * si,
            sw * si,
            cw * si,
            ci,
        )
    }

    /// Orbital period in seconds
    pub fn period_s(&self) -> f64 {
        std::f64::consts::TAU * (self.sma_km.powi(3) / EARTH_GM_KM3_S2).sqrt()
    }
}

/// A two-body propagator of named spacecraft.
#[derive(Clone, Debug, Default)]
pub struct KeplerianProvider {
    pub orbits: IndexMap<String, KeplerianOrbit>,
}

impl KeplerianProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orbit(mut self, name: &str, orbit: KeplerianOrbit) -> Self {
        self.orbits.insert(name.to_string(), orbit);
        self
    }
}

impl StateProvider for KeplerianProvider {
    fn state(&self, participant: &str, epoch: Epoch) -> Option<Vector6<f64>> {
        self.orbits.get(participant).map(|orbit| orbit.state_at(epoch))
    }
}

/// Resolves participant names to states: ground stations first, then the shared propagator.
#[derive(Copy, Clone)]
pub struct Participants<'a> {
    pub stations: &'a IndexMap<String, GroundStation>,
    pub provider: Option<&'a dyn StateProvider>,
}

impl<'a> Participants<'a> {
    pub fn station(&self, name: &str) -> Option<&'a GroundStation> {
        self.stations.get(name)
    }

    pub fn state(&self, name: &str, epoch: Epoch) -> Result<Vector6<f64>, MsrError> {
        if let Some(gs) = self.stations.get(name) {
            return Ok(gs.state_at(epoch));
        }
        let provider = self.provider.ok_or(MsrError::PropagatorNotSet {
            action: "compute the state of a spacecraft",
        })?;
        provider
            .state(name, epoch)
            .ok_or_else(|| MsrError::UnknownParticipant {
                name: name.to_string(),
                epoch,
            })
    }
}
