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

use crate::io::ConfigRepr;
use crate::linalg::{Matrix3, Vector3, Vector6};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

/// WGS-84 equatorial radius in km
pub const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;
/// WGS-84 flattening
pub const EARTH_FLATTENING: f64 = 1.0 / 298.257_223_563;
/// Mean rotation rate of the Earth in rad/s
pub const EARTH_ANGULAR_VELOCITY_RAD_S: f64 = 7.292_115_146_706_979e-5;
/// Greenwich mean sidereal angle at J2000, in degrees
const GMST_J2000_DEG: f64 = 280.460_618_37;

/// GroundStation defines a tracking station fixed on the surface of a rotating Earth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundStation {
    pub name: String,
    /// in degrees
    pub latitude_deg: f64,
    /// in degrees
    pub longitude_deg: f64,
    /// in km
    pub height_km: f64,
    /// in degrees
    #[serde(default)]
    pub elevation_mask_deg: f64,
}

impl GroundStation {
    /// Initializes a point on the surface of the Earth, with no elevation mask.
    pub fn from_point(name: String, latitude_deg: f64, longitude_deg: f64, height_km: f64) -> Self {
        Self {
            name,
            latitude_deg,
            longitude_deg,
            height_km,
            elevation_mask_deg: 0.0,
        }
    }

    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = elevation_mask_deg;
        self
    }

    /// Earth rotation angle at the provided epoch, in radians
    pub fn rotation_angle(epoch: Epoch) -> f64 {
        let j2000 = Epoch::from_gregorian_tai_at_noon(2000, 1, 1);
        let elapsed_s = (epoch - j2000).to_seconds();
        (GMST_J2000_DEG.to_radians() + EARTH_ANGULAR_VELOCITY_RAD_S * elapsed_s).rem_euclid(TAU)
    }

    /// Rotation from the body fixed frame to the inertial frame at the provided epoch
    fn body_to_inertial(epoch: Epoch) -> Matrix3<f64> {
        let (s, c) = Self::rotation_angle(epoch).sin_cos();
        Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
    }

    /// Position in the Earth fixed frame, in km
    pub fn body_fixed_position(&self) -> Vector3<f64> {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();
        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let n = EARTH_EQUATORIAL_RADIUS_KM / (1.0 - e2 * sin_lat.powi(2)).sqrt();
        Vector3::new(
            (n + self.height_km) * cos_lat * cos_long,
            (n + self.height_km) * cos_lat * sin_long,
            (n * (1.0 - e2) + self.height_km) * sin_lat,
        )
    }

    /// Inertial position and velocity of this station at the provided epoch, in km and km/s
    pub fn state_at(&self, epoch: Epoch) -> Vector6<f64> {
        let r = Self::body_to_inertial(epoch) * self.body_fixed_position();
        let v = Vector3::new(0.0, 0.0, EARTH_ANGULAR_VELOCITY_RAD_S).cross(&r);
        Vector6::new(r.x, r.y, r.z, v.x, v.y, v.z)
    }

    /// Computes the azimuth and elevation, both in degrees, of the provided inertial position seen from this station.
    pub fn azimuth_elevation_of(&self, target: &Vector3<f64>, epoch: Epoch) -> (f64, f64) {
        let rot = Self::body_to_inertial(epoch);
        let rho_inertial = target - rot * self.body_fixed_position();
        let rho = rot.transpose() * rho_inertial;

        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();

        let south = sin_lat * cos_long * rho.x + sin_lat * sin_long * rho.y - cos_lat * rho.z;
        let east = -sin_long * rho.x + cos_long * rho.y;
        let zenith = cos_lat * cos_long * rho.x + cos_lat * sin_long * rho.y + sin_lat * rho.z;

        let range = rho.norm();
        if range < f64::EPSILON {
            return (0.0, 90.0);
        }
        let elevation_deg = (zenith / range).clamp(-1.0, 1.0).asin().to_degrees();
        let azimuth_deg = east.atan2(-south).to_degrees().rem_euclid(360.0);
        (azimuth_deg, elevation_deg)
    }
}

impl Default for GroundStation {
    fn default() -> Self {
        Self {
            name: "UNDEFINED".to_string(),
            latitude_deg: 0.0,
            longitude_deg: 0.0,
            height_km: 0.0,
            elevation_mask_deg: 0.0,
        }
    }
}

impl ConfigRepr for GroundStation {}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m)",
            self.name,
            self.latitude_deg,
            self.longitude_deg,
            self.height_km * 1e3,
        )
    }
}
