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

use super::station::EARTH_EQUATORIAL_RADIUS_KM;
use super::{EARTH_GM_KM3_S2, SPEED_OF_LIGHT_KM_S};
use crate::errors::MsrError;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zenith tropospheric delay at sea level, in km
const ZENITH_TROPO_DELAY_KM: f64 = 2.3e-3;
/// Scale height of the zenith tropospheric delay, in km
const TROPO_SCALE_HEIGHT_KM: f64 = 8.6;
/// Vertical total electron content of the nominal ionosphere, in electrons/m^2
const NOMINAL_VTEC: f64 = 1.0e17;
/// Height of the thin shell ionosphere, in km
const IONO_SHELL_HEIGHT_KM: f64 = 350.0;
/// Mapping functions blow up at the horizon, so elevations are floored to this value (degrees).
const MIN_MAPPING_ELEVATION_DEG: f64 = 3.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TroposphereModel {
    #[default]
    None,
    HopfieldSaastamoinen,
    Marini,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IonosphereModel {
    #[default]
    None,
    IRI2007,
}

impl FromStr for TroposphereModel {
    type Err = MsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "None" => Ok(Self::None),
            "HopfieldSaastamoinen" => Ok(Self::HopfieldSaastamoinen),
            "Marini" => Ok(Self::Marini),
            _ => Err(MsrError::UnresolvedReference {
                owner: "troposphere selection".to_string(),
                kind: "troposphere model",
                name: s.to_string(),
            }),
        }
    }
}

impl FromStr for IonosphereModel {
    type Err = MsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "None" => Ok(Self::None),
            "IRI2007" => Ok(Self::IRI2007),
            _ => Err(MsrError::UnresolvedReference {
                owner: "ionosphere selection".to_string(),
                kind: "ionosphere model",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TroposphereModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for IonosphereModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TroposphereModel {
    /// Slant path delay in km for a signal seen at the provided elevation from a station at the provided height.
    pub fn delay_km(self, elevation_deg: f64, station_height_km: f64) -> f64 {
        let el = elevation_deg.max(MIN_MAPPING_ELEVATION_DEG).to_radians();
        let zenith = ZENITH_TROPO_DELAY_KM * (-station_height_km / TROPO_SCALE_HEIGHT_KM).exp();
        match self {
            Self::None => 0.0,
            Self::HopfieldSaastamoinen => zenith / el.sin(),
            Self::Marini => zenith / (el.sin() + 0.00143 / (el.tan() + 0.0445)),
        }
    }
}

impl IonosphereModel {
    /// Slant path delay in km for a signal of the provided frequency seen at the provided elevation.
    pub fn delay_km(self, elevation_deg: f64, frequency_hz: f64) -> f64 {
        match self {
            Self::None => 0.0,
            Self::IRI2007 => {
                if frequency_hz <= 0.0 {
                    return 0.0;
                }
                let el = elevation_deg.max(MIN_MAPPING_ELEVATION_DEG).to_radians();
                let ratio = EARTH_EQUATORIAL_RADIUS_KM * el.cos()
                    / (EARTH_EQUATORIAL_RADIUS_KM + IONO_SHELL_HEIGHT_KM);
                let mapping = 1.0 / (1.0 - ratio.powi(2)).sqrt();
                40.3 * NOMINAL_VTEC / frequency_hz.powi(2) * mapping * 1e-3
            }
        }
    }
}

/// Shapiro delay, in km, of a signal between two points at the provided distances from the Earth center.
pub fn shapiro_delay_km(r1_km: f64, r2_km: f64, range_km: f64) -> f64 {
    let denom = r1_km + r2_km - range_km;
    if denom <= 0.0 {
        return 0.0;
    }
    2.0 * EARTH_GM_KM3_S2 / SPEED_OF_LIGHT_KM_S.powi(2) * ((r1_km + r2_km + range_km) / denom).ln()
}

#[cfg(test)]
mod corrections_ut {
    use super::*;

    #[test]
    fn troposphere_grows_toward_horizon() {
        for model in [TroposphereModel::HopfieldSaastamoinen, TroposphereModel::Marini] {
            let zenith = model.delay_km(90.0, 0.0);
            assert!((zenith - ZENITH_TROPO_DELAY_KM).abs() < 1e-5, "{model}");
            assert!(model.delay_km(10.0, 0.0) > 5.0 * zenith);
            assert!(model.delay_km(10.0, 2.0) < model.delay_km(10.0, 0.0));
        }
        assert_eq!(TroposphereModel::None.delay_km(10.0, 0.0), 0.0);
        assert_eq!(
            TroposphereModel::from_str("Marini").unwrap(),
            TroposphereModel::Marini
        );
        assert!(TroposphereModel::from_str("Niell").is_err());
    }

    #[test]
    fn ionosphere_scales_with_frequency() {
        let s_band = IonosphereModel::IRI2007.delay_km(45.0, 2.1e9);
        let x_band = IonosphereModel::IRI2007.delay_km(45.0, 8.4e9);
        assert!((s_band / x_band - 16.0).abs() < 1e-9);
        // A few meters in S-band
        assert!(s_band > 1e-3 && s_band < 2e-2, "{s_band}");
    }

    #[test]
    fn shapiro_is_centimetric_in_leo() {
        let delay = shapiro_delay_km(6378.0, 7000.0, 1500.0);
        assert!(delay > 0.0 && delay < 1e-4, "{delay}");
    }
}
