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

use crate::errors::{InvalidEpochSnafu, MsrError, UnknownEpochFormatSnafu};
use crate::time::{Duration, Epoch, TimeUnits, Unit};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use std::str::FromStr;

/// Number of days between the modified Julian date and the 1941-01-05T12:00:00 reference of the ModJulian formats.
pub const MOD_JULIAN_OFFSET_DAYS: f64 = 29_999.5;
/// A.1 atomic time is ahead of TAI by this many seconds.
pub const A1_MINUS_TAI_S: f64 = 0.034_381_7;
/// Terrestrial time is ahead of TAI by this many seconds.
pub const TT_MINUS_TAI_S: f64 = 32.184;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSystem {
    A1,
    TAI,
    UTC,
    TT,
}

impl TimeSystem {
    /// Offset from TAI in seconds, None for UTC which requires the leap second table.
    fn offset_from_tai_s(self) -> Option<f64> {
        match self {
            Self::A1 => Some(A1_MINUS_TAI_S),
            Self::TAI => Some(0.0),
            Self::TT => Some(TT_MINUS_TAI_S),
            Self::UTC => None,
        }
    }
}

/// Epoch formats accepted in tracking data configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochFormat {
    A1ModJulian,
    TAIModJulian,
    UTCModJulian,
    TTModJulian,
    A1Gregorian,
    TAIGregorian,
    UTCGregorian,
    TTGregorian,
}

impl EpochFormat {
    pub fn time_system(self) -> TimeSystem {
        match self {
            Self::A1ModJulian | Self::A1Gregorian => TimeSystem::A1,
            Self::TAIModJulian | Self::TAIGregorian => TimeSystem::TAI,
            Self::UTCModJulian | Self::UTCGregorian => TimeSystem::UTC,
            Self::TTModJulian | Self::TTGregorian => TimeSystem::TT,
        }
    }

    pub fn is_gregorian(self) -> bool {
        matches!(
            self,
            Self::A1Gregorian | Self::TAIGregorian | Self::UTCGregorian | Self::TTGregorian
        )
    }
}

impl FromStr for EpochFormat {
    type Err = MsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A1ModJulian" => Ok(Self::A1ModJulian),
            "TAIModJulian" => Ok(Self::TAIModJulian),
            "UTCModJulian" => Ok(Self::UTCModJulian),
            "TTModJulian" => Ok(Self::TTModJulian),
            "A1Gregorian" => Ok(Self::A1Gregorian),
            "TAIGregorian" => Ok(Self::TAIGregorian),
            "UTCGregorian" => Ok(Self::UTCGregorian),
            "TTGregorian" => Ok(Self::TTGregorian),
            _ => UnknownEpochFormatSnafu { format: s }.fail(),
        }
    }
}

impl fmt::Display for EpochFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Converts epochs between the ModJulian and Gregorian representations of the A.1, TAI, UTC and TT time systems.
///
/// The converter holds no state: it is built once by the caller and handed by reference to
/// whatever needs to turn a configuration string into an [Epoch].
#[derive(Copy, Clone, Debug, Default)]
pub struct TimeConverter;

impl TimeConverter {
    pub fn new() -> Self {
        Self
    }

    /// Converts `from_value`, expressed in `from_format`, into `to_format`.
    /// Returns the ModJulian value in the target time system and the string representation in the target format.
    pub fn convert(
        &self,
        from_format: &str,
        from_value: &str,
        to_format: &str,
    ) -> Result<(f64, String), MsrError> {
        let from_format = EpochFormat::from_str(from_format)?;
        let to_format = EpochFormat::from_str(to_format)?;
        let epoch = self.to_epoch(from_format, from_value)?;
        Ok(self.from_epoch(epoch, to_format))
    }

    /// Builds an epoch from its representation in the provided format.
    pub fn to_epoch(&self, format: EpochFormat, value: &str) -> Result<Epoch, MsrError> {
        let system = format.time_system();
        if format.is_gregorian() {
            let (y, m, d, hh, mm, ss, ns) = parse_gregorian(value).map_err(|msg| {
                MsrError::InvalidEpoch {
                    format: format.to_string(),
                    value: value.to_string(),
                    msg,
                }
            })?;
            let epoch = match system.offset_from_tai_s() {
                None => Epoch::maybe_from_gregorian_utc(y, m, d, hh, mm, ss, ns),
                Some(offset_s) => Epoch::maybe_from_gregorian_tai(y, m, d, hh, mm, ss, ns)
                    .map(|epoch| epoch - offset_s.seconds()),
            };
            epoch.map_err(|e| MsrError::InvalidEpoch {
                format: format.to_string(),
                value: value.to_string(),
                msg: e.to_string(),
            })
        } else {
            let days = value.trim().parse::<f64>().map_err(|e| MsrError::InvalidEpoch {
                format: format.to_string(),
                value: value.to_string(),
                msg: e.to_string(),
            })?;
            ensure!(
                days.is_finite(),
                InvalidEpochSnafu {
                    format: format.to_string(),
                    value,
                    msg: "not a finite number"
                }
            );
            // Half of the span of a duration, which leaves room for the time system offsets
            ensure!(
                days.abs() < Duration::MAX.to_unit(Unit::Day) / 2.0,
                InvalidEpochSnafu {
                    format: format.to_string(),
                    value,
                    msg: "outside of the representable epochs"
                }
            );
            Ok(self.from_mod_julian(system, days))
        }
    }

    /// Builds an epoch from a ModJulian day count in the provided time system.
    pub fn from_mod_julian(&self, system: TimeSystem, days: f64) -> Epoch {
        let mjd = days + MOD_JULIAN_OFFSET_DAYS;
        match system.offset_from_tai_s() {
            None => Epoch::from_mjd_in_time_scale(mjd, crate::time::TimeScale::UTC),
            Some(offset_s) => {
                Epoch::from_mjd_in_time_scale(mjd, crate::time::TimeScale::TAI) - offset_s.seconds()
            }
        }
    }

    /// Returns the ModJulian day count of this epoch in the provided time system.
    pub fn to_mod_julian(&self, epoch: Epoch, system: TimeSystem) -> f64 {
        match system.offset_from_tai_s() {
            None => epoch.to_mjd_utc_days() - MOD_JULIAN_OFFSET_DAYS,
            Some(offset_s) => {
                (epoch + offset_s.seconds()).to_mjd_tai_days() - MOD_JULIAN_OFFSET_DAYS
            }
        }
    }

    /// Returns the ModJulian value and the formatted string of this epoch in the provided format.
    pub fn from_epoch(&self, epoch: Epoch, format: EpochFormat) -> (f64, String) {
        let system = format.time_system();
        let mjd = self.to_mod_julian(epoch, system);
        if format.is_gregorian() {
            let (y, m, d, hh, mm, ss, ns) = match system.offset_from_tai_s() {
                None => epoch.round(1.milliseconds()).to_gregorian_utc(),
                Some(offset_s) => (epoch + offset_s.seconds())
                    .round(1.milliseconds())
                    .to_gregorian_tai(),
            };
            let month = MONTHS[(m as usize).clamp(1, 12) - 1];
            (
                mjd,
                format!(
                    "{d:02} {month} {y:04} {hh:02}:{mm:02}:{ss:02}.{:03}",
                    ns / 1_000_000
                ),
            )
        } else {
            (mjd, format!("{mjd:.11}"))
        }
    }
}

/// Parses `DD Mon YYYY HH:MM:SS.sss`.
fn parse_gregorian(value: &str) -> Result<(i32, u8, u8, u8, u8, u8, u32), String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 4 {
        return Err("expected `DD Mon YYYY HH:MM:SS.sss`".to_string());
    }
    let day = parts[0]
        .parse::<u8>()
        .map_err(|e| format!("day `{}`: {e}", parts[0]))?;
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(parts[1]))
        .ok_or_else(|| format!("unknown month `{}`", parts[1]))? as u8
        + 1;
    let year = parts[2]
        .parse::<i32>()
        .map_err(|e| format!("year `{}`: {e}", parts[2]))?;

    let hms: Vec<&str> = parts[3].split(':').collect();
    if hms.len() != 3 {
        return Err(format!("time of day `{}` is not HH:MM:SS.sss", parts[3]));
    }
    let hours = hms[0]
        .parse::<u8>()
        .map_err(|e| format!("hours `{}`: {e}", hms[0]))?;
    let minutes = hms[1]
        .parse::<u8>()
        .map_err(|e| format!("minutes `{}`: {e}", hms[1]))?;
    let (whole, frac) = match hms[2].split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (hms[2], ""),
    };
    let seconds = whole
        .parse::<u8>()
        .map_err(|e| format!("seconds `{whole}`: {e}"))?;
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("fraction of seconds `{frac}` is invalid"));
    }
    let nanos = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}")
            .parse::<u32>()
            .map_err(|e| format!("fraction of seconds `{frac}`: {e}"))?
    };
    if day == 0 || day > 31 || hours > 23 || minutes > 59 || seconds > 60 {
        return Err("calendar field out of range".to_string());
    }
    Ok((year, month, day, hours, minutes, seconds, nanos))
}
