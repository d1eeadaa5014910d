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

use crate::errors::{MsrError, ParticipantCountSnafu, UnknownMeasurementTypeSnafu};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use std::str::FromStr;

/// Families of measurement types, used by tracking systems to restrict what may be attached to them.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementFamily {
    Geometric,
    Optical,
    USN,
    TDRSS,
    DSN,
}

/// All of the supported observable types.
///
/// The participant order of every type starts with the tracking station which receives the signal,
/// e.g. `[GS, SC]` or `[GS, TDRS, SC]` for a TDRSS relay.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasurementType {
    Range,
    RangeRate,
    AzEl,
    RaDec,
    USNTwoWayRange,
    USNTwoWayRangeRate,
    TDRSSTwoWayRange,
    DSNTwoWayRange,
    DSNTwoWayDoppler,
}

impl MeasurementType {
    pub const ALL: [Self; 9] = [
        Self::Range,
        Self::RangeRate,
        Self::AzEl,
        Self::RaDec,
        Self::USNTwoWayRange,
        Self::USNTwoWayRangeRate,
        Self::TDRSSTwoWayRange,
        Self::DSNTwoWayRange,
        Self::DSNTwoWayDoppler,
    ];

    /// Stable numerical identifier of this type, as written in tracking data files
    pub fn type_id(self) -> i32 {
        match self {
            Self::Range => 9000,
            Self::RangeRate => 9001,
            Self::AzEl => 9002,
            Self::RaDec => 9003,
            Self::USNTwoWayRange => 9004,
            Self::USNTwoWayRangeRate => 9005,
            Self::TDRSSTwoWayRange => 9006,
            Self::DSNTwoWayRange => 9007,
            Self::DSNTwoWayDoppler => 9008,
        }
    }

    pub fn from_type_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Range => "Range",
            Self::RangeRate => "RangeRate",
            Self::AzEl => "AzEl",
            Self::RaDec => "RaDec",
            Self::USNTwoWayRange => "USNTwoWayRange",
            Self::USNTwoWayRangeRate => "USNTwoWayRangeRate",
            Self::TDRSSTwoWayRange => "TDRSSTwoWayRange",
            Self::DSNTwoWayRange => "DSNTwoWayRange",
            Self::DSNTwoWayDoppler => "DSNTwoWayDoppler",
        }
    }

    pub fn family(self) -> MeasurementFamily {
        match self {
            Self::Range | Self::RangeRate => MeasurementFamily::Geometric,
            Self::AzEl | Self::RaDec => MeasurementFamily::Optical,
            Self::USNTwoWayRange | Self::USNTwoWayRangeRate => MeasurementFamily::USN,
            Self::TDRSSTwoWayRange => MeasurementFamily::TDRSS,
            Self::DSNTwoWayRange | Self::DSNTwoWayDoppler => MeasurementFamily::DSN,
        }
    }

    /// Number of values in one measurement of this type
    pub fn dimension(self) -> usize {
        match self {
            Self::AzEl | Self::RaDec => 2,
            _ => 1,
        }
    }

    pub fn participant_count(self) -> usize {
        match self {
            Self::TDRSSTwoWayRange => 3,
            _ => 2,
        }
    }

    pub fn is_two_way(self) -> bool {
        matches!(
            self,
            Self::USNTwoWayRange
                | Self::USNTwoWayRangeRate
                | Self::TDRSSTwoWayRange
                | Self::DSNTwoWayRange
                | Self::DSNTwoWayDoppler
        )
    }

    /// Whether this type measures a rate, in which case it is computed from the relative velocity of each leg.
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            Self::RangeRate | Self::USNTwoWayRangeRate | Self::DSNTwoWayDoppler
        )
    }

    pub fn is_angle(self) -> bool {
        matches!(self, Self::AzEl | Self::RaDec)
    }

    /// Whether this type is built from the transmitted frequency, and may therefore use a ramp table
    pub fn uses_frequency(self) -> bool {
        matches!(self, Self::DSNTwoWayRange | Self::DSNTwoWayDoppler)
    }

    /// Returns the expected unit of this measurement type
    pub fn unit(self) -> &'static str {
        match self {
            Self::Range | Self::USNTwoWayRange | Self::TDRSSTwoWayRange => "km",
            Self::RangeRate | Self::USNTwoWayRangeRate => "km/s",
            Self::AzEl | Self::RaDec => "deg",
            Self::DSNTwoWayRange => "RU",
            Self::DSNTwoWayDoppler => "Hz",
        }
    }

    /// Checks that the provided strand is valid for this type
    pub fn check_participants(self, participants: &[String]) -> Result<(), MsrError> {
        ensure!(
            participants.len() == self.participant_count(),
            ParticipantCountSnafu {
                msr_type: self.name(),
                need: self.participant_count(),
                got: participants.len()
            }
        );
        Ok(())
    }

    /// Returns the signal path of this measurement, ordered from the final receiver backward in time.
    ///
    /// Each consecutive pair of the returned names is one light-time leg: the first of the pair receives
    /// the signal that the second one transmitted earlier.
    pub fn signal_path(self, participants: &[String]) -> Vec<String> {
        match self {
            Self::Range | Self::RangeRate | Self::AzEl | Self::RaDec => {
                vec![participants[0].clone(), participants[1].clone()]
            }
            Self::USNTwoWayRange
            | Self::USNTwoWayRangeRate
            | Self::DSNTwoWayRange
            | Self::DSNTwoWayDoppler => vec![
                participants[0].clone(),
                participants[1].clone(),
                participants[0].clone(),
            ],
            Self::TDRSSTwoWayRange => vec![
                participants[0].clone(),
                participants[1].clone(),
                participants[2].clone(),
                participants[1].clone(),
                participants[0].clone(),
            ],
        }
    }
}

impl FromStr for MeasurementType {
    type Err = MsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match Self::ALL.into_iter().find(|t| t.name() == s) {
            Some(t) => Ok(t),
            None => UnknownMeasurementTypeSnafu { name: s }.fail(),
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
