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

/*! # nyx-msr

Measurement management for orbit determination and tracking data simulation.

The [manager::MeasurementManager] sits between the tracking data model and its two consumers:
a measurement simulator, which synthesizes observations and writes them to tracking data files,
and a batch estimator, which reads recorded observations and needs computed values and partial
derivatives at every observation epoch.
*/

/// Observation and ramp table records, measurement types, models, light-time events and participants.
pub mod msr;

/// Tracking data files and the streams which read and write them.
pub mod datafile;

/// Tracking systems, tracking file sets and the adapters built from them.
pub mod tracking;

/// The measurement manager, the single interface used by simulators and estimators.
pub mod manager;

mod errors;
/// Functions which may fail will return this error.
pub use self::errors::MsrError;

/// Configuration files and epoch conversions.
pub mod io;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

pub mod prelude {
    pub use crate::datafile::{
        DataFile, DataFileCfg, FilterKind, GmdStream, MemoryStream, ObsStream,
        ObservationFilter, RampTableStream, StreamCfg,
    };
    pub use crate::io::{ConfigRepr, EpochFormat, TimeConverter};
    pub use crate::manager::{Attachment, MeasurementManager, MsrHandle};
    pub use crate::msr::prelude::*;
    pub use crate::tracking::{
        TrackingConfig, TrackingDataAdapter, TrackingFileSet, TrackingSystem, TrackingSystemKind,
    };
    pub use crate::MsrError;

    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}
