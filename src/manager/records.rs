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

use crate::linalg::DMatrix;
use crate::msr::{Leg, MeasurementData, MeasurementModel};
use crate::time::Epoch;
use crate::tracking::{TrackingDataAdapter, TrackingFileSet, TrackingSystem};
use std::fmt;

/// The objects which may be attached to a measurement manager.
#[derive(Clone, Debug)]
pub enum Attachment {
    Model(MeasurementModel),
    System(TrackingSystem),
    Adapter(TrackingDataAdapter),
    FileSet(TrackingFileSet),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::Model(m) => &m.name,
            Self::System(s) => &s.name,
            Self::Adapter(a) => &a.name,
            Self::FileSet(f) => &f.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(_) => "measurement model",
            Self::System(_) => "tracking system",
            Self::Adapter(_) => "tracking data adapter",
            Self::FileSet(_) => "tracking file set",
        }
    }
}

impl From<MeasurementModel> for Attachment {
    fn from(model: MeasurementModel) -> Self {
        Self::Model(model)
    }
}

impl From<TrackingSystem> for Attachment {
    fn from(system: TrackingSystem) -> Self {
        Self::System(system)
    }
}

impl From<TrackingDataAdapter> for Attachment {
    fn from(adapter: TrackingDataAdapter) -> Self {
        Self::Adapter(adapter)
    }
}

impl From<TrackingFileSet> for Attachment {
    fn from(set: TrackingFileSet) -> Self {
        Self::FileSet(set)
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// Stable handle of a measurement of the manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsrHandle(pub(crate) usize);

impl MsrHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MsrHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One measurement of the manager: a model, where it comes from, and its latest calculation.
#[derive(Clone, Debug)]
pub(crate) struct MsrRecord {
    pub id: i32,
    /// Index of the attachment this measurement was built from
    pub owner: usize,
    pub model: MeasurementModel,
    pub obs_files: Vec<String>,
    pub ramp_tables: Vec<String>,
    pub data: MeasurementData,
    /// Solved legs of the signal path of the latest calculation
    pub legs: Vec<Leg>,
    pub derivatives: Option<DMatrix<f64>>,
    /// Whether noise must be added once the pending events are processed
    pub noise_on_final: bool,
    /// Whether the latest calculation was not written yet
    pub fresh: bool,
}

impl MsrRecord {
    pub fn new(id: i32, owner: usize, model: MeasurementModel) -> Self {
        let data = MeasurementData::new(
            model.msr_type,
            Epoch::from_tai_seconds(0.0),
            model.participants.clone(),
        );
        Self {
            id,
            owner,
            model,
            obs_files: Vec::new(),
            ramp_tables: Vec::new(),
            data,
            legs: Vec::new(),
            derivatives: None,
            noise_on_final: false,
            fresh: false,
        }
    }

    /// Whether this measurement may compute an observation read from the provided data file
    pub fn reads_from(&self, source: Option<&str>) -> bool {
        match source {
            Some(file) if !self.obs_files.is_empty() => self.obs_files.iter().any(|f| f == file),
            _ => true,
        }
    }
}
