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

use super::TrackingFileSet;
use crate::errors::MsrError;
use crate::msr::{MeasurementModel, MeasurementType};
use std::fmt;

/// Binds the measurement model of one (strand, type) pair of a tracking file set to the data
/// files of that set.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingDataAdapter {
    pub name: String,
    /// Name of the tracking file set this adapter was built from
    pub file_set: String,
    pub model: MeasurementModel,
    pub obs_files: Vec<String>,
    pub ramp_tables: Vec<String>,
}

impl TrackingDataAdapter {
    /// Builds the adapter of the provided strand and type from the settings of the file set.
    pub fn from_file_set(
        set: &TrackingFileSet,
        strand: &[String],
        msr_type: MeasurementType,
    ) -> Result<Self, MsrError> {
        let name = format!("{}_{}_{}", set.name, msr_type, strand.join("_"));
        let model = MeasurementModel {
            name: name.clone(),
            msr_type,
            participants: strand.to_vec(),
            noise: set.noise,
            bias: set.bias,
            troposphere: set.troposphere,
            ionosphere: set.ionosphere,
            use_relativity: set.use_relativity,
            light_time: set.light_time,
            frequency_hz: set.frequency_hz,
            range_modulo: set.range_modulo,
        };
        model.validate()?;
        Ok(Self {
            name,
            file_set: set.name.clone(),
            model,
            obs_files: set.files.clone(),
            ramp_tables: set.ramp_tables.clone(),
        })
    }

    /// Builds a stand alone adapter of a model, with the provided data files.
    pub fn new(model: MeasurementModel, obs_files: &[&str], ramp_tables: &[&str]) -> Result<Self, MsrError> {
        model.validate()?;
        Ok(Self {
            name: model.name.clone(),
            file_set: String::new(),
            model,
            obs_files: obs_files.iter().map(|s| s.to_string()).collect(),
            ramp_tables: ramp_tables.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl fmt::Display for TrackingDataAdapter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "adapter {} for {}", self.name, self.model)
    }
}
