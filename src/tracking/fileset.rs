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

use super::TrackingDataAdapter;
use crate::errors::MsrError;
use crate::io::ConfigRepr;
use crate::msr::{
    IonosphereModel, LightTimeCfg, MeasurementType, ObservationData, TroposphereModel, WhiteNoise,
    DEFAULT_UPLINK_FREQUENCY_HZ,
};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use typed_builder::TypedBuilder;

/// One signal path strand and the measurement types which are computed on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Participants of the strand, starting with the tracking station
    pub strand: Vec<String>,
    pub types: Vec<MeasurementType>,
}

impl TrackingConfig {
    pub fn new(strand: &[&str], types: &[MeasurementType]) -> Self {
        Self {
            strand: strand.iter().map(|s| s.to_string()).collect(),
            types: types.to_vec(),
        }
    }
}

fn default_frequency() -> f64 {
    DEFAULT_UPLINK_FREQUENCY_HZ
}

/// A user facing group of tracking configurations, with the data files they are read from.
///
/// Each (strand, type) pair of the tracking configurations becomes one [TrackingDataAdapter].
/// If no tracking configuration is provided, the measurement manager derives them from the
/// observations it loads from the files of this set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct TrackingFileSet {
    pub name: String,
    #[builder(default)]
    #[serde(default)]
    pub configs: Vec<TrackingConfig>,
    /// Names of the observation data files
    #[builder(default)]
    #[serde(default)]
    pub files: Vec<String>,
    /// Names of the ramp table data files
    #[builder(default)]
    #[serde(default)]
    pub ramp_tables: Vec<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub light_time: Option<LightTimeCfg>,
    #[builder(default)]
    #[serde(default)]
    pub use_relativity: bool,
    #[builder(default)]
    #[serde(default)]
    pub troposphere: TroposphereModel,
    #[builder(default)]
    #[serde(default)]
    pub ionosphere: IonosphereModel,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub noise: Option<WhiteNoise>,
    #[builder(default)]
    #[serde(default)]
    pub bias: f64,
    #[builder(default = DEFAULT_UPLINK_FREQUENCY_HZ)]
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub range_modulo: Option<f64>,
}

impl TrackingFileSet {
    /// Adds the strand and type of the observation to the tracking configurations, returns whether
    /// this created a new (strand, type) pair.
    pub fn add_config_from_observation(&mut self, obs: &ObservationData) -> bool {
        match self.configs.iter_mut().find(|c| c.strand == obs.participants) {
            Some(cfg) if cfg.types.contains(&obs.msr_type) => false,
            Some(cfg) => {
                cfg.types.push(obs.msr_type);
                true
            }
            None => {
                self.configs.push(TrackingConfig {
                    strand: obs.participants.clone(),
                    types: vec![obs.msr_type],
                });
                true
            }
        }
    }

    /// Whether this set reads the named data file, as observations or as ramp tables
    pub fn uses_file(&self, name: &str) -> bool {
        self.files.iter().chain(self.ramp_tables.iter()).any(|f| f == name)
    }

    /// Builds one adapter per (strand, type) pair of the tracking configurations.
    pub fn build_adapters(&self) -> Result<Vec<TrackingDataAdapter>, MsrError> {
        let mut adapters = Vec::new();
        for cfg in &self.configs {
            for msr_type in &cfg.types {
                adapters.push(TrackingDataAdapter::from_file_set(self, &cfg.strand, *msr_type)?);
            }
        }
        Ok(adapters)
    }
}

impl ConfigRepr for TrackingFileSet {}

impl fmt::Display for TrackingFileSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "tracking file set {} ({} configuration(s), files {:?})",
            self.name,
            self.configs.len(),
            self.files
        )
    }
}
