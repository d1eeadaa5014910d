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

use crate::errors::{DisallowedMeasurementSnafu, MsrError, UnresolvedReferenceSnafu};
use crate::io::ConfigRepr;
use crate::msr::{IonosphereModel, MeasurementFamily, MeasurementModel, MeasurementType, TroposphereModel};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// The kinds of tracking systems, each of which restricts the measurement types it may hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingSystemKind {
    Ground,
    Optical,
    TDRSS,
    USN,
    DSN,
}

impl TrackingSystemKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ground => "GroundTrackingSystem",
            Self::Optical => "OpticalTrackingSystem",
            Self::TDRSS => "TDRSSTrackingSystem",
            Self::USN => "USNTrackingSystem",
            Self::DSN => "DSNTrackingSystem",
        }
    }

    /// Whether a measurement of the provided type may be attached to a system of this kind
    pub fn allows(self, msr_type: MeasurementType) -> bool {
        let family = msr_type.family();
        match self {
            Self::Ground => matches!(
                family,
                MeasurementFamily::Geometric | MeasurementFamily::USN | MeasurementFamily::DSN
            ),
            Self::Optical => family == MeasurementFamily::Optical,
            Self::TDRSS => {
                family == MeasurementFamily::TDRSS || msr_type == MeasurementType::Range
            }
            Self::USN => matches!(family, MeasurementFamily::USN | MeasurementFamily::Geometric),
            Self::DSN => family == MeasurementFamily::DSN,
        }
    }
}

impl fmt::Display for TrackingSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named group of measurement models which share the same media corrections and data files.
///
/// The models and data files are configured by name, and resolved when the measurement manager
/// initializes: an unresolved name aborts the initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingSystem {
    pub name: String,
    pub kind: TrackingSystemKind,
    #[serde(default)]
    pub measurements: Vec<String>,
    #[serde(default)]
    pub data_files: Vec<String>,
    #[serde(default)]
    pub troposphere: TroposphereModel,
    #[serde(default)]
    pub ionosphere: IonosphereModel,
    #[serde(skip)]
    models: Vec<MeasurementModel>,
    #[serde(skip)]
    initialized: bool,
}

impl TrackingSystem {
    pub fn new(name: &str, kind: TrackingSystemKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            measurements: Vec::new(),
            data_files: Vec::new(),
            troposphere: TroposphereModel::None,
            ionosphere: IonosphereModel::None,
            models: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_corrections(mut self, troposphere: TroposphereModel, ionosphere: IonosphereModel) -> Self {
        self.troposphere = troposphere;
        self.ionosphere = ionosphere;
        self
    }

    /// Adds the name of a measurement model, returns false if it was already listed.
    pub fn add_measurement_name(&mut self, name: &str) -> bool {
        if self.measurements.iter().any(|m| m == name) {
            return false;
        }
        self.measurements.push(name.to_string());
        self.initialized = false;
        true
    }

    /// Adds the name of a data file, returns false if it was already listed.
    pub fn add_data_file_name(&mut self, name: &str) -> bool {
        if self.data_files.iter().any(|f| f == name) {
            return false;
        }
        self.data_files.push(name.to_string());
        true
    }

    /// Attaches a measurement model to this system, which must allow its type.
    ///
    /// A model with the same name replaces the previous one. The name is added to the measurement
    /// names if it was not listed yet.
    pub fn set_ref_object(&mut self, model: MeasurementModel) -> Result<(), MsrError> {
        ensure!(
            self.kind.allows(model.msr_type),
            DisallowedMeasurementSnafu {
                msr_type: model.msr_type.name(),
                system: &self.name,
                system_type: self.kind.name()
            }
        );
        self.add_measurement_name(&model.name);
        match self.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
        Ok(())
    }

    /// Whether the named measurement model was attached
    pub fn has_model(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// Checks every configured name and pushes the media corrections into every model.
    ///
    /// `is_data_file` tells whether a data file of the provided name is known.
    pub fn initialize<F>(&mut self, is_data_file: F) -> Result<(), MsrError>
    where
        F: Fn(&str) -> bool,
    {
        for name in &self.measurements {
            ensure!(
                self.has_model(name),
                UnresolvedReferenceSnafu {
                    owner: &self.name,
                    kind: "measurement model",
                    name
                }
            );
        }
        for name in &self.data_files {
            ensure!(
                is_data_file(name),
                UnresolvedReferenceSnafu {
                    owner: &self.name,
                    kind: "data file",
                    name
                }
            );
        }
        for model in self.models.iter_mut() {
            model.set_corrections(self.troposphere, self.ionosphere);
            model.validate()?;
        }
        self.initialized = true;
        debug!("{self} initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn models(&self) -> &[MeasurementModel] {
        &self.models
    }
}

impl ConfigRepr for TrackingSystem {}

impl fmt::Display for TrackingSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} with {} measurement(s) and {} data file(s)",
            self.kind,
            self.name,
            self.measurements.len(),
            self.data_files.len()
        )
    }
}
