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

use crate::datafile::DataFile;
use crate::errors::{
    DuplicateNameSnafu, IdSpaceExhaustedSnafu, InvalidHandleSnafu, InvalidStateSnafu, MsrError,
    UnresolvedReferenceSnafu,
};
use crate::msr::{
    Event, GroundStation, MeasurementData, MeasurementModel, MeasurementType, ObservationData,
    Participants, RampTableData, StateProvider,
};
use crate::time::Epoch;
use crate::tracking::{TrackingDataAdapter, TrackingFileSet};
use indexmap::{IndexMap, IndexSet};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use snafu::ensure;
use std::fmt;
use std::sync::Arc;

mod calc;
mod cursor;
mod data;
mod records;

pub use cursor::ObservationCursor;
pub use records::{Attachment, MsrHandle};
use records::MsrRecord;

/// Default first ID of the ID space of a manager
pub const DEFAULT_ID_BASE: i32 = 10_000;
/// Number of IDs available to each manager
pub const ID_SPACE_SIZE: i32 = 1_000;

/// Lifecycle of the measurement manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManagerState {
    Unconfigured,
    Ready,
    Processing { simulating: bool },
    Closed,
}

/// The measurement manager owns the measurement models, the data files and the observations of a
/// run, and is the only interface used by a measurement simulator or an estimator.
///
/// The caller drives it sequentially:
/// 1. attach the measurements, data files and ground stations, set the propagator;
/// 2. [Self::initialize] resolves every reference;
/// 3. [Self::prepare_for_processing] opens the data files, and loads the observations when estimating;
/// 4. for each observation (or simulation epoch), calculate the measurements, process their light-time
///    events, calculate the derivatives, and write the measurements when simulating;
/// 5. [Self::finalize] closes the data files.
pub struct MeasurementManager {
    state: ManagerState,
    id_base: i32,
    largest_id: i32,
    attachments: Vec<(i32, Attachment)>,
    /// Measurement models which tracking systems may reference by name
    definitions: IndexMap<String, MeasurementModel>,
    data_files: IndexMap<String, DataFile>,
    stations: IndexMap<String, GroundStation>,
    provider: Option<Arc<dyn StateProvider>>,
    records: Vec<MsrRecord>,
    observations: Vec<ObservationData>,
    cursor: ObservationCursor,
    active: Vec<MsrHandle>,
    /// Evaluation epoch when simulating
    epoch: Option<Epoch>,
    /// Ramp records keyed by the name of the data file they were read from
    ramp_tables: IndexMap<String, Vec<RampTableData>>,
    active_events: Vec<Event>,
    event_map: IndexMap<usize, MsrHandle>,
    next_event_id: usize,
    rng: Pcg64Mcg,
    written: usize,
}

impl MeasurementManager {
    pub fn new() -> Self {
        Self::with_rng(Pcg64Mcg::from_entropy())
    }

    /// Builds a manager whose simulated noise is repeatable
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Pcg64Mcg::new(seed as u128))
    }

    fn with_rng(rng: Pcg64Mcg) -> Self {
        Self {
            state: ManagerState::Unconfigured,
            id_base: DEFAULT_ID_BASE,
            largest_id: DEFAULT_ID_BASE - 1,
            attachments: Vec::new(),
            definitions: IndexMap::new(),
            data_files: IndexMap::new(),
            stations: IndexMap::new(),
            provider: None,
            records: Vec::new(),
            observations: Vec::new(),
            cursor: ObservationCursor::default(),
            active: Vec::new(),
            epoch: None,
            ramp_tables: IndexMap::new(),
            active_events: Vec::new(),
            event_map: IndexMap::new(),
            next_event_id: 0,
            rng,
            written: 0,
        }
    }

    /// Moves the ID space of this manager, so that several managers allocate disjoint IDs.
    pub fn with_id_base(mut self, id_base: i32) -> Self {
        self.id_base = id_base;
        self.largest_id = id_base - 1;
        self
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn id_base(&self) -> i32 {
        self.id_base
    }

    pub fn largest_id(&self) -> i32 {
        self.largest_id
    }

    fn allocate_id(&mut self) -> Result<i32, MsrError> {
        ensure!(
            self.largest_id + 1 < self.id_base + ID_SPACE_SIZE,
            IdSpaceExhaustedSnafu { base: self.id_base }
        );
        self.largest_id += 1;
        Ok(self.largest_id)
    }

    /// Attaches a measurement model, tracking system, tracking data adapter or tracking file set.
    ///
    /// Attaching an object whose name is already attached does nothing and returns the ID of the
    /// object already attached.
    pub fn add_measurement<A: Into<Attachment>>(&mut self, object: A) -> Result<i32, MsrError> {
        let object = object.into();
        if let Some((id, existing)) = self
            .attachments
            .iter()
            .find(|(_, a)| a.name() == object.name())
        {
            warn!("{existing} is already attached as #{id}, ignoring {object}");
            return Ok(*id);
        }
        let id = self.allocate_id()?;
        debug!("attached {object} as #{id}");
        self.attachments.push((id, object));
        self.state = ManagerState::Unconfigured;
        Ok(id)
    }

    /// Makes a measurement model available to the tracking systems which reference it by name.
    pub fn define_model(&mut self, model: MeasurementModel) -> Result<(), MsrError> {
        ensure!(
            !self.definitions.contains_key(&model.name),
            DuplicateNameSnafu {
                kind: "measurement model",
                name: &model.name
            }
        );
        self.definitions.insert(model.name.clone(), model);
        Ok(())
    }

    pub fn add_data_file(&mut self, data_file: DataFile) -> Result<(), MsrError> {
        ensure!(
            !self.data_files.contains_key(data_file.name()),
            DuplicateNameSnafu {
                kind: "data file",
                name: data_file.name()
            }
        );
        self.data_files
            .insert(data_file.name().to_string(), data_file);
        Ok(())
    }

    pub fn add_ground_station(&mut self, station: GroundStation) -> Result<(), MsrError> {
        ensure!(
            !self.stations.contains_key(&station.name),
            DuplicateNameSnafu {
                kind: "ground station",
                name: &station.name
            }
        );
        self.stations.insert(station.name.clone(), station);
        Ok(())
    }

    /// Sets the propagator shared by every measurement. Only one propagator is supported: setting
    /// a different one fails.
    pub fn set_propagator(&mut self, provider: Arc<dyn StateProvider>) -> Result<(), MsrError> {
        if let Some(current) = &self.provider {
            if !Arc::ptr_eq(current, &provider) {
                return Err(MsrError::MultiplePropagators);
            }
            return Ok(());
        }
        self.provider = Some(provider);
        Ok(())
    }

    pub(crate) fn participants(&self) -> Participants {
        Participants {
            stations: &self.stations,
            provider: self.provider.as_deref(),
        }
    }

    fn add_record(
        &mut self,
        owner: usize,
        model: MeasurementModel,
        files: &[String],
    ) -> Result<MsrHandle, MsrError> {
        // The first measurement of an attachment takes the ID returned when attaching it
        let id = if self.records.iter().any(|rec| rec.owner == owner) {
            self.allocate_id()?
        } else {
            self.attachments[owner].0
        };
        let mut record = MsrRecord::new(id, owner, model);
        for name in files {
            let is_ramp = self
                .data_files
                .get(name)
                .map_or(false, |df| df.is_ramp_table());
            if is_ramp {
                record.ramp_tables.push(name.clone());
            } else {
                record.obs_files.push(name.clone());
            }
        }
        self.records.push(record);
        Ok(MsrHandle(self.records.len() - 1))
    }

    fn check_files(&self, owner: &str, files: &[String]) -> Result<(), MsrError> {
        for name in files {
            ensure!(
                self.data_files.contains_key(name),
                UnresolvedReferenceSnafu {
                    owner,
                    kind: "data file",
                    name
                }
            );
        }
        Ok(())
    }

    /// Initializes the data files and resolves every reference of the attached objects.
    ///
    /// Any unresolved reference or disallowed measurement type is an error, and the manager must
    /// not be used to process data.
    pub fn initialize(&mut self) -> Result<(), MsrError> {
        for data_file in self.data_files.values_mut() {
            data_file.initialize()?;
        }

        // Resolve the models referenced by name by the tracking systems
        let known_files: IndexSet<String> = self.data_files.keys().cloned().collect();
        for (_, attachment) in self.attachments.iter_mut() {
            match attachment {
                Attachment::Model(model) => model.validate()?,
                Attachment::System(system) => {
                    for name in system.measurements.clone() {
                        if system.has_model(&name) {
                            continue;
                        }
                        let model = self.definitions.get(&name).ok_or_else(|| {
                            MsrError::UnresolvedReference {
                                owner: system.name.clone(),
                                kind: "measurement model",
                                name: name.clone(),
                            }
                        })?;
                        system.set_ref_object(model.clone())?;
                    }
                    system.initialize(|name| known_files.contains(name))?;
                }
                Attachment::Adapter(adapter) => adapter.model.validate()?,
                Attachment::FileSet(_) => {}
            }
        }

        // Build the measurements, from scratch if initializing again
        self.records.clear();
        self.largest_id = self
            .attachments
            .iter()
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(self.id_base - 1);
        let attachments = self.attachments.clone();
        for (owner, (_, attachment)) in attachments.iter().enumerate() {
            match attachment {
                Attachment::Model(model) => {
                    self.add_record(owner, model.clone(), &[])?;
                }
                Attachment::System(system) => {
                    self.check_files(&system.name, &system.data_files)?;
                    for model in system.models() {
                        self.add_record(owner, model.clone(), &system.data_files)?;
                    }
                }
                Attachment::Adapter(adapter) => {
                    let files: Vec<String> = adapter
                        .obs_files
                        .iter()
                        .chain(adapter.ramp_tables.iter())
                        .cloned()
                        .collect();
                    self.check_files(&adapter.name, &files)?;
                    self.add_record(owner, adapter.model.clone(), &files)?;
                }
                Attachment::FileSet(set) => {
                    let files: Vec<String> =
                        set.files.iter().chain(set.ramp_tables.iter()).cloned().collect();
                    self.check_files(&set.name, &files)?;
                    // Sets without tracking configuration are built from the observations
                    for adapter in set.build_adapters()? {
                        self.add_adapter_record(owner, adapter)?;
                    }
                }
            }
        }

        self.check_propagator()?;
        self.state = ManagerState::Ready;
        info!(
            "measurement manager initialized: {} measurement(s) from {} attachment(s), {} data file(s), IDs {}..={}",
            self.records.len(),
            self.attachments.len(),
            self.data_files.len(),
            self.id_base,
            self.largest_id
        );
        Ok(())
    }

    fn add_adapter_record(&mut self, owner: usize, adapter: TrackingDataAdapter) -> Result<MsrHandle, MsrError> {
        let files: Vec<String> = adapter
            .obs_files
            .iter()
            .chain(adapter.ramp_tables.iter())
            .cloned()
            .collect();
        self.add_record(owner, adapter.model, &files)
    }

    /// Every participant which is not a ground station must come from the propagator.
    fn check_propagator(&self) -> Result<(), MsrError> {
        let needs_propagator = self.records.iter().any(|rec| {
            rec.model
                .participants
                .iter()
                .any(|p| !self.stations.contains_key(p))
        });
        ensure!(
            !needs_propagator || self.provider.is_some(),
            crate::errors::PropagatorNotSetSnafu {
                action: "compute the measurements of spacecraft"
            }
        );
        Ok(())
    }

    /// Opens every data file, for write when simulating. When estimating, loads the observations
    /// and derives the tracking configurations of the file sets which have none.
    ///
    /// Returns false if a data file could not be opened.
    pub fn prepare_for_processing(&mut self, simulating: bool) -> Result<bool, MsrError> {
        ensure!(
            self.state != ManagerState::Unconfigured,
            InvalidStateSnafu {
                action: "prepare for processing",
                state: "the manager is not initialized"
            }
        );
        let mut all_open = true;
        for data_file in self.data_files.values_mut() {
            if !data_file.open_stream(simulating) {
                warn!("could not open {data_file}");
                all_open = false;
            }
        }
        self.state = ManagerState::Processing { simulating };
        self.written = 0;
        self.active_events.clear();
        self.event_map.clear();

        if !simulating {
            self.load_observations();
            // Measurements derived from the observations may compute the first one
            if self.derive_file_set_configs()? {
                self.find_model_for_observation();
            }
        }
        self.load_ramp_tables();
        Ok(all_open)
    }

    /// Builds the tracking configurations of the file sets which have none from the loaded observations.
    /// Returns whether measurements were added.
    fn derive_file_set_configs(&mut self) -> Result<bool, MsrError> {
        let before = self.records.len();
        for owner in 0..self.attachments.len() {
            let Attachment::FileSet(set) = &self.attachments[owner].1 else {
                continue;
            };
            if !set.configs.is_empty() {
                continue;
            }
            let mut set: TrackingFileSet = set.clone();
            for obs in &self.observations {
                let from_set = obs.source.as_deref().map_or(false, |src| set.uses_file(src));
                if from_set && set.add_config_from_observation(obs) {
                    info!(
                        "{}: derived {} on {:?} from {}",
                        set.name,
                        obs.msr_type,
                        obs.participants,
                        obs.source.as_deref().unwrap_or("?")
                    );
                }
            }
            for adapter in set.build_adapters()? {
                self.add_adapter_record(owner, adapter)?;
            }
            self.attachments[owner].1 = Attachment::FileSet(set);
        }
        self.check_propagator()?;
        Ok(self.records.len() > before)
    }

    /// Whether every observation was processed
    pub fn processing_complete(&self) -> bool {
        self.cursor.is_exhausted()
    }

    /// Closes every data file. This may be called at any time, any number of times.
    pub fn finalize(&mut self) -> bool {
        let mut all_closed = true;
        for data_file in self.data_files.values_mut() {
            if !data_file.close_stream() {
                warn!("could not close {data_file}");
                all_closed = false;
            }
        }
        if matches!(self.state, ManagerState::Processing { simulating: true }) {
            info!("wrote {} measurement(s)", self.written);
        }
        self.active_events.clear();
        self.event_map.clear();
        if self.state != ManagerState::Unconfigured {
            self.state = ManagerState::Closed;
        }
        all_closed
    }

    fn is_simulating(&self) -> bool {
        matches!(self.state, ManagerState::Processing { simulating: true })
    }

    fn record(&self, handle: MsrHandle) -> Result<&MsrRecord, MsrError> {
        self.records.get(handle.0).ok_or(MsrError::InvalidHandle { index: handle.0 })
    }

    /// Returns the latest calculation of the provided measurement.
    pub fn get_measurement(&self, handle: MsrHandle) -> Result<&MeasurementData, MsrError> {
        self.record(handle).map(|rec| &rec.data)
    }

    pub fn get_model(&self, handle: MsrHandle) -> Result<&MeasurementModel, MsrError> {
        self.record(handle).map(|rec| &rec.model)
    }

    pub fn get_id(&self, handle: MsrHandle) -> Result<i32, MsrError> {
        self.record(handle).map(|rec| rec.id)
    }

    /// Returns the handle of the measurement with the provided ID
    pub fn handle_of(&self, id: i32) -> Option<MsrHandle> {
        self.records.iter().position(|rec| rec.id == id).map(MsrHandle)
    }

    /// Handles of every measurement, in attachment order
    pub fn handles(&self) -> impl Iterator<Item = MsrHandle> {
        (0..self.records.len()).map(MsrHandle)
    }

    /// Handles of the measurements built from the attachment with the provided ID
    pub fn handles_of_attachment(&self, id: i32) -> Vec<MsrHandle> {
        let Some(owner) = self.attachments.iter().position(|(aid, _)| *aid == id) else {
            return Vec::new();
        };
        self.records
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.owner == owner)
            .map(|(i, _)| MsrHandle(i))
            .collect()
    }

    pub fn measurement_names(&self) -> Vec<&str> {
        self.records.iter().map(|rec| rec.model.name.as_str()).collect()
    }

    pub fn all_models(&self) -> impl Iterator<Item = &MeasurementModel> {
        self.records.iter().map(|rec| &rec.model)
    }

    /// Every participant of every measurement, without duplicates
    pub fn participant_list(&self) -> Vec<&str> {
        let mut unique = IndexSet::new();
        for rec in &self.records {
            for p in &rec.model.participants {
                unique.insert(p.as_str());
            }
        }
        unique.into_iter().collect()
    }

    /// The measurement types which this manager can compute
    pub fn valid_measurement_list(&self) -> Vec<&'static str> {
        MeasurementType::ALL.iter().map(|t| t.name()).collect()
    }

    pub fn attachments(&self) -> impl Iterator<Item = (i32, &Attachment)> {
        self.attachments.iter().map(|(id, a)| (*id, a))
    }

    pub fn tracking_file_sets(&self) -> impl Iterator<Item = &TrackingFileSet> {
        self.attachments.iter().filter_map(|(_, a)| match a {
            Attachment::FileSet(set) => Some(set),
            _ => None,
        })
    }

    pub fn tracking_data_adapters(&self) -> impl Iterator<Item = &TrackingDataAdapter> {
        self.attachments.iter().filter_map(|(_, a)| match a {
            Attachment::Adapter(adapter) => Some(adapter),
            _ => None,
        })
    }

    pub fn data_file(&self, name: &str) -> Option<&DataFile> {
        self.data_files.get(name)
    }

    pub fn data_file_mut(&mut self, name: &str) -> Option<&mut DataFile> {
        self.data_files.get_mut(name)
    }

    /// Handles of the measurements matching the current observation
    pub fn active_measurements(&self) -> &[MsrHandle] {
        &self.active
    }

    fn check_handle(&self, handle: MsrHandle) -> Result<(), MsrError> {
        ensure!(
            handle.0 < self.records.len(),
            InvalidHandleSnafu { index: handle.0 }
        );
        Ok(())
    }
}

impl Default for MeasurementManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MeasurementManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MeasurementManager")
            .field("state", &self.state)
            .field("id_base", &self.id_base)
            .field("largest_id", &self.largest_id)
            .field("measurements", &self.measurement_names())
            .field("data_files", &self.data_files.keys().collect::<Vec<_>>())
            .field("observations", &self.observations.len())
            .field("active_events", &self.active_events.len())
            .finish()
    }
}

impl fmt::Display for MeasurementManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "measurement manager ({:?}) with {} measurement(s), {} observation(s)",
            self.state,
            self.records.len(),
            self.observations.len()
        )
    }
}
