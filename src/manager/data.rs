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

use super::{MeasurementManager, MsrHandle, ObservationCursor};
use crate::errors::{InvalidStateSnafu, MsrError};
use crate::msr::{ObservationData, RampTableData};
use snafu::ensure;

impl MeasurementManager {
    /// Reads every observation of every observation data file, and merges them in a single sequence
    /// sorted by epoch. The cursor is moved back to the first observation.
    ///
    /// Data files open for write are skipped. Returns the number of observations loaded.
    pub fn load_observations(&mut self) -> usize {
        self.observations.clear();
        for data_file in self.data_files.values_mut() {
            if data_file.is_ramp_table() || data_file.is_writable() {
                continue;
            }
            // Reopening rewinds the stream, so that loading twice reads the same records.
            if !data_file.open_stream(false) {
                warn!("could not open {data_file}, no observation read from it");
                continue;
            }
            let before = self.observations.len();
            while let Some(obs) = data_file.read_observation() {
                self.observations.push(obs);
            }
            debug!(
                "{} observation(s) read from {}",
                self.observations.len() - before,
                data_file.name()
            );
        }
        // Stable sort: observations of the same epoch stay in file order.
        self.observations.sort_by_key(|obs| obs.epoch);
        self.cursor = ObservationCursor::new(self.observations.len());
        self.find_model_for_observation();
        info!("loaded {} observation(s)", self.observations.len());
        self.observations.len()
    }

    /// Reads every ramp table data file. The ramp records are kept per data file, sorted by epoch.
    ///
    /// Returns the number of ramp records loaded.
    pub fn load_ramp_tables(&mut self) -> usize {
        self.ramp_tables.clear();
        let mut count = 0;
        for data_file in self.data_files.values_mut() {
            if !data_file.is_ramp_table() {
                continue;
            }
            if !data_file.open_stream(false) {
                warn!("could not open ramp table {data_file}");
                continue;
            }
            let mut table = Vec::new();
            while let Some(rec) = data_file.read_ramp_table_data() {
                table.push(rec);
            }
            table.sort_by_key(|rec: &RampTableData| rec.epoch);
            count += table.len();
            debug!("{} ramp record(s) read from {}", table.len(), data_file.name());
            self.ramp_tables.insert(data_file.name().to_string(), table);
        }
        if count > 0 {
            info!("loaded {count} ramp record(s)");
        }
        count
    }

    /// The ramp records read from the named data file
    pub fn ramp_table(&self, data_file: &str) -> Option<&[RampTableData]> {
        self.ramp_tables.get(data_file).map(|t| t.as_slice())
    }

    /// Every loaded observation, sorted by epoch
    pub fn observations(&self) -> &[ObservationData] {
        &self.observations
    }

    pub fn current_observation(&self) -> Option<&ObservationData> {
        self.cursor.position().map(|idx| &self.observations[idx])
    }

    /// Position of the cursor in the observations, None once every observation was processed
    pub fn current_index(&self) -> Option<usize> {
        self.cursor.position()
    }

    /// Moves to the next observation and finds the measurements which compute it.
    ///
    /// Returns false once the cursor moves past the last observation.
    pub fn advance_observation(&mut self) -> bool {
        if self.cursor.advance() {
            self.find_model_for_observation();
            true
        } else {
            self.active.clear();
            false
        }
    }

    /// Moves the cursor back to the first observation.
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.find_model_for_observation();
    }

    /// Finds the measurements which compute the current observation: same type, same participants,
    /// and reading from the data file the observation comes from.
    pub fn find_model_for_observation(&mut self) -> &[MsrHandle] {
        self.active.clear();
        let Some(obs) = self.cursor.position().map(|idx| &self.observations[idx]) else {
            return &self.active;
        };
        for (idx, rec) in self.records.iter().enumerate() {
            if rec.model.msr_type == obs.msr_type
                && rec.model.participants == obs.participants
                && rec.reads_from(obs.source.as_deref())
            {
                self.active.push(MsrHandle(idx));
            }
        }
        if self.active.is_empty() {
            warn!("no measurement computes {obs}, it will be skipped");
        } else {
            debug!("{obs} computed by {:?}", self.active);
        }
        &self.active
    }

    /// Writes a simulated measurement to the first observation data file of its owner.
    ///
    /// Infeasible measurements and measurements waiting on light-time events are not written.
    pub fn write_measurement(&mut self, handle: MsrHandle) -> Result<bool, MsrError> {
        ensure!(
            self.is_simulating(),
            InvalidStateSnafu {
                action: "write a measurement",
                state: "not simulating"
            }
        );
        self.check_handle(handle)?;
        let rec = &mut self.records[handle.0];
        if !rec.data.is_final() || !rec.data.is_feasible {
            debug!("{} is not written: {}", rec.model.name, rec.data);
            return Ok(false);
        }
        let target = rec.obs_files.iter().find(|name| {
            self.data_files
                .get(name.as_str())
                .map_or(false, |df| df.is_writable())
        });
        let Some(data_file) = target.and_then(|name| self.data_files.get_mut(name.as_str())) else {
            warn!("{} has no data file open for write", rec.model.name);
            return Ok(false);
        };
        if !data_file.write_measurement(&rec.data) {
            return Ok(false);
        }
        rec.fresh = false;
        self.written += 1;
        Ok(true)
    }

    /// Writes every measurement calculated since it was last written.
    ///
    /// Returns false if a measurement which should have been written was not.
    pub fn write_measurements(&mut self) -> Result<bool, MsrError> {
        let mut all_written = true;
        for idx in 0..self.records.len() {
            let rec = &self.records[idx];
            if !rec.fresh || !rec.data.is_feasible {
                continue;
            }
            all_written &= self.write_measurement(MsrHandle(idx))?;
        }
        Ok(all_written)
    }

    /// Number of measurements written since processing started
    pub fn written_count(&self) -> usize {
        self.written
    }
}
