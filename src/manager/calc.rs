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

use super::records::MsrRecord;
use super::{MeasurementManager, MsrHandle};
use crate::errors::{InvalidStateSnafu, MsrError, UnknownEventSnafu};
use crate::linalg::DMatrix;
use crate::msr::{DerivativeParam, Event, MeasurementData, Participants, RampTableData};
use crate::time::Epoch;
use indexmap::IndexMap;
use rand_pcg::Pcg64Mcg;
use snafu::{ensure, OptionExt};
use std::str::FromStr;

/// Returns the first non empty ramp table of the provided data files
fn ramp_table_of<'a>(
    ramp_tables: &'a IndexMap<String, Vec<RampTableData>>,
    names: &[String],
) -> Option<&'a [RampTableData]> {
    names
        .iter()
        .filter_map(|name| ramp_tables.get(name))
        .find(|table| !table.is_empty())
        .map(|table| table.as_slice())
}

/// Adds noise to the values of a final and feasible measurement
fn apply_noise(rec: &mut MsrRecord, rng: &mut Pcg64Mcg) {
    if !rec.data.is_feasible {
        return;
    }
    let samples = rec.model.sample_noise(rec.data.epoch, rng);
    for (value, noise) in rec.data.values.iter_mut().zip(samples) {
        *value += noise;
    }
    rec.data.is_noisy = true;
}

impl MeasurementManager {
    /// Sets the epoch at which the measurements are calculated when simulating.
    pub fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = Some(epoch);
    }

    /// Epoch of the current calculation: the simulation epoch when simulating, the epoch of the
    /// current observation otherwise.
    pub fn get_epoch(&self) -> Option<Epoch> {
        if self.is_simulating() {
            self.epoch
        } else {
            self.current_observation().map(|obs| obs.epoch)
        }
    }

    /// Epoch of the observation after the current one, if any
    pub fn get_next_epoch(&self) -> Option<Epoch> {
        self.cursor.peek().map(|idx| self.observations[idx].epoch)
    }

    /// Calculates the measurements: every measurement when simulating, the measurements matching
    /// the current observation otherwise.
    ///
    /// With `with_events`, the measurements which solve for light time only create their first
    /// light-time event, which must be processed with [Self::process_event] before the values are
    /// final. Noise is only added when simulating, once the values are final.
    ///
    /// Returns whether at least one measurement is feasible or waiting on its events.
    pub fn calculate_measurements(
        &mut self,
        for_simulation: bool,
        with_events: bool,
        add_noise: bool,
    ) -> Result<bool, MsrError> {
        let add_noise = if add_noise && !for_simulation {
            warn!("noise is only added to simulated measurements, ignoring add_noise");
            false
        } else {
            add_noise
        };

        let epoch = if for_simulation {
            self.epoch.context(InvalidStateSnafu {
                action: "calculate simulated measurements",
                state: "no simulation epoch is set",
            })?
        } else {
            match self.current_observation() {
                Some(obs) => obs.epoch,
                None => return Ok(false),
            }
        };

        self.active_events.clear();
        self.event_map.clear();

        let handles: Vec<MsrHandle> = if for_simulation {
            self.handles().collect()
        } else {
            self.active.clone()
        };

        let mut any = false;
        for handle in handles {
            self.calculate_at(handle, epoch, with_events, add_noise)?;
            let data = &self.records[handle.0].data;
            any |= data.is_feasible || !data.is_final();
        }
        Ok(any)
    }

    /// Calculates one measurement at the current epoch and returns its ID.
    pub fn calculate(&mut self, handle: MsrHandle, with_events: bool) -> Result<i32, MsrError> {
        self.check_handle(handle)?;
        let epoch = self.get_epoch().context(InvalidStateSnafu {
            action: "calculate a measurement",
            state: "there is no current epoch",
        })?;
        let add_noise = self.is_simulating();
        self.calculate_at(handle, epoch, with_events, add_noise)?;
        Ok(self.records[handle.0].id)
    }

    fn calculate_at(
        &mut self,
        handle: MsrHandle,
        epoch: Epoch,
        with_events: bool,
        add_noise: bool,
    ) -> Result<(), MsrError> {
        self.drop_events_of(handle);
        let participants = Participants {
            stations: &self.stations,
            provider: self.provider.as_deref(),
        };
        let rec = &mut self.records[handle.0];
        rec.derivatives = None;
        rec.legs.clear();
        rec.fresh = false;

        if with_events && rec.model.supports_event_location() {
            let event_id = self.next_event_id;
            if let Some(event) = rec.model.first_event(epoch, event_id) {
                let mut data = MeasurementData::new(
                    rec.model.msr_type,
                    epoch,
                    rec.model.participants.clone(),
                );
                data.pending_events = rec.model.signal_path().len() - 1;
                data.unfeasibility_reason = "EventsPending".to_string();
                rec.data = data;
                rec.noise_on_final = add_noise;
                self.next_event_id += 1;
                debug!("{} waits on {event}", rec.model.name);
                self.event_map.insert(event.id, handle);
                self.active_events.push(event);
                return Ok(());
            }
        }

        let ramp_table = ramp_table_of(&self.ramp_tables, &rec.ramp_tables);
        let computation = rec.model.calculate(epoch, &participants, ramp_table)?;
        rec.data = computation.data;
        rec.legs = computation.legs;
        if rec.data.unfeasibility_reason == "LightTimeNotConverged" {
            warn!("{}: light time did not converge @ {epoch}", rec.model.name);
        }
        if add_noise {
            apply_noise(rec, &mut self.rng);
        }
        rec.fresh = true;
        Ok(())
    }

    /// Discards the events still queued for a measurement which is calculated again.
    fn drop_events_of(&mut self, handle: MsrHandle) {
        self.event_map.retain(|_, owner| *owner != handle);
        let event_map = &self.event_map;
        self.active_events.retain(|event| event_map.contains_key(&event.id));
    }

    /// Whether any light-time event is waiting to be processed
    pub fn measurement_has_events(&self) -> bool {
        !self.active_events.is_empty()
    }

    pub fn get_active_events(&self) -> &[Event] {
        &self.active_events
    }

    /// Number of light-time events which must still be processed before the measurement is final
    pub fn get_event_count(&self, handle: MsrHandle) -> Result<usize, MsrError> {
        self.record(handle).map(|rec| rec.data.pending_events)
    }

    /// Processes one light-time event.
    ///
    /// When the event converges, the event of the next leg of the signal path is created, or the
    /// measurement becomes final if this was the last leg. An event which does not converge makes
    /// its measurement infeasible: this is reported by returning false, and the run may continue.
    pub fn process_event(&mut self, event_id: usize) -> Result<bool, MsrError> {
        let pos = self
            .active_events
            .iter()
            .position(|e| e.id == event_id)
            .context(UnknownEventSnafu { id: event_id })?;
        let handle = *self
            .event_map
            .get(&event_id)
            .context(UnknownEventSnafu { id: event_id })?;

        let mut event = self.active_events.remove(pos);
        self.event_map.shift_remove(&event_id);

        let participants = Participants {
            stations: &self.stations,
            provider: self.provider.as_deref(),
        };
        let rec = &mut self.records[handle.0];

        let Some(leg) = event.locate(&participants)? else {
            warn!("{}: {event}", rec.model.name);
            rec.data.pending_events = 0;
            rec.data.is_feasible = false;
            rec.data.unfeasibility_reason = "LightTimeNotConverged".to_string();
            rec.noise_on_final = false;
            return Ok(false);
        };
        debug!("{}: {event}", rec.model.name);
        rec.legs.push(leg);
        rec.data.pending_events = rec.data.pending_events.saturating_sub(1);

        if let Some(next) = rec.model.next_event(&rec.legs, self.next_event_id) {
            self.next_event_id += 1;
            self.event_map.insert(next.id, handle);
            self.active_events.push(next);
            return Ok(true);
        }

        let ramp_table = ramp_table_of(&self.ramp_tables, &rec.ramp_tables);
        let epoch = rec.data.epoch;
        rec.data = rec
            .model
            .evaluate(epoch, &rec.legs, &participants, ramp_table)?;
        if rec.noise_on_final {
            apply_noise(rec, &mut self.rng);
            rec.noise_on_final = false;
        }
        rec.fresh = true;
        Ok(true)
    }

    /// Processes the active events until none remains, returns the number of events which did not converge.
    pub fn process_all_events(&mut self) -> Result<usize, MsrError> {
        let mut failed = 0;
        while let Some(event_id) = self.active_events.first().map(|e| e.id) {
            if !self.process_event(event_id)? {
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Calculates the partial derivatives of the values of a final measurement with respect to the
    /// `wrt` elements of the participant `obj`. The result is kept with the measurement.
    pub fn calculate_derivatives(
        &mut self,
        obj: &str,
        wrt: &str,
        handle: MsrHandle,
    ) -> Result<&DMatrix<f64>, MsrError> {
        let wrt = DerivativeParam::from_str(wrt)?;
        self.check_handle(handle)?;
        let participants = Participants {
            stations: &self.stations,
            provider: self.provider.as_deref(),
        };
        let rec = &mut self.records[handle.0];
        ensure!(
            rec.data.is_final() && !rec.legs.is_empty(),
            InvalidStateSnafu {
                action: "calculate derivatives",
                state: "the measurement is not calculated"
            }
        );
        let partials = rec.model.partials(
            &rec.legs,
            obj,
            wrt,
            &participants,
            rec.data.uplink_frequency_hz,
        )?;
        Ok(&*rec.derivatives.insert(partials))
    }

    /// Observed minus computed values of a measurement for the current observation.
    pub fn observation_residual(&self, handle: MsrHandle) -> Result<Vec<f64>, MsrError> {
        let rec = self.record(handle)?;
        let obs = self.current_observation().context(InvalidStateSnafu {
            action: "compute a residual",
            state: "there is no current observation",
        })?;
        ensure!(
            rec.data.is_final() && rec.data.epoch == obs.epoch,
            InvalidStateSnafu {
                action: "compute a residual",
                state: "the measurement is not calculated for the current observation"
            }
        );
        Ok(obs
            .values
            .iter()
            .zip(rec.data.values.iter())
            .map(|(o, c)| o - c)
            .collect())
    }
}
