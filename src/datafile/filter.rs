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

use crate::io::{epoch_from_str, epoch_to_str};
use crate::msr::{MeasurementType, ObservationData};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Keep only the observations matching the filter
    #[default]
    Accept,
    /// Drop the observations matching the filter
    Reject,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochWindow {
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub start: Epoch,
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub end: Epoch,
}

impl EpochWindow {
    pub fn contains(&self, epoch: Epoch) -> bool {
        self.start <= epoch && epoch <= self.end
    }
}

/// An observation filter attached to a data file.
///
/// An observation matches the filter when it matches every criterion which is set: an empty list
/// of trackers, observed objects or types matches anything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationFilter {
    pub name: String,
    #[serde(default)]
    pub kind: FilterKind,
    #[serde(default)]
    pub trackers: Vec<String>,
    #[serde(default)]
    pub observed: Vec<String>,
    #[serde(default)]
    pub types: Vec<MeasurementType>,
    #[serde(default)]
    pub window: Option<EpochWindow>,
}

impl ObservationFilter {
    pub fn accept(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FilterKind::Accept,
            ..Default::default()
        }
    }

    pub fn reject(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FilterKind::Reject,
            ..Default::default()
        }
    }

    pub fn with_trackers(mut self, trackers: &[&str]) -> Self {
        self.trackers = trackers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_observed(mut self, observed: &[&str]) -> Self {
        self.observed = observed.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_types(mut self, types: &[MeasurementType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn with_window(mut self, start: Epoch, end: Epoch) -> Self {
        self.window = Some(EpochWindow { start, end });
        self
    }

    fn matches(&self, obs: &ObservationData) -> bool {
        let tracker_ok = self.trackers.is_empty()
            || obs
                .tracker()
                .map_or(false, |t| self.trackers.iter().any(|s| s == t));
        let observed_ok = self.observed.is_empty()
            || obs
                .participants
                .iter()
                .skip(1)
                .any(|p| self.observed.contains(p));
        let type_ok = self.types.is_empty() || self.types.contains(&obs.msr_type);
        let window_ok = self.window.map_or(true, |w| w.contains(obs.epoch));
        tracker_ok && observed_ok && type_ok && window_ok
    }

    /// Whether this filter lets the observation through
    pub fn keeps(&self, obs: &ObservationData) -> bool {
        match self.kind {
            FilterKind::Accept => self.matches(obs),
            FilterKind::Reject => !self.matches(obs),
        }
    }
}

impl fmt::Display for ObservationFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} filter {}", self.kind, self.name)
    }
}
