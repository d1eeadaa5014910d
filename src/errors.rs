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

use crate::io::ConfigError;
use crate::time::Epoch;
use snafu::prelude::Snafu;

/// Errors raised by the measurement subsystem.
///
/// Configuration and wiring errors abort a run before it starts. Failures of a single record
/// (an observation without a model, a light-time event which does not converge) are never
/// reported through this type: they are flagged on the measurement itself and the run continues.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MsrError {
    #[snafu(display(
        "DataThinningRatio of {ratio} on {name} is invalid: the ratio must be in [0, 1]"
    ))]
    InvalidThinningRatio { name: String, ratio: f64 },
    #[snafu(display("SelectedStationIDs of {name} cannot contain an empty station ID"))]
    EmptyStationId { name: String },
    #[snafu(display("epoch format `{format}` is not supported"))]
    UnknownEpochFormat { format: String },
    #[snafu(display("cannot read `{value}` as a {format} epoch: {msg}"))]
    InvalidEpoch {
        format: String,
        value: String,
        msg: String,
    },
    #[snafu(display("measurement type `{name}` is not supported"))]
    UnknownMeasurementType { name: String },
    #[snafu(display("{msr_type} requires {need} participants but {got} were provided"))]
    ParticipantCount {
        msr_type: String,
        need: usize,
        got: usize,
    },
    #[snafu(display("{owner} references the {kind} `{name}` which is not defined"))]
    UnresolvedReference {
        owner: String,
        kind: &'static str,
        name: String,
    },
    #[snafu(display(
        "the measurement type {msr_type} cannot be attached to {system}: {system_type} does not allow it"
    ))]
    DisallowedMeasurement {
        msr_type: String,
        system: String,
        system_type: String,
    },
    #[snafu(display("a {kind} named `{name}` is already defined"))]
    DuplicateName { kind: &'static str, name: String },
    #[snafu(display("only one propagator per measurement manager is supported"))]
    MultiplePropagators,
    #[snafu(display("no propagator was set, cannot {action}"))]
    PropagatorNotSet { action: &'static str },
    #[snafu(display("the data file {name} has no stream"))]
    NoStream { name: String },
    #[snafu(display("the stream {stream} of {name} failed to initialize: {reason}"))]
    StreamInit {
        name: String,
        stream: String,
        reason: String,
    },
    #[snafu(display("no more measurement IDs available from base {base}"))]
    IdSpaceExhausted { base: i32 },
    #[snafu(display("unknown participant `{name}` @ {epoch}"))]
    UnknownParticipant { name: String, epoch: Epoch },
    #[snafu(display("no measurement at index {index}"))]
    InvalidHandle { index: usize },
    #[snafu(display("no active event with ID {id}"))]
    UnknownEvent { id: usize },
    #[snafu(display("cannot {action} while {state}"))]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    #[snafu(display("configuration failed because {source}"))]
    Config { source: ConfigError },
}
