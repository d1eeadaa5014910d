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

use crate::errors::MsrError;
use crate::io::time_conv::TimeSystem;
use crate::io::TimeConverter;
use crate::msr::{MeasurementType, ObservationData, RampTableData, RampType};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};

/// Type name reported by streams of observations
pub const OBSERVATION_TYPE_NAME: &str = "ObType";
/// Type name reported by streams of ramp tables
pub const RAMP_TABLE_TYPE_NAME: &str = "RampTableType";
/// Lines starting with this character are comments in the text formats
const COMMENT: char = '%';

/// The back end of a data file: reads and writes records in a given format.
///
/// Reading past the last record returns None, which is not an error.
pub trait ObsStream: fmt::Debug + Send {
    /// Checks that the stream is usable, e.g. that it has a name
    fn initialize(&mut self) -> Result<(), MsrError>;

    /// Type of the records of this stream
    fn type_name(&self) -> &'static str;

    fn is_ramp_table(&self) -> bool {
        self.type_name() == RAMP_TABLE_TYPE_NAME
    }

    fn stream_name(&self) -> &str;

    fn set_stream_name(&mut self, name: &str);

    /// Opens the stream, returns false on failure. Opening for write discards any existing record.
    fn open(&mut self, read: bool, write: bool) -> bool;

    fn is_open(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn close(&mut self) -> bool;

    fn read_observation(&mut self) -> Option<ObservationData>;

    fn read_ramp_table_data(&mut self) -> Option<RampTableData>;

    /// Appends a record to a stream opened for write
    fn add_measurement(&mut self, data: &ObservationData) -> bool;

    /// Deep copy of this stream, closed
    fn clone_box(&self) -> Box<dyn ObsStream>;
}

impl Clone for Box<dyn ObsStream> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OpenMode {
    Closed,
    Read,
    Write,
}

/// An in-memory stream of observations and ramp records.
#[derive(Clone, Debug)]
pub struct MemoryStream {
    name: String,
    observations: Vec<ObservationData>,
    ramps: Vec<RampTableData>,
    ramp_table: bool,
    cursor: usize,
    mode: OpenMode,
}

impl MemoryStream {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            observations: Vec::new(),
            ramps: Vec::new(),
            ramp_table: false,
            cursor: 0,
            mode: OpenMode::Closed,
        }
    }

    pub fn with_observations(mut self, observations: Vec<ObservationData>) -> Self {
        self.observations = observations;
        self
    }

    /// Turns this stream into a ramp table stream of the provided records
    pub fn with_ramps(mut self, ramps: Vec<RampTableData>) -> Self {
        self.ramps = ramps;
        self.ramp_table = true;
        self
    }

    pub fn observations(&self) -> &[ObservationData] {
        &self.observations
    }
}

impl ObsStream for MemoryStream {
    fn initialize(&mut self) -> Result<(), MsrError> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        if self.ramp_table {
            RAMP_TABLE_TYPE_NAME
        } else {
            OBSERVATION_TYPE_NAME
        }
    }

    fn stream_name(&self) -> &str {
        &self.name
    }

    fn set_stream_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn open(&mut self, _read: bool, write: bool) -> bool {
        if write {
            if self.ramp_table {
                warn!("ramp table stream {} cannot be written", self.name);
                return false;
            }
            self.observations.clear();
            self.mode = OpenMode::Write;
        } else {
            self.mode = OpenMode::Read;
        }
        self.cursor = 0;
        true
    }

    fn is_open(&self) -> bool {
        self.mode != OpenMode::Closed
    }

    fn is_writable(&self) -> bool {
        self.mode == OpenMode::Write
    }

    fn close(&mut self) -> bool {
        self.mode = OpenMode::Closed;
        true
    }

    fn read_observation(&mut self) -> Option<ObservationData> {
        if self.mode != OpenMode::Read || self.ramp_table {
            return None;
        }
        let obs = self.observations.get(self.cursor).cloned();
        self.cursor += 1;
        obs
    }

    fn read_ramp_table_data(&mut self) -> Option<RampTableData> {
        if self.mode != OpenMode::Read || !self.ramp_table {
            return None;
        }
        let rec = self.ramps.get(self.cursor).cloned();
        self.cursor += 1;
        rec
    }

    fn add_measurement(&mut self, data: &ObservationData) -> bool {
        if self.mode != OpenMode::Write {
            return false;
        }
        self.observations.push(data.clone());
        true
    }

    fn clone_box(&self) -> Box<dyn ObsStream> {
        let mut copy = self.clone();
        copy.mode = OpenMode::Closed;
        copy.cursor = 0;
        Box::new(copy)
    }
}

/// Line oriented text file, shared by the text back ends.
#[derive(Debug, Default)]
struct TextFile {
    path: String,
    reader: Option<Lines<BufReader<File>>>,
    writer: Option<BufWriter<File>>,
    line_no: usize,
}

impl TextFile {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn open(&mut self, write: bool) -> bool {
        self.close();
        self.line_no = 0;
        if write {
            match File::create(&self.path) {
                Ok(file) => {
                    self.writer = Some(BufWriter::new(file));
                    true
                }
                Err(e) => {
                    warn!("could not create {}: {e}", self.path);
                    false
                }
            }
        } else {
            match File::open(&self.path) {
                Ok(file) => {
                    self.reader = Some(BufReader::new(file).lines());
                    true
                }
                Err(e) => {
                    warn!("could not open {}: {e}", self.path);
                    false
                }
            }
        }
    }

    fn close(&mut self) -> bool {
        self.reader = None;
        match self.writer.take() {
            Some(mut writer) => match writer.flush() {
                Ok(()) => true,
                Err(e) => {
                    warn!("could not flush {}: {e}", self.path);
                    false
                }
            },
            None => true,
        }
    }

    /// Returns the next line with data, skipping comments and blank lines
    fn next_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        loop {
            self.line_no += 1;
            match reader.next()? {
                Ok(line) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with(COMMENT) {
                        return Some(trimmed.to_string());
                    }
                }
                Err(e) => {
                    warn!("{}:{}: {e}", self.path, self.line_no);
                    return None;
                }
            }
        }
    }

    fn write_line(&mut self, line: &str) -> bool {
        match self.writer.as_mut() {
            Some(writer) => match writeln!(writer, "{line}") {
                Ok(()) => true,
                Err(e) => {
                    warn!("could not write to {}: {e}", self.path);
                    false
                }
            },
            None => false,
        }
    }
}

fn check_path(path: &str, stream: &str) -> Result<(), MsrError> {
    if path.trim().is_empty() {
        Err(MsrError::StreamInit {
            name: stream.to_string(),
            stream: path.to_string(),
            reason: "the file name is empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Text observation file, one record per line:
///
/// `<TAIModJulian epoch> <type name> <type ID> <participants...> <values...>`
///
/// The number of participants and of values follows from the measurement type.
#[derive(Debug)]
pub struct GmdStream {
    file: TextFile,
    converter: TimeConverter,
}

impl GmdStream {
    pub fn new(path: &str, converter: &TimeConverter) -> Self {
        Self {
            file: TextFile::new(path),
            converter: *converter,
        }
    }

    fn parse(&self, line: &str) -> Result<ObservationData, String> {
        let mut tokens = line.split_whitespace();
        let mjd = tokens
            .next()
            .ok_or("empty line")?
            .parse::<f64>()
            .map_err(|e| format!("invalid epoch: {e}"))?;
        let type_name = tokens.next().ok_or("missing type name")?;
        let type_id = tokens
            .next()
            .ok_or("missing type ID")?
            .parse::<i32>()
            .map_err(|e| format!("invalid type ID: {e}"))?;
        let msr_type = MeasurementType::from_type_id(type_id)
            .ok_or_else(|| format!("unknown type ID {type_id}"))?;
        if msr_type.name() != type_name {
            return Err(format!("type ID {type_id} is not {type_name}"));
        }
        let participants: Vec<String> = tokens
            .by_ref()
            .take(msr_type.participant_count())
            .map(|s| s.to_string())
            .collect();
        if participants.len() != msr_type.participant_count() {
            return Err("missing participants".to_string());
        }
        let values = tokens
            .map(|s| s.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| format!("invalid value: {e}"))?;
        if values.len() != msr_type.dimension() {
            return Err(format!(
                "{type_name} needs {} values, found {}",
                msr_type.dimension(),
                values.len()
            ));
        }
        let epoch = self.converter.from_mod_julian(TimeSystem::TAI, mjd);
        Ok(ObservationData::new(epoch, msr_type, participants, values))
    }

    fn format(&self, data: &ObservationData) -> String {
        let mjd = self.converter.to_mod_julian(data.epoch, TimeSystem::TAI);
        let mut line = format!("{mjd:.12}    {}    {}", data.type_name(), data.type_id());
        for p in &data.participants {
            line.push_str(&format!("    {p}"));
        }
        for v in &data.values {
            line.push_str(&format!("    {v:.15e}"));
        }
        line
    }
}

impl ObsStream for GmdStream {
    fn initialize(&mut self) -> Result<(), MsrError> {
        check_path(&self.file.path, "observation stream")
    }

    fn type_name(&self) -> &'static str {
        OBSERVATION_TYPE_NAME
    }

    fn stream_name(&self) -> &str {
        &self.file.path
    }

    fn set_stream_name(&mut self, name: &str) {
        self.file.path = name.to_string();
    }

    fn open(&mut self, _read: bool, write: bool) -> bool {
        self.file.open(write)
    }

    fn is_open(&self) -> bool {
        self.file.reader.is_some() || self.file.writer.is_some()
    }

    fn is_writable(&self) -> bool {
        self.file.writer.is_some()
    }

    fn close(&mut self) -> bool {
        self.file.close()
    }

    fn read_observation(&mut self) -> Option<ObservationData> {
        loop {
            let line = self.file.next_line()?;
            match self.parse(&line) {
                Ok(obs) => return Some(obs),
                Err(msg) => warn!(
                    "{}:{}: skipping malformed observation ({msg})",
                    self.file.path, self.file.line_no
                ),
            }
        }
    }

    fn read_ramp_table_data(&mut self) -> Option<RampTableData> {
        None
    }

    fn add_measurement(&mut self, data: &ObservationData) -> bool {
        let line = self.format(data);
        self.file.write_line(&line)
    }

    fn clone_box(&self) -> Box<dyn ObsStream> {
        Box::new(Self::new(&self.file.path, &self.converter))
    }
}

/// Text ramp table file, one record per line:
///
/// `<TAIModJulian epoch> <station> <spacecraft> <uplink band> <ramp type code> <frequency Hz> <rate Hz/s>`
#[derive(Debug)]
pub struct RampTableStream {
    file: TextFile,
    converter: TimeConverter,
}

impl RampTableStream {
    pub fn new(path: &str, converter: &TimeConverter) -> Self {
        Self {
            file: TextFile::new(path),
            converter: *converter,
        }
    }

    fn parse(&self, line: &str) -> Result<RampTableData, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 7 {
            return Err(format!("expected 7 fields, found {}", tokens.len()));
        }
        let mjd = tokens[0]
            .parse::<f64>()
            .map_err(|e| format!("invalid epoch: {e}"))?;
        let uplink_band = tokens[3]
            .parse::<u8>()
            .map_err(|e| format!("invalid uplink band: {e}"))?;
        let code = tokens[4]
            .parse::<u8>()
            .map_err(|e| format!("invalid ramp type: {e}"))?;
        let ramp_type =
            RampType::from_code(code).ok_or_else(|| format!("unknown ramp type {code}"))?;
        let frequency_hz = tokens[5]
            .parse::<f64>()
            .map_err(|e| format!("invalid frequency: {e}"))?;
        let rate_hz_s = tokens[6]
            .parse::<f64>()
            .map_err(|e| format!("invalid rate: {e}"))?;
        Ok(RampTableData {
            epoch: self.converter.from_mod_julian(TimeSystem::TAI, mjd),
            participants: vec![tokens[1].to_string(), tokens[2].to_string()],
            uplink_band,
            ramp_type,
            frequency_hz,
            rate_hz_s,
            source: None,
        })
    }
}

impl ObsStream for RampTableStream {
    fn initialize(&mut self) -> Result<(), MsrError> {
        check_path(&self.file.path, "ramp table stream")
    }

    fn type_name(&self) -> &'static str {
        RAMP_TABLE_TYPE_NAME
    }

    fn stream_name(&self) -> &str {
        &self.file.path
    }

    fn set_stream_name(&mut self, name: &str) {
        self.file.path = name.to_string();
    }

    fn open(&mut self, _read: bool, write: bool) -> bool {
        if write {
            warn!("ramp table stream {} cannot be written", self.file.path);
            return false;
        }
        self.file.open(false)
    }

    fn is_open(&self) -> bool {
        self.file.reader.is_some()
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn close(&mut self) -> bool {
        self.file.close()
    }

    fn read_observation(&mut self) -> Option<ObservationData> {
        None
    }

    fn read_ramp_table_data(&mut self) -> Option<RampTableData> {
        loop {
            let line = self.file.next_line()?;
            match self.parse(&line) {
                Ok(rec) => return Some(rec),
                Err(msg) => warn!(
                    "{}:{}: skipping malformed ramp record ({msg})",
                    self.file.path, self.file.line_no
                ),
            }
        }
    }

    fn add_measurement(&mut self, _data: &ObservationData) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn ObsStream> {
        Box::new(Self::new(&self.file.path, &self.converter))
    }
}
