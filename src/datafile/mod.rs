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

use crate::errors::{ConfigSnafu, EmptyStationIdSnafu, InvalidThinningRatioSnafu, MsrError};
use crate::io::{ConfigRepr, EpochFormat, TimeConverter};
use crate::msr::{MeasurementData, ObservationData, RampTableData};
use crate::time::Epoch;
use indexmap::IndexSet;
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

mod filter;
mod streams;

pub use filter::{EpochWindow, FilterKind, ObservationFilter};
pub use streams::{
    GmdStream, MemoryStream, ObsStream, RampTableStream, OBSERVATION_TYPE_NAME,
    RAMP_TABLE_TYPE_NAME,
};

/// Window bound meaning "from the first record of the data"
pub const FROM_DATA_START: &str = "FromDataStart";
/// Window bound meaning "until the last record of the data"
pub const FROM_DATA_END: &str = "FromDataEnd";

/// A named tracking data file, which owns exactly one stream.
///
/// The data file applies its own selection on top of the stream: an epoch window, a set of
/// selected stations, a thinning ratio and any number of [ObservationFilter]s.
#[derive(Clone, Debug)]
pub struct DataFile {
    name: String,
    stream: Option<Box<dyn ObsStream>>,
    obs_type: String,
    thinning_ratio: f64,
    selected_stations: IndexSet<String>,
    epoch_format: EpochFormat,
    start_str: String,
    end_str: String,
    start: Option<Epoch>,
    end: Option<Epoch>,
    filters: Vec<ObservationFilter>,
    /// Number of records which passed the selection since the stream was opened
    selected: usize,
}

impl DataFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stream: None,
            obs_type: String::new(),
            thinning_ratio: 1.0,
            selected_stations: IndexSet::new(),
            epoch_format: EpochFormat::TAIModJulian,
            start_str: FROM_DATA_START.to_string(),
            end_str: FROM_DATA_END.to_string(),
            start: None,
            end: None,
            filters: Vec::new(),
            selected: 0,
        }
    }

    /// Builds a data file from its YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P, converter: &TimeConverter) -> Result<Self, MsrError> {
        let cfg = DataFileCfg::load(path).context(ConfigSnafu)?;
        Self::from_config(&cfg, converter)
    }

    /// Builds a data file from its configuration, through the same validation as the setters.
    pub fn from_config(cfg: &DataFileCfg, converter: &TimeConverter) -> Result<Self, MsrError> {
        let mut me = Self::new(&cfg.name);
        me.set_stream(cfg.stream.build(converter));
        me.set_thinning_ratio(cfg.thinning_ratio)?;
        for station in &cfg.selected_stations {
            me.add_selected_station(station)?;
        }
        me.epoch_format = cfg.epoch_format;
        me.set_start_epoch(&cfg.start_epoch, converter)?;
        me.set_end_epoch(&cfg.end_epoch, converter)?;
        for filter in &cfg.filters {
            me.add_filter(filter.clone());
        }
        Ok(me)
    }

    pub fn with_stream(mut self, stream: Box<dyn ObsStream>) -> Self {
        self.set_stream(stream);
        self
    }

    /// Replaces the stream of this data file, the previous one is dropped
    pub fn set_stream(&mut self, stream: Box<dyn ObsStream>) {
        self.stream = Some(stream);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream(&self) -> Option<&dyn ObsStream> {
        self.stream.as_deref()
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.stream_name())
    }

    /// Type of the records of this file, as reported by the stream at initialization
    pub fn obs_type(&self) -> &str {
        &self.obs_type
    }

    pub fn is_ramp_table(&self) -> bool {
        self.stream.as_ref().map_or(false, |s| s.is_ramp_table())
    }

    pub fn thinning_ratio(&self) -> f64 {
        self.thinning_ratio
    }

    /// Sets the fraction of the records to keep, which must be in [0, 1].
    pub fn set_thinning_ratio(&mut self, ratio: f64) -> Result<(), MsrError> {
        ensure!(
            (0.0..=1.0).contains(&ratio),
            InvalidThinningRatioSnafu {
                name: &self.name,
                ratio
            }
        );
        self.thinning_ratio = ratio;
        Ok(())
    }

    /// Adds a station to the selection, returns whether it was not selected yet.
    pub fn add_selected_station(&mut self, id: &str) -> Result<bool, MsrError> {
        ensure!(
            !id.trim().is_empty(),
            EmptyStationIdSnafu { name: &self.name }
        );
        Ok(self.selected_stations.insert(id.trim().to_string()))
    }

    pub fn selected_stations(&self) -> &IndexSet<String> {
        &self.selected_stations
    }

    pub fn epoch_format(&self) -> EpochFormat {
        self.epoch_format
    }

    /// Sets the format of the window bounds, which are converted again with the new format.
    pub fn set_epoch_format(&mut self, format: &str, converter: &TimeConverter) -> Result<(), MsrError> {
        let format = EpochFormat::from_str(format)?;
        let start = Self::convert_bound(&self.start_str, FROM_DATA_START, format, converter)?;
        let end = Self::convert_bound(&self.end_str, FROM_DATA_END, format, converter)?;
        self.epoch_format = format;
        self.start = start;
        self.end = end;
        Ok(())
    }

    fn convert_bound(
        value: &str,
        open_bound: &str,
        format: EpochFormat,
        converter: &TimeConverter,
    ) -> Result<Option<Epoch>, MsrError> {
        if value.trim() == open_bound {
            Ok(None)
        } else {
            converter.to_epoch(format, value).map(Some)
        }
    }

    /// Sets the start of the window, in the epoch format of this file, or [FROM_DATA_START].
    pub fn set_start_epoch(&mut self, value: &str, converter: &TimeConverter) -> Result<(), MsrError> {
        self.start = Self::convert_bound(value, FROM_DATA_START, self.epoch_format, converter)?;
        self.start_str = value.trim().to_string();
        Ok(())
    }

    /// Sets the end of the window, in the epoch format of this file, or [FROM_DATA_END].
    pub fn set_end_epoch(&mut self, value: &str, converter: &TimeConverter) -> Result<(), MsrError> {
        self.end = Self::convert_bound(value, FROM_DATA_END, self.epoch_format, converter)?;
        self.end_str = value.trim().to_string();
        Ok(())
    }

    pub fn start_epoch(&self) -> Option<Epoch> {
        self.start
    }

    pub fn end_epoch(&self) -> Option<Epoch> {
        self.end
    }

    pub fn start_epoch_str(&self) -> &str {
        &self.start_str
    }

    pub fn end_epoch_str(&self) -> &str {
        &self.end_str
    }

    pub fn add_filter(&mut self, filter: ObservationFilter) {
        self.filters.push(filter);
    }

    pub fn filters(&self) -> &[ObservationFilter] {
        &self.filters
    }

    /// Initializes the stream and adopts the type of its records.
    pub fn initialize(&mut self) -> Result<(), MsrError> {
        let stream = self.stream.as_mut().ok_or_else(|| MsrError::NoStream {
            name: self.name.clone(),
        })?;
        stream.initialize().map_err(|e| MsrError::StreamInit {
            name: self.name.clone(),
            stream: stream.stream_name().to_string(),
            reason: e.to_string(),
        })?;
        self.obs_type = stream.type_name().to_string();
        Ok(())
    }

    /// Opens the stream for write when simulating, for read otherwise. Ramp tables are always read.
    pub fn open_stream(&mut self, simulate: bool) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            warn!("{} has no stream to open", self.name);
            return false;
        };
        let write = simulate && !stream.is_ramp_table();
        self.selected = 0;
        let opened = stream.open(!write, write);
        if opened {
            debug!(
                "opened {} ({}) for {}",
                self.name,
                stream.stream_name(),
                if write { "write" } else { "read" }
            );
        }
        opened
    }

    pub fn is_open(&self) -> bool {
        self.stream.as_ref().map_or(false, |s| s.is_open())
    }

    pub fn is_writable(&self) -> bool {
        self.stream.as_ref().map_or(false, |s| s.is_writable())
    }

    pub fn close_stream(&mut self) -> bool {
        match self.stream.as_mut() {
            Some(stream) if stream.is_open() => stream.close(),
            _ => true,
        }
    }

    fn in_window(&self, epoch: Epoch) -> bool {
        self.start.map_or(true, |start| epoch >= start) && self.end.map_or(true, |end| epoch <= end)
    }

    fn station_selected(&self, station: Option<&str>) -> bool {
        self.selected_stations.is_empty()
            || station.map_or(false, |s| self.selected_stations.contains(s))
    }

    /// Deterministic thinning: the n-th selected record is kept when floor((n+1)r) > floor(nr).
    fn thin(&mut self) -> bool {
        let n = self.selected as f64;
        self.selected += 1;
        ((n + 1.0) * self.thinning_ratio).floor() > (n * self.thinning_ratio).floor()
    }

    /// Reads the next observation which passes the selection of this file, None once the stream is exhausted.
    pub fn read_observation(&mut self) -> Option<ObservationData> {
        loop {
            let mut obs = self.stream.as_mut()?.read_observation()?;
            if !self.in_window(obs.epoch) || !self.station_selected(obs.tracker()) {
                debug!("{}: {obs} is outside of the selection", self.name);
                continue;
            }
            if let Some(filter) = self.filters.iter().find(|f| !f.keeps(&obs)) {
                debug!("{}: {obs} removed by {filter}", self.name);
                continue;
            }
            if !self.thin() {
                continue;
            }
            obs.source = Some(self.name.clone());
            return Some(obs);
        }
    }

    /// Reads the next ramp record within the window of this file, None once the stream is exhausted.
    pub fn read_ramp_table_data(&mut self) -> Option<RampTableData> {
        loop {
            let mut rec = self.stream.as_mut()?.read_ramp_table_data()?;
            let station = rec.participants.first().map(|s| s.as_str());
            if self.in_window(rec.epoch) && self.station_selected(station) {
                rec.source = Some(self.name.clone());
                return Some(rec);
            }
        }
    }

    /// Writes an observation to the stream, which must be open for write.
    pub fn write_observation(&mut self, obs: &ObservationData) -> bool {
        match self.stream.as_mut() {
            Some(stream) if stream.is_writable() => stream.add_measurement(obs),
            _ => {
                warn!("{} is not open for write", self.name);
                false
            }
        }
    }

    /// Writes a computed measurement to the stream as an observation.
    pub fn write_measurement(&mut self, data: &MeasurementData) -> bool {
        self.write_observation(&data.to_observation())
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{} .. {}] thinning ratio {}",
            self.name,
            self.stream_name().unwrap_or("no stream"),
            self.start_str,
            self.end_str,
            self.thinning_ratio
        )
    }
}

/// Configuration of the stream of a data file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StreamCfg {
    Gmd { path: String },
    RampTable { path: String },
    Memory { name: String },
}

impl StreamCfg {
    pub fn build(&self, converter: &TimeConverter) -> Box<dyn ObsStream> {
        match self {
            Self::Gmd { path } => Box::new(GmdStream::new(path, converter)),
            Self::RampTable { path } => Box::new(RampTableStream::new(path, converter)),
            Self::Memory { name } => Box::new(MemoryStream::new(name)),
        }
    }
}

fn default_ratio() -> f64 {
    1.0
}

fn default_format() -> EpochFormat {
    EpochFormat::TAIModJulian
}

fn default_start() -> String {
    FROM_DATA_START.to_string()
}

fn default_end() -> String {
    FROM_DATA_END.to_string()
}

/// Serializable representation of a [DataFile].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataFileCfg {
    pub name: String,
    pub stream: StreamCfg,
    #[serde(default = "default_ratio")]
    pub thinning_ratio: f64,
    #[serde(default)]
    pub selected_stations: Vec<String>,
    #[serde(default = "default_format")]
    pub epoch_format: EpochFormat,
    #[serde(default = "default_start")]
    pub start_epoch: String,
    #[serde(default = "default_end")]
    pub end_epoch: String,
    #[serde(default)]
    pub filters: Vec<ObservationFilter>,
}

impl ConfigRepr for DataFileCfg {}

#[cfg(test)]
mod datafile_ut {
    use super::*;
    use crate::msr::{MeasurementType, RampType};
    use crate::time::TimeUnits;

    fn observations(t0: Epoch) -> Vec<ObservationData> {
        (0..10)
            .map(|i| {
                let gs = if i % 2 == 0 { "GS1" } else { "GS2" };
                ObservationData::new(
                    t0 + (i as i64).minutes(),
                    MeasurementType::Range,
                    vec![gs.to_string(), "SC".to_string()],
                    vec![1000.0 + i as f64],
                )
            })
            .collect()
    }

    fn read_all(df: &mut DataFile) -> Vec<ObservationData> {
        let mut all = Vec::new();
        while let Some(obs) = df.read_observation() {
            all.push(obs);
        }
        all
    }

    #[test]
    fn setters_validate() {
        let mut df = DataFile::new("ObsData");
        assert_eq!(df.thinning_ratio(), 1.0);
        assert!(df.set_thinning_ratio(0.5).is_ok());
        for bad in [-0.1, 1.5, f64::NAN] {
            let err = df.set_thinning_ratio(bad).unwrap_err();
            assert!(matches!(err, MsrError::InvalidThinningRatio { .. }));
            assert_eq!(df.thinning_ratio(), 0.5, "prior value is kept");
        }

        assert!(df.add_selected_station("").is_err());
        assert!(df.add_selected_station("   ").is_err());
        assert!(df.add_selected_station("GS1").unwrap());
        assert!(!df.add_selected_station("GS1").unwrap());
        assert_eq!(df.selected_stations().len(), 1);

        let conv = TimeConverter::new();
        assert!(df.set_start_epoch("not an epoch", &conv).is_err());
        assert_eq!(df.start_epoch_str(), FROM_DATA_START);
        df.set_start_epoch("30000.5", &conv).unwrap();
        let start = df.start_epoch().unwrap();
        df.set_epoch_format("A1ModJulian", &conv).unwrap();
        assert!(df.start_epoch().unwrap() < start);
        assert!(df.set_epoch_format("GPSModJulian", &conv).is_err());
        assert_eq!(df.epoch_format(), EpochFormat::A1ModJulian);
    }

    #[test]
    fn initialize_requires_a_stream() {
        let mut df = DataFile::new("Empty");
        assert!(matches!(df.initialize(), Err(MsrError::NoStream { .. })));
        assert!(!df.open_stream(false));

        let conv = TimeConverter::new();
        let mut df = DataFile::new("NoPath").with_stream(Box::new(GmdStream::new("", &conv)));
        assert!(matches!(df.initialize(), Err(MsrError::StreamInit { .. })));
    }

    #[test]
    fn ramp_tables_open_read_only() {
        let t0 = Epoch::from_gregorian_tai_at_midnight(2024, 1, 1);
        let ramps = vec![RampTableData {
            epoch: t0,
            participants: vec!["GS1".to_string(), "SC".to_string()],
            uplink_band: 1,
            ramp_type: RampType::Snap,
            frequency_hz: 2.1e9,
            rate_hz_s: 0.0,
            source: None,
        }];
        let mut df =
            DataFile::new("Ramps").with_stream(Box::new(MemoryStream::new("ramps").with_ramps(ramps)));
        df.initialize().unwrap();
        assert_eq!(df.obs_type(), RAMP_TABLE_TYPE_NAME);
        assert!(df.open_stream(true));
        assert!(df.is_open());
        assert!(!df.is_writable());
        let rec = df.read_ramp_table_data().unwrap();
        assert_eq!(rec.source.as_deref(), Some("Ramps"));
        assert!(df.read_ramp_table_data().is_none());
    }

    #[test]
    fn selection_and_thinning() {
        let t0 = Epoch::from_gregorian_tai_at_midnight(2024, 1, 1);
        let stream = MemoryStream::new("mem").with_observations(observations(t0));
        let mut df = DataFile::new("Obs").with_stream(Box::new(stream));
        df.initialize().unwrap();

        assert!(df.open_stream(false));
        assert_eq!(read_all(&mut df).len(), 10);

        df.add_selected_station("GS1").unwrap();
        assert!(df.open_stream(false));
        let gs1 = read_all(&mut df);
        assert_eq!(gs1.len(), 5);
        assert!(gs1.iter().all(|o| o.tracker() == Some("GS1")));
        assert!(gs1.iter().all(|o| o.source.as_deref() == Some("Obs")));

        df.set_thinning_ratio(0.4).unwrap();
        assert!(df.open_stream(false));
        assert_eq!(read_all(&mut df).len(), 2);

        df.set_thinning_ratio(0.0).unwrap();
        assert!(df.open_stream(false));
        assert!(read_all(&mut df).is_empty());

        let mut df = DataFile::new("Obs").with_stream(Box::new(
            MemoryStream::new("mem").with_observations(observations(t0)),
        ));
        df.add_filter(ObservationFilter::reject("late").with_window(t0 + 5.minutes(), t0 + 1.hours()));
        assert!(df.open_stream(false));
        assert_eq!(read_all(&mut df).len(), 5);
    }

    #[test]
    fn clone_is_deep() {
        let t0 = Epoch::from_gregorian_tai_at_midnight(2024, 1, 1);
        let mut df = DataFile::new("Obs").with_stream(Box::new(
            MemoryStream::new("mem").with_observations(observations(t0)),
        ));
        assert!(df.open_stream(false));
        let _ = df.read_observation();
        let mut copy = df.clone();
        assert!(!copy.is_open());
        assert!(copy.open_stream(false));
        assert_eq!(read_all(&mut copy).len(), 10);
        assert_eq!(read_all(&mut df).len(), 9);
    }

    #[test]
    fn from_yaml() {
        let yaml = r#"
name: ObsData.gmd
stream:
  kind: Gmd
  path: ObsData.gmd
thinning_ratio: 1.0
epoch_format: TAIModJulian
selected_stations: [GS1, GS2, GS1]
"#;
        let cfg = DataFileCfg::loads(yaml).unwrap();
        let df = DataFile::from_config(&cfg, &TimeConverter::new()).unwrap();
        assert_eq!(df.name(), "ObsData.gmd");
        assert_eq!(df.stream_name(), Some("ObsData.gmd"));
        assert_eq!(df.selected_stations().len(), 2);
        assert!(df.start_epoch().is_none() && df.end_epoch().is_none());

        let bad = DataFileCfg {
            thinning_ratio: 2.0,
            ..cfg
        };
        assert!(DataFile::from_config(&bad, &TimeConverter::new()).is_err());
    }
}
