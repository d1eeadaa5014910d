use crate::{init_logger, temp_file, temp_path, test_epoch};
use nyx::datafile::{DataFile, GmdStream, RampTableStream, FROM_DATA_END, FROM_DATA_START};
use nyx::io::{EpochFormat, TimeConverter};
use nyx::msr::{MeasurementType, ObservationData};
use nyx::time::TimeUnits;
use nyx::MsrError;
use rstest::*;

#[fixture]
fn converter() -> TimeConverter {
    init_logger();
    TimeConverter::new()
}

/// Records of 2024-05-01 TAI, in no particular order, with a comment and a malformed line
const UNSORTED_GMD: &[&str] = &[
    "% Simulated two way range, km",
    "30431.502083333333    USNTwoWayRange    9004    GS1    SC    7123.456",
    "30431.500000000000    USNTwoWayRange    9004    GS1    SC    7000.0",
    "30431.501388888889    USNTwoWayRange    9004    GS2    SC    7080.5",
    "30431.500694444444    USNTwoWayRange    9004    GS2    SC    7040.25",
    "30431.5006    Range    9004    GS2    SC    1.0",
    "",
];

fn gmd_file(name: &str, converter: &TimeConverter) -> DataFile {
    let path = temp_file(name, UNSORTED_GMD);
    DataFile::new(name).with_stream(Box::new(GmdStream::new(&path, converter)))
}

#[rstest]
fn gmd_defaults_and_reading(converter: TimeConverter) {
    let mut df = gmd_file("defaults.gmd", &converter);
    assert_eq!(df.thinning_ratio(), 1.0);
    assert_eq!(df.epoch_format(), EpochFormat::TAIModJulian);
    assert_eq!(df.start_epoch_str(), FROM_DATA_START);
    assert_eq!(df.end_epoch_str(), FROM_DATA_END);

    df.initialize().unwrap();
    assert_eq!(df.obs_type(), "ObType");
    assert!(!df.is_ramp_table());

    assert!(df.open_stream(false));
    assert!(df.is_open());
    assert!(!df.is_writable());

    let mut read = Vec::new();
    while let Some(obs) = df.read_observation() {
        read.push(obs);
    }
    // The line whose type name does not match its ID is skipped
    assert_eq!(read.len(), 4);
    assert!(read
        .iter()
        .all(|obs| obs.msr_type == MeasurementType::USNTwoWayRange
            && obs.source.as_deref() == Some("defaults.gmd")));
    assert!((read[1].epoch - test_epoch()).abs() < 10.microseconds());
    assert_eq!(read[1].values, vec![7000.0]);
    // End of stream is not an error, and stays the end
    assert!(df.read_observation().is_none());
    assert!(df.close_stream());
    assert!(df.close_stream());
}

#[rstest]
fn gmd_window_and_stations(converter: TimeConverter) {
    let mut df = gmd_file("window.gmd", &converter);
    df.set_epoch_format("TAIGregorian", &converter).unwrap();
    df.set_start_epoch("01 May 2024 00:00:30.000", &converter)
        .unwrap();
    df.set_end_epoch("01 May 2024 00:02:30.000", &converter)
        .unwrap();
    assert!(df.add_selected_station("GS2").unwrap());
    assert!(!df.add_selected_station("GS2").unwrap());
    assert_eq!(df.selected_stations().len(), 1);

    df.initialize().unwrap();
    assert!(df.open_stream(false));
    let read: Vec<ObservationData> = std::iter::from_fn(|| df.read_observation()).collect();
    assert_eq!(read.len(), 2);
    assert!(read.iter().all(|obs| obs.tracker() == Some("GS2")));
}

#[rstest]
fn invalid_settings_keep_previous_values(converter: TimeConverter) {
    let mut df = gmd_file("invalid.gmd", &converter);
    df.set_thinning_ratio(0.25).unwrap();
    for ratio in [-0.1, 1.5, f64::NAN] {
        let err = df.set_thinning_ratio(ratio).unwrap_err();
        assert!(matches!(err, MsrError::InvalidThinningRatio { .. }));
        assert!(err.to_string().contains("invalid.gmd"));
        assert_eq!(df.thinning_ratio(), 0.25);
    }

    assert!(matches!(
        df.add_selected_station(""),
        Err(MsrError::EmptyStationId { .. })
    ));
    assert!(df.selected_stations().is_empty());

    assert!(df.set_epoch_format("Julian", &converter).is_err());
    assert_eq!(df.epoch_format(), EpochFormat::TAIModJulian);
    assert!(df.set_start_epoch("yesterday", &converter).is_err());
    assert!(df.set_end_epoch("1e300", &converter).is_err());
    assert_eq!(df.start_epoch_str(), FROM_DATA_START);

    df.set_epoch_format("TAIGregorian", &converter).unwrap();
    assert!(matches!(
        df.set_start_epoch("31 Feb 2024 00:00:00.000", &converter),
        Err(MsrError::InvalidEpoch { .. })
    ));
    assert_eq!(df.start_epoch_str(), FROM_DATA_START);
    assert!(df.start_epoch().is_none());
}

#[rstest]
fn ramp_table_file_opens_read_only_when_simulating(converter: TimeConverter) {
    let path = temp_file(
        "ramps.rmp",
        &[
            "% epoch station spacecraft band type frequency rate",
            "30431.5    GS1    SC    1    1    7.2e9    0.0",
            "30431.51   GS1    SC    1    2    7.2e9    10.0",
        ],
    );
    let mut df =
        DataFile::new("ramps").with_stream(Box::new(RampTableStream::new(&path, &converter)));
    df.initialize().unwrap();
    assert!(df.is_ramp_table());
    assert_eq!(df.obs_type(), "RampTableType");

    assert!(df.open_stream(true));
    assert!(df.is_open());
    assert!(!df.is_writable());
    let ramps: Vec<_> = std::iter::from_fn(|| df.read_ramp_table_data()).collect();
    assert_eq!(ramps.len(), 2);
    assert_eq!(ramps[1].rate_hz_s, 10.0);
    assert!(df.read_observation().is_none());
}

#[rstest]
fn simulated_file_is_written_then_read(converter: TimeConverter) {
    let path = temp_path("written.gmd");
    let mut df = DataFile::new("written").with_stream(Box::new(GmdStream::new(&path, &converter)));
    df.initialize().unwrap();
    assert!(df.open_stream(true));
    assert!(df.is_writable());
    for i in 0..6_i64 {
        let obs = ObservationData::new(
            test_epoch() + i.minutes(),
            MeasurementType::Range,
            vec!["GS1".to_string(), "SC".to_string()],
            vec![1_000.0 + i as f64],
        );
        assert!(df.write_observation(&obs));
    }
    assert!(df.close_stream());

    // Half of the records are kept, spread over the file
    df.set_thinning_ratio(0.5).unwrap();
    assert!(df.open_stream(false));
    let values: Vec<f64> = std::iter::from_fn(|| df.read_observation())
        .map(|obs| obs.values[0])
        .collect();
    assert_eq!(values, vec![1_001.0, 1_003.0, 1_005.0]);
}
