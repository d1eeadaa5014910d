use super::setup_manager;
use crate::test_epoch;
use nyx::msr::DEFAULT_UPLINK_FREQUENCY_HZ;
use nyx::prelude::*;

const RAMPED_HZ: f64 = 7.2e9;

fn ramp(offset: Duration, station: &str, frequency_hz: f64) -> RampTableData {
    RampTableData {
        epoch: test_epoch() + offset,
        participants: vec![station.to_string(), "SC".to_string()],
        uplink_band: 2,
        ramp_type: RampType::Snap,
        frequency_hz,
        rate_hz_s: 0.0,
        source: None,
    }
}

fn doppler(name: &str) -> MeasurementModel {
    MeasurementModel::builder()
        .name(name.to_string())
        .msr_type(MeasurementType::DSNTwoWayDoppler)
        .participants(vec!["GS1".to_string(), "SC".to_string()])
        .light_time(LightTimeCfg::default())
        .build()
}

/// A simulating manager whose Doppler reads its uplink frequency from the `dsn.rmp` ramp table
fn ramped_manager() -> (MeasurementManager, MsrHandle, MsrHandle) {
    let mut mgr = setup_manager();
    mgr.add_data_file(DataFile::new("dsn.gmd").with_stream(Box::new(MemoryStream::new("dsn.gmd"))))
        .unwrap();
    // Out of order, and with a record of another station
    let ramps = vec![
        ramp(2.hours(), "GS1", 3.0 * RAMPED_HZ),
        ramp(-1.hours(), "GS1", RAMPED_HZ),
        ramp(-2.hours(), "GS1", 0.5 * RAMPED_HZ),
        ramp(5.minutes(), "GS2", 2.0 * RAMPED_HZ),
    ];
    mgr.add_data_file(
        DataFile::new("dsn.rmp").with_stream(Box::new(MemoryStream::new("dsn.rmp").with_ramps(ramps))),
    )
    .unwrap();

    let adapter = TrackingDataAdapter::new(doppler("Ramped"), &["dsn.gmd"], &["dsn.rmp"]).unwrap();
    let ramped = mgr.add_measurement(adapter).unwrap();
    let nominal = mgr.add_measurement(doppler("Nominal")).unwrap();
    mgr.initialize().unwrap();
    assert!(mgr.prepare_for_processing(true).unwrap());
    mgr.set_epoch(test_epoch() + 10.minutes());
    let ramped = mgr.handle_of(ramped).unwrap();
    let nominal = mgr.handle_of(nominal).unwrap();
    (mgr, ramped, nominal)
}

#[test]
fn ramp_tables_are_loaded_per_data_file() {
    let (mut mgr, _, _) = ramped_manager();
    assert!(mgr.data_file("dsn.rmp").unwrap().is_ramp_table());
    assert!(!mgr.data_file("dsn.rmp").unwrap().is_writable());
    assert!(mgr.data_file("dsn.gmd").unwrap().is_writable());
    assert!(mgr.ramp_table("dsn.gmd").is_none());

    let table = mgr.ramp_table("dsn.rmp").unwrap();
    assert_eq!(table.len(), 4);
    assert!(table.windows(2).all(|pair| pair[0].epoch <= pair[1].epoch));
    assert_eq!(table[0].frequency_hz, 0.5 * RAMPED_HZ);

    // Loading again reads the same records
    assert_eq!(mgr.load_ramp_tables(), 4);
    assert_eq!(mgr.ramp_table("dsn.rmp").unwrap().len(), 4);
}

#[test]
fn uplink_frequency_comes_from_the_ramp_table() {
    let (mut mgr, ramped, nominal) = ramped_manager();
    assert!(mgr.calculate_measurements(true, false, false).unwrap());

    let inline = mgr.get_measurement(ramped).unwrap().clone();
    assert!(inline.is_feasible);
    assert_eq!(inline.uplink_frequency_hz, Some(RAMPED_HZ));
    let reference = mgr.get_measurement(nominal).unwrap().clone();
    assert_eq!(reference.uplink_frequency_hz, Some(DEFAULT_UPLINK_FREQUENCY_HZ));
    // Doppler scales with the transmitted frequency
    let scale = RAMPED_HZ / DEFAULT_UPLINK_FREQUENCY_HZ;
    let tolerance = 1e-6 * inline.values[0].abs().max(1.0);
    assert!((inline.values[0] - scale * reference.values[0]).abs() < tolerance);

    // Same frequency once the light-time events are processed
    assert!(mgr.calculate_measurements(true, true, false).unwrap());
    assert_eq!(mgr.get_measurement(ramped).unwrap().uplink_frequency_hz, None);
    assert_eq!(mgr.process_all_events().unwrap(), 0);
    let with_events = mgr.get_measurement(ramped).unwrap();
    assert!(with_events.is_final());
    assert_eq!(with_events.uplink_frequency_hz, Some(RAMPED_HZ));
    assert!((with_events.values[0] - inline.values[0]).abs() < tolerance);

    // The partials are scaled by the same frequency
    let partials = mgr.calculate_derivatives("SC", "Velocity", ramped).unwrap().clone();
    let nominal_partials = mgr.calculate_derivatives("SC", "Velocity", nominal).unwrap();
    assert_eq!(partials.shape(), nominal_partials.shape());
    assert!((&partials - nominal_partials * scale).norm() <= 1e-9 * partials.norm());
}
