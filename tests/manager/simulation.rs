use super::{setup_manager, two_way_range};
use crate::{temp_path, test_epoch};
use nyx::prelude::*;

fn sim_data_file(path: &str) -> DataFile {
    DataFile::new("sim.gmd").with_stream(Box::new(GmdStream::new(path, &TimeConverter::new())))
}

fn adapter(station: &str) -> TrackingDataAdapter {
    TrackingDataAdapter::new(
        two_way_range(&format!("{station}R"), station),
        &["sim.gmd"],
        &[],
    )
    .unwrap()
}

#[test]
fn simulate_then_estimate() {
    let path = temp_path("simulated.gmd");

    // Simulate ten minutes of two way ranges from both stations
    let mut sim = setup_manager();
    sim.add_data_file(sim_data_file(&path)).unwrap();
    sim.add_measurement(adapter("GS1")).unwrap();
    sim.add_measurement(adapter("GS2")).unwrap();
    sim.initialize().unwrap();
    assert!(sim.prepare_for_processing(true).unwrap());
    assert!(sim.data_file("sim.gmd").unwrap().is_writable());
    // Nothing is read when simulating
    assert!(sim.observations().is_empty());

    for minute in 0..10_i64 {
        sim.set_epoch(test_epoch() + minute.minutes());
        assert!(sim.calculate_measurements(true, true, false).unwrap());
        // Pending measurements are not written
        assert!(sim.write_measurements().unwrap());
        assert_eq!(sim.written_count(), 2 * minute as usize);

        assert_eq!(sim.process_all_events().unwrap(), 0);
        assert!(sim.write_measurements().unwrap());
        // Already written
        assert!(sim.write_measurements().unwrap());
    }
    assert_eq!(sim.written_count(), 20);
    assert!(sim.finalize());

    // Read them back and compute them again
    let mut est = setup_manager();
    est.add_data_file(sim_data_file(&path)).unwrap();
    est.add_measurement(adapter("GS1")).unwrap();
    est.add_measurement(adapter("GS2")).unwrap();
    est.initialize().unwrap();
    assert!(est.prepare_for_processing(false).unwrap());
    assert!(!est.data_file("sim.gmd").unwrap().is_writable());
    assert_eq!(est.observations().len(), 20);

    let mut processed = 0;
    loop {
        assert_eq!(est.active_measurements().len(), 1);
        let handle = est.active_measurements()[0];
        assert!(est.calculate_measurements(false, true, false).unwrap());
        assert!(est.observation_residual(handle).is_err());
        assert_eq!(est.process_all_events().unwrap(), 0);

        let residual = est.observation_residual(handle).unwrap();
        assert!(residual[0].abs() < 1e-3, "residual of {} km", residual[0]);
        let partials = est.calculate_derivatives("SC", "Position", handle).unwrap();
        assert_eq!(partials.nrows(), 1);

        // Writing is reserved to simulation
        assert!(est.write_measurement(handle).is_err());
        processed += 1;
        if !est.advance_observation() {
            break;
        }
    }
    assert_eq!(processed, 20);
    assert!(est.finalize());
}

#[test]
fn infeasible_measurements_are_not_written() {
    let mut sim = setup_manager();
    sim.add_data_file(
        DataFile::new("sim.gmd").with_stream(Box::new(MemoryStream::new("simulated"))),
    )
    .unwrap();
    sim.add_ground_station(
        GroundStation::from_point("Masked".to_string(), 0.0, 0.0, 0.0).with_elevation_mask(91.0),
    )
    .unwrap();
    let id = sim
        .add_measurement(
            TrackingDataAdapter::new(two_way_range("MaskedR", "Masked"), &["sim.gmd"], &[])
                .unwrap(),
        )
        .unwrap();
    sim.initialize().unwrap();
    sim.prepare_for_processing(true).unwrap();
    sim.set_epoch(test_epoch());
    // Infeasible once the events are processed
    assert!(sim.calculate_measurements(true, true, false).unwrap());
    sim.process_all_events().unwrap();

    let handle = sim.handle_of(id).unwrap();
    let data = sim.get_measurement(handle).unwrap();
    assert!(!data.is_feasible);
    assert_eq!(data.unfeasibility_reason, "BlockedByMasked");
    assert!(!sim.write_measurement(handle).unwrap());
    assert!(sim.write_measurements().unwrap());
    assert_eq!(sim.written_count(), 0);
}
