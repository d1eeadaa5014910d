use super::{range, setup_manager, two_way_range};
use crate::test_epoch;
use nyx::prelude::*;

/// A simulating manager computing a two way range from GS1 and a range from GS2
fn simulating(extra: Option<MeasurementModel>) -> (MeasurementManager, MsrHandle, MsrHandle) {
    let mut mgr = setup_manager();
    let two_way = mgr.add_measurement(two_way_range("TwoWay", "GS1")).unwrap();
    let one_way = mgr.add_measurement(range("OneWay", "GS2")).unwrap();
    if let Some(model) = extra {
        mgr.add_measurement(model).unwrap();
    }
    mgr.initialize().unwrap();
    assert!(mgr.prepare_for_processing(true).unwrap());
    mgr.set_epoch(test_epoch() + 10.minutes());
    let two_way = mgr.handle_of(two_way).unwrap();
    let one_way = mgr.handle_of(one_way).unwrap();
    (mgr, two_way, one_way)
}

#[test]
fn events_resolve_one_leg_at_a_time() {
    let (mut mgr, two_way, one_way) = simulating(None);
    assert!(mgr.calculate_measurements(true, true, false).unwrap());

    // Without light time, the range is final right away
    assert!(mgr.get_measurement(one_way).unwrap().is_final());
    assert_eq!(mgr.get_event_count(one_way).unwrap(), 0);

    let pending = mgr.get_measurement(two_way).unwrap();
    assert!(!pending.is_final());
    assert!(!pending.is_feasible);
    assert_eq!(mgr.get_event_count(two_way).unwrap(), 2);
    assert!(mgr.measurement_has_events());
    assert!(matches!(
        mgr.calculate_derivatives("SC", "Position", two_way),
        Err(MsrError::InvalidState { .. })
    ));

    // Downlink first, backward in time
    let events = mgr.get_active_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].receiver, "GS1");
    assert_eq!(events[0].transmitter, "SC");
    let downlink = events[0].id;
    assert!(mgr.process_event(downlink).unwrap());
    assert_eq!(mgr.get_event_count(two_way).unwrap(), 1);

    let events = mgr.get_active_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].receiver, "SC");
    assert_eq!(events[0].transmitter, "GS1");
    assert!(events[0].rx_epoch < test_epoch() + 10.minutes());
    let uplink = events[0].id;
    assert_ne!(uplink, downlink);
    assert!(mgr.process_event(uplink).unwrap());

    assert!(!mgr.measurement_has_events());
    assert_eq!(mgr.get_event_count(two_way).unwrap(), 0);
    let data = mgr.get_measurement(two_way).unwrap();
    assert!(data.is_final());
    assert!(data.is_feasible);
    assert!(!data.is_noisy);
    assert!(data.values[0] > 0.0);

    // Processing an event twice is an error
    assert!(matches!(
        mgr.process_event(uplink),
        Err(MsrError::UnknownEvent { .. })
    ));
}

#[test]
fn events_match_inline_light_time() {
    let (mut mgr, two_way, _) = simulating(None);
    mgr.calculate_measurements(true, false, false).unwrap();
    assert!(!mgr.measurement_has_events());
    let inline = mgr.get_measurement(two_way).unwrap().values[0];

    mgr.calculate_measurements(true, true, false).unwrap();
    assert_eq!(mgr.process_all_events().unwrap(), 0);
    let with_events = mgr.get_measurement(two_way).unwrap().values[0];
    assert!((inline - with_events).abs() < 1e-9, "{inline} != {with_events}");
}

#[test]
fn noise_is_added_once_final() {
    let (mut mgr, two_way, _) = simulating(None);
    mgr.calculate_measurements(true, true, false).unwrap();
    mgr.process_all_events().unwrap();
    let clean = mgr.get_measurement(two_way).unwrap().values[0];

    mgr.calculate_measurements(true, true, true).unwrap();
    assert!(!mgr.get_measurement(two_way).unwrap().is_noisy);
    mgr.process_all_events().unwrap();
    let noisy = mgr.get_measurement(two_way).unwrap();
    assert!(noisy.is_noisy);
    let delta = (noisy.values[0] - clean).abs();
    // One sigma is a meter
    assert!(delta > 0.0 && delta < 1e-2, "noise of {delta} km");
}

#[test]
fn light_time_failure_only_affects_its_measurement() {
    let stuck = MeasurementModel::builder()
        .name("Stuck".to_string())
        .msr_type(MeasurementType::USNTwoWayRange)
        .participants(vec!["GS2".to_string(), "SC".to_string()])
        .light_time(LightTimeCfg {
            tolerance_s: 1e-9,
            max_iterations: 1,
        })
        .build();
    let (mut mgr, two_way, _) = simulating(Some(stuck));
    let stuck = mgr.handle_of(10_002).unwrap();

    mgr.calculate_measurements(true, true, false).unwrap();
    assert_eq!(mgr.get_active_events().len(), 2);
    assert_eq!(mgr.process_all_events().unwrap(), 1);

    let failed = mgr.get_measurement(stuck).unwrap();
    assert!(!failed.is_feasible);
    assert_eq!(failed.unfeasibility_reason, "LightTimeNotConverged");
    assert_eq!(mgr.get_event_count(stuck).unwrap(), 0);
    assert!(mgr.get_measurement(two_way).unwrap().is_feasible);
}

#[test]
fn derivatives_of_final_measurements() {
    let (mut mgr, two_way, one_way) = simulating(None);
    mgr.calculate_measurements(true, true, false).unwrap();
    mgr.process_all_events().unwrap();

    let partials = mgr
        .calculate_derivatives("SC", "CartesianState", one_way)
        .unwrap();
    assert_eq!(partials.shape(), (1, 6));
    let position = partials.fixed_view::<1, 3>(0, 0).norm();
    assert!((position - 1.0).abs() < 1e-9, "unit line of sight: {position}");

    // Both legs move with the spacecraft, the two way range is halved
    let partials = mgr.calculate_derivatives("SC", "Position", two_way).unwrap();
    assert_eq!(partials.shape(), (1, 3));
    assert!((partials.norm() - 1.0).abs() < 1e-3);

    let bias = mgr.calculate_derivatives("TwoWay", "Bias", two_way).unwrap();
    assert_eq!(bias[(0, 0)], 1.0);

    assert!(matches!(
        mgr.calculate_derivatives("SC", "Attitude", two_way),
        Err(MsrError::UnresolvedReference { .. })
    ));
}

#[test]
fn simulation_requires_an_epoch() {
    let mut mgr = setup_manager();
    mgr.add_measurement(range("OneWay", "GS2")).unwrap();
    mgr.initialize().unwrap();
    mgr.prepare_for_processing(true).unwrap();
    assert!(matches!(
        mgr.calculate_measurements(true, false, false),
        Err(MsrError::InvalidState { .. })
    ));
    mgr.set_epoch(test_epoch());
    assert!(mgr.calculate_measurements(true, false, false).unwrap());
    assert_eq!(mgr.get_epoch(), Some(test_epoch()));
}

#[test]
fn calculating_again_replaces_pending_events() {
    let (mut mgr, two_way, one_way) = simulating(None);
    assert_eq!(mgr.calculate(two_way, true).unwrap(), mgr.get_id(two_way).unwrap());
    mgr.calculate(two_way, true).unwrap();
    mgr.calculate(one_way, true).unwrap();
    assert_eq!(mgr.get_active_events().len(), 1);
    assert_eq!(mgr.get_event_count(two_way).unwrap(), 2);

    assert_eq!(mgr.process_all_events().unwrap(), 0);
    let data = mgr.get_measurement(two_way).unwrap();
    assert!(data.is_final());
    assert!(data.is_feasible);
    let with_events = data.values[0];

    mgr.calculate(two_way, false).unwrap();
    let inline = mgr.get_measurement(two_way).unwrap().values[0];
    assert!((inline - with_events).abs() < 1e-2);
}
