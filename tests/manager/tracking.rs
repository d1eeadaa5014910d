use super::{range, reversed_observations, setup_manager, two_way_range};
use crate::{temp_file, test_epoch};
use nyx::prelude::*;

#[test]
fn disallowed_measurement_is_rejected() {
    let mut mgr = setup_manager();
    mgr.define_model(range("GS1Range", "GS1")).unwrap();
    let mut system = TrackingSystem::new("DeepSpace", TrackingSystemKind::DSN);
    system.add_measurement_name("GS1Range");
    mgr.add_measurement(system).unwrap();

    let err = mgr.initialize().unwrap_err();
    assert!(matches!(err, MsrError::DisallowedMeasurement { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Range"), "{msg}");
    assert!(msg.contains("DSNTrackingSystem"), "{msg}");
}

#[test]
fn allowed_measurement_is_retrievable() {
    let mut mgr = setup_manager();
    let mut system = TrackingSystem::new("Ground", TrackingSystemKind::Ground);
    system.set_ref_object(range("GS1Range", "GS1")).unwrap();
    let id = mgr.add_measurement(system).unwrap();
    mgr.initialize().unwrap();

    let handle = mgr.handle_of(id).unwrap();
    assert_eq!(mgr.get_model(handle).unwrap().name, "GS1Range");
    let data = mgr.get_measurement(handle).unwrap();
    assert_eq!(data.msr_type, MeasurementType::Range);
    assert_eq!(data.unfeasibility_reason, "NotCalculated");
    assert!(mgr.handle_of(99_999).is_none());
}

#[test]
fn file_set_configurations_from_observations() {
    let mut mgr = setup_manager();
    mgr.add_data_file(DataFile::new("tracking.gmd").with_stream(Box::new(
        MemoryStream::new("tracking").with_observations(reversed_observations(&["GS1", "GS2"], 8)),
    )))
    .unwrap();
    let set = TrackingFileSet::builder()
        .name("Tracking".to_string())
        .files(vec!["tracking.gmd".to_string()])
        .light_time(LightTimeCfg::default())
        .build();
    let id = mgr.add_measurement(set).unwrap();
    mgr.initialize().unwrap();
    // Nothing to build before the observations are known
    assert!(mgr.handles_of_attachment(id).is_empty());

    mgr.prepare_for_processing(false).unwrap();
    let handles = mgr.handles_of_attachment(id);
    assert_eq!(handles.len(), 2);
    assert_eq!(mgr.get_id(handles[0]).unwrap(), id);
    assert_eq!(
        mgr.measurement_names(),
        vec![
            "Tracking_USNTwoWayRange_GS1_SC",
            "Tracking_USNTwoWayRange_GS2_SC"
        ]
    );
    let set = mgr.tracking_file_sets().next().unwrap();
    assert_eq!(set.configs.len(), 2);

    // The first observation is computed by the model derived from it
    assert_eq!(mgr.active_measurements(), &[handles[0]]);
    assert!(mgr.calculate_measurements(false, true, false).unwrap());
    assert_eq!(mgr.process_all_events().unwrap(), 0);
    assert!(mgr.get_measurement(handles[0]).unwrap().is_feasible);
}

#[test]
fn scenario_from_yaml() {
    let obs_path = temp_file(
        "scenario.gmd",
        &[
            "30431.500000000000    Range    9000    GS1    SC    7000.0",
            "30431.500694444444    Range    9000    GS1    SC    7010.0",
            "30431.501388888889    Range    9000    GS1    SC    7020.0",
        ],
    );
    let path_line = format!("  path: {obs_path}");
    let df_path = temp_file(
        "datafile.yaml",
        &[
            "name: scenario.gmd",
            "stream:",
            "  kind: Gmd",
            path_line.as_str(),
            "epoch_format: TAIGregorian",
            "end_epoch: 01 May 2024 00:01:30.000",
        ],
    );
    let df = DataFile::load(&df_path, &TimeConverter::new()).unwrap();
    assert_eq!(df.end_epoch(), Some(test_epoch() + 90.seconds()));

    let set = TrackingFileSet::loads(
        r#"
name: Scenario
configs:
  - strand: [GS1, SC]
    types: [Range]
files: [scenario.gmd]
"#,
    )
    .unwrap();

    assert!(matches!(
        DataFile::load(crate::temp_path("missing.yaml"), &TimeConverter::new()),
        Err(MsrError::Config { .. })
    ));

    let mut mgr = setup_manager();
    mgr.add_data_file(df).unwrap();
    let id = mgr.add_measurement(set).unwrap();
    mgr.initialize().unwrap();
    assert_eq!(mgr.tracking_data_adapters().count(), 0);
    assert_eq!(mgr.handles_of_attachment(id).len(), 1);

    mgr.prepare_for_processing(false).unwrap();
    // The last record is after the end of the window
    assert_eq!(mgr.observations().len(), 2);
    assert!(mgr.calculate_measurements(false, false, false).unwrap());
    let handle = mgr.active_measurements()[0];
    assert_eq!(mgr.observation_residual(handle).unwrap().len(), 1);
}

#[test]
fn attachments_are_listed_in_order() {
    let mut mgr = setup_manager();
    mgr.add_measurement(two_way_range("A", "GS1")).unwrap();
    mgr.add_measurement(TrackingSystem::new("B", TrackingSystemKind::USN))
        .unwrap();
    let kinds: Vec<(i32, &str)> = mgr
        .attachments()
        .map(|(id, attachment)| (id, attachment.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![(10_000, "measurement model"), (10_001, "tracking system")]
    );
    assert!(mgr.to_string().contains("Unconfigured"));
}
