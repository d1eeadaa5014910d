use super::{reversed_observations, setup_manager, two_way_range};
use crate::test_epoch;
use nyx::manager::ManagerState;
use nyx::prelude::*;

fn usn_system() -> TrackingSystem {
    let mut system = TrackingSystem::new("USNSystem", TrackingSystemKind::USN);
    system.set_ref_object(two_way_range("GS1R", "GS1")).unwrap();
    system.set_ref_object(two_way_range("GS2R", "GS2")).unwrap();
    system.add_data_file_name("ObsData.gmd");
    system
}

fn obs_data_file(count: i64) -> DataFile {
    DataFile::new("ObsData.gmd").with_stream(Box::new(
        MemoryStream::new("ObsData.gmd").with_observations(reversed_observations(&["GS1", "GS2"], count)),
    ))
}

#[test]
fn estimation_lifecycle() {
    let mut mgr = setup_manager();
    let df = obs_data_file(6);
    assert_eq!(df.thinning_ratio(), 1.0);
    assert_eq!(df.epoch_format(), EpochFormat::TAIModJulian);
    mgr.add_data_file(df).unwrap();

    let id = mgr.add_measurement(usn_system()).unwrap();
    assert_eq!(mgr.state(), ManagerState::Unconfigured);
    mgr.initialize().unwrap();
    assert_eq!(mgr.state(), ManagerState::Ready);

    let handles = mgr.handles_of_attachment(id);
    assert_eq!(handles.len(), 2);
    assert_eq!(mgr.get_id(handles[0]).unwrap(), id);
    assert!(mgr.get_id(handles[1]).unwrap() > id);
    assert_eq!(mgr.measurement_names(), vec!["GS1R", "GS2R"]);
    assert_eq!(mgr.participant_list(), vec!["GS1", "SC", "GS2"]);

    assert!(mgr.prepare_for_processing(false).unwrap());
    assert_eq!(mgr.state(), ManagerState::Processing { simulating: false });
    let data_file = mgr.data_file("ObsData.gmd").unwrap();
    assert!(data_file.is_open());
    assert!(!data_file.is_writable());

    // Loading again rewinds the streams and reads the same records
    assert_eq!(mgr.load_observations(), 6);
    assert_eq!(mgr.observations().len(), 6);
    assert!(mgr
        .observations()
        .windows(2)
        .all(|pair| pair[0].epoch <= pair[1].epoch));

    let first: Vec<Epoch> = mgr.observations().iter().map(|obs| obs.epoch).collect();
    assert_eq!(mgr.get_epoch(), Some(test_epoch()));
    assert_eq!(mgr.get_next_epoch(), Some(test_epoch() + 1.minutes()));
    assert_eq!(mgr.active_measurements(), &[handles[0]]);
    // The first observation is computed without advancing
    assert!(mgr.calculate_measurements(false, false, false).unwrap());
    assert_eq!(mgr.get_measurement(handles[0]).unwrap().epoch, test_epoch());

    let mut advanced = 0;
    while mgr.advance_observation() {
        advanced += 1;
        let idx = mgr.current_index().unwrap();
        assert_eq!(mgr.get_epoch(), Some(first[idx]));
        // Stations alternate every minute
        assert_eq!(mgr.active_measurements(), &[handles[idx % 2]]);
    }
    assert_eq!(advanced, 5);
    assert!(mgr.processing_complete());
    assert!(mgr.current_observation().is_none());
    assert!(!mgr.advance_observation());

    mgr.reset();
    let mut replay = vec![mgr.get_epoch().unwrap()];
    while mgr.advance_observation() {
        replay.push(mgr.get_epoch().unwrap());
    }
    assert_eq!(replay, first);

    assert!(mgr.finalize());
    assert_eq!(mgr.state(), ManagerState::Closed);
    assert!(!mgr.data_file("ObsData.gmd").unwrap().is_open());
    assert!(mgr.finalize());
}

#[test]
fn observations_without_a_model_are_skipped() {
    let mut mgr = setup_manager();
    mgr.add_data_file(obs_data_file(4)).unwrap();
    let mut system = TrackingSystem::new("GS1only", TrackingSystemKind::USN);
    system.set_ref_object(two_way_range("GS1R", "GS1")).unwrap();
    system.add_data_file_name("ObsData.gmd");
    mgr.add_measurement(system).unwrap();
    mgr.initialize().unwrap();
    mgr.prepare_for_processing(false).unwrap();

    let mut computed = 0;
    loop {
        if !mgr.active_measurements().is_empty() {
            assert!(mgr.calculate_measurements(false, false, false).unwrap());
            computed += 1;
        } else {
            assert!(!mgr.calculate_measurements(false, false, false).unwrap());
        }
        if !mgr.advance_observation() {
            break;
        }
    }
    assert_eq!(computed, 2);
}

#[test]
fn models_defined_by_name() {
    let mut mgr = setup_manager();
    mgr.define_model(two_way_range("GS1R", "GS1")).unwrap();
    assert!(matches!(
        mgr.define_model(two_way_range("GS1R", "GS2")),
        Err(MsrError::DuplicateName { .. })
    ));

    let mut system = TrackingSystem::new("ByName", TrackingSystemKind::Ground);
    system.add_measurement_name("GS1R");
    system.add_measurement_name("Missing");
    mgr.add_measurement(system).unwrap();

    let err = mgr.initialize().unwrap_err();
    assert!(matches!(err, MsrError::UnresolvedReference { .. }));
    assert!(err.to_string().contains("Missing"));
    // Not initialized, so not usable
    assert!(mgr.prepare_for_processing(false).is_err());
}

#[test]
fn stream_failures_are_reported() {
    let mut mgr = setup_manager();
    mgr.add_data_file(DataFile::new("nostream")).unwrap();
    assert!(matches!(
        mgr.initialize(),
        Err(MsrError::NoStream { .. })
    ));

    let mut mgr = setup_manager();
    let converter = TimeConverter::new();
    mgr.add_data_file(DataFile::new("missing").with_stream(Box::new(GmdStream::new(
        &crate::temp_path("does-not-exist.gmd"),
        &converter,
    ))))
    .unwrap();
    mgr.initialize().unwrap();
    // The file cannot be opened for read: processing goes on without it
    assert!(!mgr.prepare_for_processing(false).unwrap());
    assert_eq!(mgr.load_observations(), 0);
    assert!(mgr.processing_complete());
    assert!(mgr.finalize());
}
