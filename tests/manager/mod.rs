mod events;
mod lifecycle;
mod ramps;
mod simulation;
mod tracking;

use crate::{init_logger, test_epoch, test_provider, test_station};
use nyx::prelude::*;

/// A manager with the `GS1` and `GS2` stations and the `SC` propagator
pub fn setup_manager() -> MeasurementManager {
    init_logger();
    let mut mgr = MeasurementManager::with_seed(42);
    mgr.add_ground_station(test_station("GS1")).unwrap();
    mgr.add_ground_station(test_station("GS2")).unwrap();
    mgr.set_propagator(test_provider()).unwrap();
    mgr
}

pub fn two_way_range(name: &str, station: &str) -> MeasurementModel {
    MeasurementModel::builder()
        .name(name.to_string())
        .msr_type(MeasurementType::USNTwoWayRange)
        .participants(vec![station.to_string(), "SC".to_string()])
        .light_time(LightTimeCfg::default())
        .noise(WhiteNoise::constant_white_noise(1e-3))
        .build()
}

pub fn range(name: &str, station: &str) -> MeasurementModel {
    MeasurementModel::builder()
        .name(name.to_string())
        .msr_type(MeasurementType::Range)
        .participants(vec![station.to_string(), "SC".to_string()])
        .build()
}

/// Observations of `SC` from the provided stations, one per minute, in reverse time order
pub fn reversed_observations(stations: &[&str], count: i64) -> Vec<ObservationData> {
    (0..count)
        .rev()
        .map(|i| {
            let station = stations[(i as usize) % stations.len()];
            ObservationData::new(
                test_epoch() + i.minutes(),
                MeasurementType::USNTwoWayRange,
                vec![station.to_string(), "SC".to_string()],
                vec![7_000.0 + i as f64],
            )
        })
        .collect()
}
