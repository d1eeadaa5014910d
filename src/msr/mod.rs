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

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

pub mod corrections;
pub mod event;
pub mod model;
pub mod noise;
pub mod observation;
pub mod provider;
pub mod station;
pub mod types;

pub use corrections::{IonosphereModel, TroposphereModel};
pub use event::{Event, EventStatus, Leg, LightTimeCfg};
pub use model::{Computation, DerivativeParam, MeasurementModel, DEFAULT_UPLINK_FREQUENCY_HZ};
pub use noise::{Stochastics, WhiteNoise};
pub use observation::{ExtraData, MeasurementData, ObservationData, RampTableData, RampType};
pub use provider::{KeplerianOrbit, KeplerianProvider, Participants, StateProvider, EARTH_GM_KM3_S2};
pub use station::GroundStation;
pub use types::{MeasurementFamily, MeasurementType};

pub mod prelude {
    pub use super::{
        DerivativeParam, Event, EventStatus, GroundStation, IonosphereModel, KeplerianOrbit,
        KeplerianProvider, LightTimeCfg, MeasurementData, MeasurementFamily, MeasurementModel,
        MeasurementType, ObservationData, RampTableData, RampType, StateProvider,
        TroposphereModel, WhiteNoise,
    };
}
