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

use super::corrections::{shapiro_delay_km, IonosphereModel, TroposphereModel};
use super::event::{Event, Leg, LightTimeCfg};
use super::noise::{Stochastics, WhiteNoise};
use super::observation::{ramped_frequency, MeasurementData, RampTableData};
use super::provider::Participants;
use super::{MeasurementType, SPEED_OF_LIGHT_KM_S};
use crate::errors::{MsrError, UnresolvedReferenceSnafu};
use crate::io::ConfigRepr;
use crate::linalg::{DMatrix, DimName, Matrix1x6, OVector, Vector3, U6, U7};
use crate::time::Epoch;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, OHyperdual};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

/// Nominal S-band uplink frequency used when no ramp table covers a measurement
pub const DEFAULT_UPLINK_FREQUENCY_HZ: f64 = 2.0e9;
/// Conversion factor from S-band transmitted cycles to DSN range units
const DSN_RANGE_UNIT_FACTOR: f64 = 0.5;
/// S-band transponder turn around ratio
const TURN_AROUND_RATIO: f64 = 240.0 / 221.0;
/// Step of the finite differences used for angle partials, in km
const ANGLE_PARTIAL_STEP_KM: f64 = 1e-3;

/// The state elements with respect to which partial derivatives are computed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivativeParam {
    Position,
    Velocity,
    CartesianState,
    Bias,
}

impl DerivativeParam {
    pub fn size(self) -> usize {
        match self {
            Self::Position | Self::Velocity => 3,
            Self::CartesianState => 6,
            Self::Bias => 1,
        }
    }

    /// Range of the Cartesian state columns covered by this parameter
    fn state_columns(self) -> std::ops::Range<usize> {
        match self {
            Self::Position => 0..3,
            Self::Velocity => 3..6,
            Self::CartesianState => 0..6,
            Self::Bias => 0..0,
        }
    }
}

impl FromStr for DerivativeParam {
    type Err = MsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Position" => Ok(Self::Position),
            "Velocity" => Ok(Self::Velocity),
            "CartesianState" => Ok(Self::CartesianState),
            "Bias" => Ok(Self::Bias),
            _ => UnresolvedReferenceSnafu {
                owner: "derivative request",
                kind: "solve-for parameter",
                name: s,
            }
            .fail(),
        }
    }
}

/// Result of a measurement calculation: the value and the signal path it was computed on.
#[derive(Clone, Debug)]
pub struct Computation {
    pub data: MeasurementData,
    pub legs: Vec<Leg>,
}

/// A measurement model computes the value and the partial derivatives of one observable for one strand of participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct MeasurementModel {
    pub name: String,
    pub msr_type: MeasurementType,
    /// Strand of participants, starting with the tracking station
    pub participants: Vec<String>,
    /// Noise added to simulated values, also used as the measurement covariance
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub noise: Option<WhiteNoise>,
    /// Constant bias added to every value
    #[builder(default)]
    #[serde(default)]
    pub bias: f64,
    #[builder(default)]
    #[serde(default)]
    pub troposphere: TroposphereModel,
    #[builder(default)]
    #[serde(default)]
    pub ionosphere: IonosphereModel,
    #[builder(default)]
    #[serde(default)]
    pub use_relativity: bool,
    /// Light-time solution settings, None for instantaneous measurements
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub light_time: Option<LightTimeCfg>,
    #[builder(default = DEFAULT_UPLINK_FREQUENCY_HZ)]
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    /// Range values wrap around this modulo, if set
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub range_modulo: Option<f64>,
}

fn default_frequency() -> f64 {
    DEFAULT_UPLINK_FREQUENCY_HZ
}

impl ConfigRepr for MeasurementModel {}

impl MeasurementModel {
    /// Checks that the strand matches the measurement type
    pub fn validate(&self) -> Result<(), MsrError> {
        self.msr_type.check_participants(&self.participants)
    }

    /// Whether this model locates light-time events, i.e. whether it can return events instead of a final value
    pub fn supports_event_location(&self) -> bool {
        self.light_time.is_some()
    }

    pub fn signal_path(&self) -> Vec<String> {
        self.msr_type.signal_path(&self.participants)
    }

    pub fn set_corrections(&mut self, troposphere: TroposphereModel, ionosphere: IonosphereModel) {
        self.troposphere = troposphere;
        self.ionosphere = ionosphere;
    }

    /// Variance of each value of this measurement
    pub fn covariance(&self, epoch: Epoch) -> Vec<f64> {
        let variance = self.noise.map(|n| n.covariance(epoch)).unwrap_or(0.0);
        vec![variance; self.msr_type.dimension()]
    }

    /// Samples the noise of each value of this measurement
    pub fn sample_noise<R: rand::Rng>(&self, epoch: Epoch, rng: &mut R) -> Vec<f64> {
        match self.noise {
            Some(mut noise) => (0..self.msr_type.dimension())
                .map(|_| noise.sample(epoch, rng))
                .collect(),
            None => vec![0.0; self.msr_type.dimension()],
        }
    }

    /// Calculates this measurement at the provided reception epoch, solving for light time inline if configured.
    pub fn calculate(
        &self,
        epoch: Epoch,
        participants: &Participants,
        ramp_table: Option<&[RampTableData]>,
    ) -> Result<Computation, MsrError> {
        let path = self.signal_path();
        let mut legs = Vec::with_capacity(path.len() - 1);
        let mut rx_epoch = epoch;
        for (leg_no, pair) in path.windows(2).enumerate() {
            let leg = match self.light_time {
                None => Leg::instantaneous(&pair[0], &pair[1], epoch, participants)?,
                Some(cfg) => {
                    let mut event = Event::new(leg_no, leg_no, &pair[0], &pair[1], rx_epoch, cfg);
                    match event.locate(participants)? {
                        Some(leg) => leg,
                        None => {
                            let mut data =
                                MeasurementData::new(self.msr_type, epoch, self.participants.clone());
                            data.unfeasibility_reason = "LightTimeNotConverged".to_string();
                            data.covariance = self.covariance(epoch);
                            return Ok(Computation { data, legs });
                        }
                    }
                }
            };
            rx_epoch = leg.tx_epoch;
            legs.push(leg);
        }
        let data = self.evaluate(epoch, &legs, participants, ramp_table)?;
        Ok(Computation { data, legs })
    }

    /// Returns the event of the first leg of the signal path, received at the provided epoch.
    pub fn first_event(&self, epoch: Epoch, event_id: usize) -> Option<Event> {
        let cfg = self.light_time?;
        let path = self.signal_path();
        Some(Event::new(event_id, 0, &path[0], &path[1], epoch, cfg))
    }

    /// Returns the event of the leg following the solved ones, if any remains.
    pub fn next_event(&self, solved: &[Leg], event_id: usize) -> Option<Event> {
        let cfg = self.light_time?;
        let path = self.signal_path();
        let leg_no = solved.len();
        if leg_no + 1 >= path.len() {
            return None;
        }
        let rx_epoch = solved.last()?.tx_epoch;
        Some(Event::new(
            event_id,
            leg_no,
            &path[leg_no],
            &path[leg_no + 1],
            rx_epoch,
            cfg,
        ))
    }

    /// Frequency transmitted by the station which sent the signal, at transmission time
    fn transmit_frequency(&self, legs: &[Leg], ramp_table: Option<&[RampTableData]>) -> f64 {
        let Some(last) = legs.last() else {
            return self.frequency_hz;
        };
        ramp_table
            .and_then(|table| ramped_frequency(table, &last.transmitter, last.tx_epoch))
            .unwrap_or(self.frequency_hz)
    }

    /// Media and relativity delay of one leg, in km, and the elevation of the leg from its ground station if any
    fn leg_delay(&self, leg: &Leg, participants: &Participants, frequency_hz: f64) -> (f64, Option<f64>) {
        let mut delay = 0.0;
        let mut elevation = None;

        let station_end = participants
            .station(&leg.receiver)
            .map(|gs| (gs, leg.rx_epoch, leg.tx_state))
            .or_else(|| {
                participants
                    .station(&leg.transmitter)
                    .map(|gs| (gs, leg.tx_epoch, leg.rx_state))
            });

        if let Some((gs, gs_epoch, other_state)) = station_end {
            let other = other_state.fixed_rows::<3>(0).into_owned();
            let (_, el) = gs.azimuth_elevation_of(&other, gs_epoch);
            delay += self.troposphere.delay_km(el, gs.height_km);
            delay += self.ionosphere.delay_km(el, frequency_hz);
            elevation = Some(el);
        }

        if self.use_relativity {
            delay += shapiro_delay_km(
                leg.rx_state.fixed_rows::<3>(0).norm(),
                leg.tx_state.fixed_rows::<3>(0).norm(),
                leg.range_km(),
            );
        }
        (delay, elevation)
    }

    /// Computes the measurement values from a fully solved signal path.
    pub fn evaluate(
        &self,
        epoch: Epoch,
        legs: &[Leg],
        participants: &Participants,
        ramp_table: Option<&[RampTableData]>,
    ) -> Result<MeasurementData, MsrError> {
        let mut data = MeasurementData::new(self.msr_type, epoch, self.participants.clone());
        data.covariance = self.covariance(epoch);

        let frequency_hz = self.transmit_frequency(legs, ramp_table);
        if self.msr_type.uses_frequency() {
            data.uplink_frequency_hz = Some(frequency_hz);
        }

        let mut path_km = 0.0;
        let mut rate_km_s = 0.0;
        let mut min_elevation: Option<f64> = None;
        let mut blocked_by = None;
        for leg in legs {
            let (delay, elevation) = self.leg_delay(leg, participants, frequency_hz);
            path_km += leg.range_km() + delay;
            rate_km_s += leg.range_rate_km_s();
            if let Some(el) = elevation {
                min_elevation = Some(min_elevation.map_or(el, |m: f64| m.min(el)));
                let gs = participants
                    .station(&leg.receiver)
                    .or_else(|| participants.station(&leg.transmitter));
                if let Some(gs) = gs {
                    if el < gs.elevation_mask_deg && blocked_by.is_none() {
                        blocked_by = Some(gs.name.clone());
                    }
                }
            }
        }

        data.values = match self.msr_type {
            MeasurementType::Range => vec![path_km],
            MeasurementType::RangeRate => vec![rate_km_s],
            MeasurementType::USNTwoWayRange | MeasurementType::TDRSSTwoWayRange => {
                vec![path_km * 0.5]
            }
            MeasurementType::USNTwoWayRangeRate => vec![rate_km_s * 0.5],
            MeasurementType::DSNTwoWayRange => {
                vec![DSN_RANGE_UNIT_FACTOR * frequency_hz * path_km / SPEED_OF_LIGHT_KM_S]
            }
            MeasurementType::DSNTwoWayDoppler => {
                vec![-TURN_AROUND_RATIO * frequency_hz * rate_km_s / SPEED_OF_LIGHT_KM_S]
            }
            MeasurementType::AzEl | MeasurementType::RaDec => {
                let leg = legs.first().ok_or(MsrError::InvalidState {
                    action: "compute angles",
                    state: "the signal path is empty",
                })?;
                let (a, b) = self.angles(leg, &leg.tx_state.fixed_rows::<3>(0).into_owned(), participants)?;
                vec![a, b]
            }
        };

        if let Some(modulo) = self.range_modulo.filter(|m| *m > 0.0) {
            if !self.msr_type.is_rate() && !self.msr_type.is_angle() {
                for value in data.values.iter_mut() {
                    *value = value.rem_euclid(modulo);
                }
            }
        }
        for value in data.values.iter_mut() {
            *value += self.bias;
        }

        data.feasibility_value = min_elevation.unwrap_or(90.0);
        match blocked_by {
            Some(station) => {
                data.is_feasible = false;
                data.unfeasibility_reason = format!("BlockedBy{station}");
            }
            None => {
                data.is_feasible = true;
                data.unfeasibility_reason.clear();
            }
        }
        Ok(data)
    }

    /// Angles of the transmitter position seen from the receiver of the leg, in degrees.
    fn angles(
        &self,
        leg: &Leg,
        tx_pos: &Vector3<f64>,
        participants: &Participants,
    ) -> Result<(f64, f64), MsrError> {
        match self.msr_type {
            MeasurementType::AzEl => {
                let gs = participants.station(&leg.receiver).ok_or_else(|| {
                    MsrError::UnresolvedReference {
                        owner: self.name.clone(),
                        kind: "ground station",
                        name: leg.receiver.clone(),
                    }
                })?;
                Ok(gs.azimuth_elevation_of(tx_pos, leg.rx_epoch))
            }
            _ => {
                let rho = tx_pos - leg.rx_state.fixed_rows::<3>(0);
                let range = rho.norm();
                let ra_deg = rho.y.atan2(rho.x).to_degrees().rem_euclid(360.0);
                let dec_deg = (rho.z / range).clamp(-1.0, 1.0).asin().to_degrees();
                Ok((ra_deg, dec_deg))
            }
        }
    }

    /// Computes the partial derivatives of the values with respect to the `wrt` elements of the participant `obj`,
    /// from the signal path of the latest calculation. Rows are the measurement values.
    pub fn partials(
        &self,
        legs: &[Leg],
        obj: &str,
        wrt: DerivativeParam,
        participants: &Participants,
        uplink_frequency_hz: Option<f64>,
    ) -> Result<DMatrix<f64>, MsrError> {
        let dim = self.msr_type.dimension();
        let mut partials = DMatrix::<f64>::zeros(dim, wrt.size());

        if wrt == DerivativeParam::Bias {
            if obj == self.name || self.participants.first().map(|s| s.as_str()) == Some(obj) {
                partials.fill(1.0);
            }
            return Ok(partials);
        }

        let cols = wrt.state_columns();
        let frequency_hz = uplink_frequency_hz.unwrap_or(self.frequency_hz);

        if self.msr_type.is_angle() {
            let Some(leg) = legs.first() else {
                return Ok(partials);
            };
            // Angles only depend on positions: the velocity columns stay at zero.
            let sign = if leg.transmitter == obj {
                1.0
            } else if leg.receiver == obj {
                -1.0
            } else {
                return Ok(partials);
            };
            let tx_pos = leg.tx_state.fixed_rows::<3>(0).into_owned();
            for axis in 0..3 {
                if !cols.contains(&axis) {
                    continue;
                }
                let mut step = Vector3::zeros();
                step[axis] = ANGLE_PARTIAL_STEP_KM;
                let (a_plus, b_plus) = self.angles(leg, &(tx_pos + step), participants)?;
                let (a_minus, b_minus) = self.angles(leg, &(tx_pos - step), participants)?;
                let col = axis - cols.start;
                partials[(0, col)] =
                    sign * wrap_deg(a_plus - a_minus) / (2.0 * ANGLE_PARTIAL_STEP_KM);
                partials[(1, col)] = sign * (b_plus - b_minus) / (2.0 * ANGLE_PARTIAL_STEP_KM);
            }
            return Ok(partials);
        }

        let scale = match self.msr_type {
            MeasurementType::Range
            | MeasurementType::RangeRate
            | MeasurementType::AzEl
            | MeasurementType::RaDec => 1.0,
            MeasurementType::USNTwoWayRange
            | MeasurementType::TDRSSTwoWayRange
            | MeasurementType::USNTwoWayRangeRate => 0.5,
            MeasurementType::DSNTwoWayRange => {
                DSN_RANGE_UNIT_FACTOR * frequency_hz / SPEED_OF_LIGHT_KM_S
            }
            MeasurementType::DSNTwoWayDoppler => {
                -TURN_AROUND_RATIO * frequency_hz / SPEED_OF_LIGHT_KM_S
            }
        };

        let mut row = Matrix1x6::<f64>::zeros();
        for leg in legs.iter().filter(|leg| leg.involves(obj)) {
            let (_, h_tilde) = if self.msr_type.is_rate() {
                range_rate_sensitivity(&leg.relative_state())
            } else {
                range_sensitivity(&leg.relative_state())
            };
            if leg.transmitter == obj {
                row += h_tilde;
            }
            if leg.receiver == obj {
                row -= h_tilde;
            }
        }
        for (col, state_col) in cols.enumerate() {
            partials[(0, col)] = scale * row[state_col];
        }
        Ok(partials)
    }
}

impl fmt::Display for MeasurementModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({} of {:?})",
            self.name, self.msr_type, self.participants
        )
    }
}

/// Wraps an angle difference in degrees into [-180, 180)
fn wrap_deg(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Range and its sensitivity to the relative state, computed with hyperdual numbers.
fn range_sensitivity(rel: &crate::linalg::Vector6<f64>) -> (f64, Matrix1x6<f64>) {
    let state: OVector<OHyperdual<f64, U7>, U6> = hyperspace_from_vector(rel);
    let range_vec = state.fixed_rows::<3>(0).into_owned();
    let range = norm(&range_vec);

    let mut pmat = Matrix1x6::zeros();
    for j in 1..U7::dim() {
        pmat[j - 1] = range[j];
    }
    (range.real(), pmat)
}

/// Range rate and its sensitivity to the relative state, computed with hyperdual numbers.
fn range_rate_sensitivity(rel: &crate::linalg::Vector6<f64>) -> (f64, Matrix1x6<f64>) {
    let state: OVector<OHyperdual<f64, U7>, U6> = hyperspace_from_vector(rel);
    let range_vec = state.fixed_rows::<3>(0).into_owned();
    let velocity_vec = state.fixed_rows::<3>(3).into_owned();

    let delta_v_vec = velocity_vec / norm(&range_vec);
    let range_rate = range_vec.dot(&delta_v_vec);

    let mut pmat = Matrix1x6::zeros();
    for j in 1..U7::dim() {
        pmat[j - 1] = range_rate[j];
    }
    (range_rate.real(), pmat)
}
