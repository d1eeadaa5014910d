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

use crate::time::Epoch;
use rand::Rng;
use rand_distr::Normal;
use serde_derive::{Deserialize, Serialize};

/// Stochastic model of the errors of a simulated measurement value.
pub trait Stochastics {
    /// Variance of one value at the provided epoch
    fn covariance(&self, epoch: Epoch) -> f64;

    /// Draws the error of one value
    fn sample<R: Rng>(&mut self, epoch: Epoch, rng: &mut R) -> f64;
}

/// Time-uncorrelated Gaussian error, in the unit of the measurement it is attached to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoise {
    #[serde(default)]
    pub mean: f64,
    /// One sigma of the Normal distribution
    pub sigma: f64,
}

impl WhiteNoise {
    /// Zero mean noise of the provided one sigma, regardless of the integration time.
    pub fn constant_white_noise(sigma: f64) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }
}

impl Stochastics for WhiteNoise {
    fn covariance(&self, _epoch: Epoch) -> f64 {
        self.sigma.powi(2)
    }

    fn sample<R: Rng>(&mut self, _epoch: Epoch, rng: &mut R) -> f64 {
        // Normal rejects a negative sigma, and a zero sigma is noiseless
        match Normal::new(self.mean, self.sigma) {
            Ok(normal) if self.sigma > 0.0 => rng.sample(normal),
            _ => self.mean,
        }
    }
}
