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

/// A restartable cursor over a finite sequence of observations sorted by epoch.
///
/// The cursor starts on the first observation. It only moves forward, except through [Self::reset].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservationCursor {
    position: usize,
    len: usize,
}

impl ObservationCursor {
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    /// Index of the current observation, None once the cursor moved past the last one.
    pub fn position(&self) -> Option<usize> {
        if self.position < self.len {
            Some(self.position)
        } else {
            None
        }
    }

    /// Index of the observation after the current one, if any
    pub fn peek(&self) -> Option<usize> {
        if self.position + 1 < self.len {
            Some(self.position + 1)
        } else {
            None
        }
    }

    /// Moves to the next observation, returns false when moving past the last one.
    pub fn advance(&mut self) -> bool {
        if self.position < self.len {
            self.position += 1;
        }
        self.position < self.len
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Iterator for ObservationCursor {
    type Item = usize;

    /// Yields the current index, then advances.
    fn next(&mut self) -> Option<usize> {
        let current = ObservationCursor::position(self)?;
        self.advance();
        Some(current)
    }
}
