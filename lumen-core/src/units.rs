// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units.

/// A `FrameRate` is the number of frames, or pictures, per second expressed as a rational number.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameRate {
    /// The numerator.
    pub numer: u32,
    /// The denominator.
    pub denom: u32,
}

impl FrameRate {
    /// Creates a new `FrameRate`. Returns `None` if either the numerator or denominator is 0.
    pub fn new(numer: u32, denom: u32) -> Option<Self> {
        if numer == 0 || denom == 0 {
            return None;
        }

        Some(FrameRate { numer, denom })
    }

    /// Gets the frame rate as a floating point number of frames per second.
    pub fn as_f64(&self) -> f64 {
        if self.denom == 0 {
            return 0.0;
        }

        f64::from(self.numer) / f64::from(self.denom)
    }

    /// Scales an integer by the frame rate, rounding towards zero.
    pub fn scale(&self, value: u64) -> u64 {
        if self.denom == 0 {
            return 0;
        }

        let scaled = u128::from(value) * u128::from(self.numer) / u128::from(self.denom);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }
}

impl From<FrameRate> for f64 {
    fn from(value: FrameRate) -> Self {
        value.as_f64()
    }
}
