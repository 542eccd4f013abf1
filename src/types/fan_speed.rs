// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan speed level type.
//!
//! Fan dimmers run at one of six discrete levels while hosts work in
//! rotation-speed percentages. One level is worth [`FanLevel::STEP`] percent.

use std::fmt;

use crate::error::ValueError;

/// Discrete fan speed level (0-6).
///
/// Level 0 only appears when a host asks for 0%; devices themselves report
/// 1 to 6.
///
/// # Examples
///
/// ```
/// use mhub_bridge::types::FanLevel;
///
/// let level = FanLevel::from_percentage(100.0).unwrap();
/// assert_eq!(level.value(), 6);
///
/// let low = FanLevel::from_percentage(10.0).unwrap();
/// assert_eq!(low.value(), 1);
/// assert!((low.percentage() - 16.67).abs() < 1e-9);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FanLevel(u8);

impl FanLevel {
    /// Highest level.
    pub const MAX: u8 = 6;

    /// Percentage covered by one level.
    pub const STEP: f64 = 16.67;

    /// Creates a fan level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `value` exceeds 6.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > Self::MAX {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: u16::from(Self::MAX),
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Converts a rotation speed percentage into a level, rounding up.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidPercentage` unless `percentage` is a
    /// finite number in `[0, 100]`.
    pub fn from_percentage(percentage: f64) -> Result<Self, ValueError> {
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(ValueError::InvalidPercentage(percentage.to_string()));
        }
        // 100 / 16.67 rounds up to 6, so the result always fits
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = (percentage / Self::STEP).ceil() as u8;
        Ok(Self(level.min(Self::MAX)))
    }

    /// Returns the numeric level.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns the rotation speed percentage for this level, unrounded.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        Self::percentage_of(self.0)
    }

    /// Returns the rotation speed percentage for a raw level as reported.
    #[must_use]
    pub fn percentage_of(level: u8) -> f64 {
        f64::from(level) * Self::STEP
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}
