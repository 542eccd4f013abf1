// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Battery level type for sensor devices.

use std::fmt;

use serde_json::Value;

use crate::error::{ParseError, ValueError};

/// Battery charge of a sensor, in percent (0-100).
///
/// Devices that do not report a level are assumed full. A level strictly
/// below [`BatteryLevel::LOW_THRESHOLD`] is reported as low.
///
/// # Examples
///
/// ```
/// use mhub_bridge::types::BatteryLevel;
///
/// assert_eq!(BatteryLevel::default().value(), 100);
/// assert!(BatteryLevel::new(19).unwrap().is_low());
/// assert!(!BatteryLevel::new(20).unwrap().is_low());
/// assert!(BatteryLevel::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    /// Maximum level.
    pub const MAX: u8 = 100;

    /// Levels below this are low.
    pub const LOW_THRESHOLD: u8 = 20;

    /// A full battery, also the level assumed when none is reported.
    pub const FULL: Self = Self(Self::MAX);

    /// Creates a battery level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `value` exceeds 100.
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

    /// Creates a battery level, clamping to 100.
    #[must_use]
    pub fn clamped(value: u64) -> Self {
        // Clamped to MAX first, so the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        Self(value.min(u64::from(Self::MAX)) as u8)
    }

    /// Returns the level in percent.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns `true` when the level is below 20%.
    #[must_use]
    pub const fn is_low(&self) -> bool {
        self.0 < Self::LOW_THRESHOLD
    }

    /// Parses the `b` field of a device payload.
    ///
    /// Accepts integers, floats (rounded) and numeric text. `null` yields
    /// `None` so that callers can apply their own default.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` for negative numbers, booleans,
    /// objects, arrays or non-numeric text.
    pub fn from_wire(value: &Value) -> Result<Option<Self>, ParseError> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Ok(Some(Self::clamped(v)));
                }
                match n.as_f64() {
                    Some(v) if v.is_finite() && v >= 0.0 => {
                        // Non-negative and finite; huge values clamp to MAX
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let rounded = v.round() as u64;
                        Ok(Some(Self::clamped(rounded)))
                    }
                    _ => Err(ParseError::invalid("b", format!("invalid battery level {n}"))),
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<u64>()
                .map(|v| Some(Self::clamped(v)))
                .map_err(|_| ParseError::invalid("b", format!("invalid battery level {s:?}"))),
            other => Err(ParseError::invalid(
                "b",
                format!("expected a number, got {other}"),
            )),
        }
    }
}

impl Default for BatteryLevel {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn low_threshold_boundary() {
        assert!(BatteryLevel::new(0).unwrap().is_low());
        assert!(BatteryLevel::new(19).unwrap().is_low());
        assert!(!BatteryLevel::new(20).unwrap().is_low());
        assert!(!BatteryLevel::FULL.is_low());
    }

    #[test]
    fn new_rejects_over_100() {
        assert!(matches!(
            BatteryLevel::new(150),
            Err(ValueError::OutOfRange { actual: 150, .. })
        ));
    }

    #[test]
    fn from_wire_null_is_none() {
        assert_eq!(BatteryLevel::from_wire(&Value::Null).unwrap(), None);
    }

    #[test]
    fn from_wire_numbers_and_text() {
        assert_eq!(
            BatteryLevel::from_wire(&json!(42)).unwrap(),
            Some(BatteryLevel(42))
        );
        assert_eq!(
            BatteryLevel::from_wire(&json!(41.6)).unwrap(),
            Some(BatteryLevel(42))
        );
        assert_eq!(
            BatteryLevel::from_wire(&json!("17")).unwrap(),
            Some(BatteryLevel(17))
        );
        assert_eq!(
            BatteryLevel::from_wire(&json!(250)).unwrap(),
            Some(BatteryLevel::FULL)
        );
    }

    #[test]
    fn from_wire_rejects_garbage() {
        assert!(BatteryLevel::from_wire(&json!(-3)).is_err());
        assert!(BatteryLevel::from_wire(&json!("full")).is_err());
        assert!(BatteryLevel::from_wire(&json!([1])).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(BatteryLevel(55).to_string(), "55%");
    }
}
