// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw device state.
//!
//! The hub reports state in a compact, device-native form whose shape depends
//! on the capability type. This module owns that representation, its
//! per-type defaults and the partial-merge rules for incoming updates.

use serde_json::{Value, json};

use crate::error::ParseError;
use crate::types::CapabilityType;

/// Shape of the raw state for a capability type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSchema {
    /// `[level, bitfield]` pair (switches and fans).
    Channels,
    /// Single integer (contact and motion sensors).
    Scalar,
    /// `{t, rh}` record (temperature sensor).
    Climate,
    /// Kept verbatim (unsupported types).
    Opaque,
}

impl StateSchema {
    /// Returns the schema used by a capability type.
    #[must_use]
    pub fn of(kind: &CapabilityType) -> Self {
        match default_state(kind) {
            RawDeviceState::Channels(_) => Self::Channels,
            RawDeviceState::Scalar(_) => Self::Scalar,
            RawDeviceState::Climate(_) => Self::Climate,
            RawDeviceState::Opaque(_) => Self::Opaque,
        }
    }

    /// Returns a short name for log and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Scalar => "scalar",
            Self::Climate => "climate",
            Self::Opaque => "opaque",
        }
    }
}

/// Wire `[level, bitfield]` pair.
///
/// `bitfield` holds one bit per switch channel (bit 0 = channel 0). Fans
/// store their power flag there as a plain 0/1 and their speed in `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelState {
    /// Auxiliary level (fan speed 1-6); unused by pure switches.
    pub level: u8,
    /// Channel bits, or the fan power flag.
    pub bitfield: u8,
}

/// Temperature and relative humidity reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateReading {
    /// Temperature, passed through as reported.
    pub temperature: f64,
    /// Relative humidity in percent, passed through as reported.
    pub relative_humidity: f64,
}

/// Raw state of one device, tagged by its schema.
///
/// # Examples
///
/// ```
/// use mhub_bridge::state::{RawDeviceState, default_state};
/// use mhub_bridge::types::CapabilityType;
/// use serde_json::json;
///
/// let mut state = default_state(&CapabilityType::ThreeGang);
/// assert_eq!(state.to_wire(), json!([0, 0]));
///
/// state.merge_wire(&json!([0, 5])).unwrap();
/// assert_eq!(state.as_channels().unwrap().bitfield, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RawDeviceState {
    /// Switch and fan state.
    Channels(ChannelState),
    /// Contact or motion sensor value.
    Scalar(i64),
    /// Temperature sensor reading.
    Climate(ClimateReading),
    /// Verbatim state of a device without a driver.
    Opaque(Value),
}

/// Returns the state a device of `kind` starts with when none is reported.
#[must_use]
pub fn default_state(kind: &CapabilityType) -> RawDeviceState {
    match kind {
        CapabilityType::OneGang
        | CapabilityType::TwoGang
        | CapabilityType::ThreeGang
        | CapabilityType::FourGang
        | CapabilityType::SmartPlug
        | CapabilityType::PowerPanel
        | CapabilityType::SmartRelay
        | CapabilityType::FourInchPanel
        | CapabilityType::FanDimmer => RawDeviceState::Channels(ChannelState::default()),
        CapabilityType::MotionSensor | CapabilityType::ContactSensor => RawDeviceState::Scalar(0),
        CapabilityType::TemperatureSensor => RawDeviceState::Climate(ClimateReading::default()),
        CapabilityType::Unsupported(_) => RawDeviceState::Opaque(Value::Null),
    }
}

impl RawDeviceState {
    /// Builds the state of a newly registered device.
    ///
    /// Starts from [`default_state`] and merges whatever the hub reported,
    /// so absent or `null` state yields the default.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the reported value does not fit the schema.
    pub fn from_wire(kind: &CapabilityType, value: Option<&Value>) -> Result<Self, ParseError> {
        let mut state = default_state(kind);
        if let Some(value) = value {
            state.merge_wire(value)?;
        }
        Ok(state)
    }

    /// Returns the schema of this state.
    #[must_use]
    pub fn schema(&self) -> StateSchema {
        match self {
            Self::Channels(_) => StateSchema::Channels,
            Self::Scalar(_) => StateSchema::Scalar,
            Self::Climate(_) => StateSchema::Climate,
            Self::Opaque(_) => StateSchema::Opaque,
        }
    }

    /// Merges a partial wire value into this state.
    ///
    /// Only the fields present in `value` change: a one-element array only
    /// sets the level, a record with only `rh` keeps the temperature, and
    /// `null` (or a `null` element) leaves the field as it was. On error the
    /// state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if `value` does not fit this state's schema.
    pub fn merge_wire(&mut self, value: &Value) -> Result<(), ParseError> {
        if value.is_null() {
            return Ok(());
        }

        match self {
            Self::Channels(channels) => {
                let Value::Array(items) = value else {
                    return Err(ParseError::UnexpectedFormat(format!(
                        "expected [level, bitfield], got {value}"
                    )));
                };
                let level = items.first().map(|v| parse_byte(v, "s[0]")).transpose()?;
                let bitfield = items.get(1).map(|v| parse_byte(v, "s[1]")).transpose()?;

                if let Some(level) = level.flatten() {
                    channels.level = level;
                }
                if let Some(bitfield) = bitfield.flatten() {
                    channels.bitfield = bitfield;
                }
            }
            Self::Scalar(current) => {
                *current = parse_integer(value, "s")?;
            }
            Self::Climate(reading) => {
                let Value::Object(fields) = value else {
                    return Err(ParseError::UnexpectedFormat(format!(
                        "expected {{t, rh}}, got {value}"
                    )));
                };
                let temperature = fields.get("t").map(|v| parse_float(v, "s.t")).transpose()?;
                let humidity = fields.get("rh").map(|v| parse_float(v, "s.rh")).transpose()?;

                if let Some(temperature) = temperature.flatten() {
                    reading.temperature = temperature;
                }
                if let Some(humidity) = humidity.flatten() {
                    reading.relative_humidity = humidity;
                }
            }
            Self::Opaque(current) => {
                *current = value.clone();
            }
        }
        Ok(())
    }

    /// Returns the wire form of this state.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Channels(c) => json!([c.level, c.bitfield]),
            Self::Scalar(v) => json!(v),
            Self::Climate(r) => json!({ "t": r.temperature, "rh": r.relative_humidity }),
            Self::Opaque(v) => v.clone(),
        }
    }

    /// Returns the channel pair, if this is switch or fan state.
    #[must_use]
    pub fn as_channels(&self) -> Option<&ChannelState> {
        match self {
            Self::Channels(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the channel pair mutably, if this is switch or fan state.
    pub fn as_channels_mut(&mut self) -> Option<&mut ChannelState> {
        match self {
            Self::Channels(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the scalar, if this is contact or motion state.
    #[must_use]
    pub fn as_scalar(&self) -> Option<i64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the reading, if this is temperature sensor state.
    #[must_use]
    pub fn as_climate(&self) -> Option<&ClimateReading> {
        match self {
            Self::Climate(r) => Some(r),
            _ => None,
        }
    }
}

/// Parses one byte of a channel pair. `null` means "not present".
fn parse_byte(value: &Value, field: &str) -> Result<Option<u8>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| ParseError::invalid(field, format!("{n} is not a byte"))),
        Value::String(s) => s
            .trim()
            .parse::<u8>()
            .map(Some)
            .map_err(|_| ParseError::invalid(field, format!("{s:?} is not a byte"))),
        other => Err(ParseError::invalid(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

/// Parses a sensor scalar. Integers and integer text are accepted.
fn parse_integer(value: &Value, field: &str) -> Result<i64, ParseError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ParseError::invalid(field, format!("{n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseError::invalid(field, format!("{s:?} is not an integer"))),
        other => Err(ParseError::invalid(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

/// Parses a float that may arrive as numeric text. `null` means "not present".
fn parse_float(value: &Value, field: &str) -> Result<Option<f64>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| ParseError::invalid(field, format!("{n} is not a float"))),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ParseError::invalid(field, format!("{s:?} is not a number"))),
        },
        other => Err(ParseError::invalid(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_type() {
        assert_eq!(default_state(&CapabilityType::OneGang).to_wire(), json!([0, 0]));
        assert_eq!(default_state(&CapabilityType::FanDimmer).to_wire(), json!([0, 0]));
        assert_eq!(default_state(&CapabilityType::ContactSensor).to_wire(), json!(0));
        assert_eq!(default_state(&CapabilityType::MotionSensor).to_wire(), json!(0));
        assert_eq!(
            default_state(&CapabilityType::TemperatureSensor),
            RawDeviceState::Climate(ClimateReading::default())
        );
        assert_eq!(
            default_state(&CapabilityType::Unsupported("ZZ".to_string())).to_wire(),
            Value::Null
        );
    }

    #[test]
    fn schema_of_type() {
        assert_eq!(StateSchema::of(&CapabilityType::FourGang), StateSchema::Channels);
        assert_eq!(StateSchema::of(&CapabilityType::MotionSensor), StateSchema::Scalar);
        assert_eq!(
            StateSchema::of(&CapabilityType::TemperatureSensor),
            StateSchema::Climate
        );
    }

    #[test]
    fn from_wire_absent_or_null_is_default() {
        let kind = CapabilityType::TwoGang;
        assert_eq!(
            RawDeviceState::from_wire(&kind, None).unwrap(),
            default_state(&kind)
        );
        assert_eq!(
            RawDeviceState::from_wire(&kind, Some(&Value::Null)).unwrap(),
            default_state(&kind)
        );
    }

    #[test]
    fn channel_merge_is_partial() {
        let mut state = RawDeviceState::Channels(ChannelState {
            level: 4,
            bitfield: 3,
        });

        state.merge_wire(&json!([2])).unwrap();
        assert_eq!(
            state.as_channels(),
            Some(&ChannelState {
                level: 2,
                bitfield: 3
            })
        );

        state.merge_wire(&json!([null, 1])).unwrap();
        assert_eq!(
            state.as_channels(),
            Some(&ChannelState {
                level: 2,
                bitfield: 1
            })
        );
    }

    #[test]
    fn channel_merge_error_leaves_state() {
        let mut state = RawDeviceState::Channels(ChannelState {
            level: 1,
            bitfield: 1,
        });
        assert!(state.merge_wire(&json!([3, 300])).is_err());
        assert!(state.merge_wire(&json!({"t": 1})).is_err());
        assert_eq!(
            state.as_channels(),
            Some(&ChannelState {
                level: 1,
                bitfield: 1
            })
        );
    }

    #[test]
    fn climate_merge_accepts_text_temperature() {
        let mut state = default_state(&CapabilityType::TemperatureSensor);
        state.merge_wire(&json!({"t": "21.5", "rh": 40})).unwrap();
        let reading = state.as_climate().unwrap();
        assert!((reading.temperature - 21.5).abs() < f64::EPSILON);
        assert!((reading.relative_humidity - 40.0).abs() < f64::EPSILON);

        state.merge_wire(&json!({"rh": 55.5})).unwrap();
        let reading = state.as_climate().unwrap();
        assert!((reading.temperature - 21.5).abs() < f64::EPSILON);
        assert!((reading.relative_humidity - 55.5).abs() < f64::EPSILON);
    }

    #[test]
    fn climate_rejects_non_numeric_text() {
        let mut state = default_state(&CapabilityType::TemperatureSensor);
        assert!(state.merge_wire(&json!({"t": "warm"})).is_err());
    }

    #[test]
    fn scalar_merge() {
        let mut state = default_state(&CapabilityType::ContactSensor);
        state.merge_wire(&json!(1)).unwrap();
        assert_eq!(state.as_scalar(), Some(1));
        state.merge_wire(&json!("0")).unwrap();
        assert_eq!(state.as_scalar(), Some(0));
        assert!(state.merge_wire(&json!(true)).is_err());
    }

    #[test]
    fn opaque_is_replaced_verbatim() {
        let mut state = default_state(&CapabilityType::Unsupported("XX".to_string()));
        state.merge_wire(&json!({"anything": [1, 2]})).unwrap();
        assert_eq!(state.to_wire(), json!({"anything": [1, 2]}));
    }
}
