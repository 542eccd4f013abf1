// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory records and device identities.

use std::fmt;

use serde_json::Value;

use crate::error::ParseError;
use crate::types::{BatteryLevel, CapabilityType};

use super::RawDeviceState;

/// Stable identity of one physical device.
///
/// The hub addresses devices with composite keys of the form
/// `"<uniqueId>-<tag>"`. The unique id is what the registry keys on; the
/// capability type never changes for the life of a record.
///
/// # Examples
///
/// ```
/// use mhub_bridge::state::DeviceIdentity;
/// use mhub_bridge::types::CapabilityType;
///
/// let id = DeviceIdentity::parse_composite_key("a1b2c3-3G").unwrap();
/// assert_eq!(id.unique_id(), "a1b2c3");
/// assert_eq!(id.capability_type(), &CapabilityType::ThreeGang);
/// assert_eq!(id.composite_key(), "a1b2c3-3G");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DeviceIdentity {
    unique_id: String,
    capability_type: CapabilityType,
}

impl DeviceIdentity {
    /// Creates a device identity.
    #[must_use]
    pub fn new(unique_id: impl Into<String>, capability_type: CapabilityType) -> Self {
        Self {
            unique_id: unique_id.into(),
            capability_type,
        }
    }

    /// Parses a `"<uniqueId>-<tag>"` composite key.
    ///
    /// The tag is everything after the last `-`, so unique ids may themselves
    /// contain dashes.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the key has no `-` separator or
    /// either side is empty.
    pub fn parse_composite_key(key: &str) -> Result<Self, ParseError> {
        match key.rsplit_once('-') {
            Some((unique_id, tag)) if !unique_id.is_empty() && !tag.is_empty() => {
                Ok(Self::new(unique_id, CapabilityType::from(tag.to_string())))
            }
            _ => Err(ParseError::invalid(
                "device key",
                format!("{key:?} is not of the form <uniqueId>-<type>"),
            )),
        }
    }

    /// Extracts the unique id from a composite key.
    ///
    /// Keys without a type suffix are taken as a bare unique id.
    #[must_use]
    pub fn unique_id_of_key(key: &str) -> &str {
        key.rsplit_once('-').map_or(key, |(unique_id, _)| unique_id)
    }

    /// Returns the unique id.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Returns the capability type.
    #[must_use]
    pub fn capability_type(&self) -> &CapabilityType {
        &self.capability_type
    }

    /// Returns the `"<uniqueId>-<tag>"` key used on the wire.
    #[must_use]
    pub fn composite_key(&self) -> String {
        format!("{}-{}", self.unique_id, self.capability_type.tag())
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite_key())
    }
}

/// One accessory as held by the registry.
///
/// The registry owns every record. Drivers receive a borrow for the duration
/// of a get or set and never keep a copy, so all readers observe the same
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessoryRecord {
    identity: DeviceIdentity,
    display_name: String,
    state: RawDeviceState,
    battery: BatteryLevel,
}

impl AccessoryRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(
        identity: DeviceIdentity,
        display_name: impl Into<String>,
        state: RawDeviceState,
        battery: BatteryLevel,
    ) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            state,
            battery,
        }
    }

    /// Creates a record from the `s` and `b` fields of a device payload.
    ///
    /// Absent or `null` state takes the capability type's default; absent or
    /// `null` battery is full.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if either field does not fit.
    pub fn from_wire(
        identity: DeviceIdentity,
        display_name: impl Into<String>,
        state: Option<&Value>,
        battery: Option<&Value>,
    ) -> Result<Self, ParseError> {
        let state = RawDeviceState::from_wire(identity.capability_type(), state)?;
        let battery = match battery {
            Some(value) => BatteryLevel::from_wire(value)?.unwrap_or_default(),
            None => BatteryLevel::default(),
        };
        Ok(Self::new(identity, display_name, state, battery))
    }

    /// Returns the identity.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the unique id.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.identity.unique_id()
    }

    /// Returns the capability type.
    #[must_use]
    pub fn capability_type(&self) -> &CapabilityType {
        self.identity.capability_type()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the raw state.
    #[must_use]
    pub fn state(&self) -> &RawDeviceState {
        &self.state
    }

    /// Returns the raw state mutably.
    pub fn state_mut(&mut self) -> &mut RawDeviceState {
        &mut self.state
    }

    /// Returns the battery level.
    #[must_use]
    pub fn battery(&self) -> BatteryLevel {
        self.battery
    }

    /// Replaces the mutable fields with those of `other`, keeping identity.
    pub(crate) fn refresh_from(&mut self, other: Self) {
        self.display_name = other.display_name;
        self.state = other.state;
        self.battery = other.battery;
    }

    /// Merges a partial update into this record.
    ///
    /// Either both the state and the battery apply, or neither does.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the state does not fit the schema.
    pub fn apply_patch(&mut self, patch: &StatePatch) -> Result<(), ParseError> {
        if let Some(value) = &patch.state {
            let mut state = self.state.clone();
            state.merge_wire(value)?;
            self.state = state;
        }
        if let Some(battery) = patch.battery {
            self.battery = battery;
        }
        Ok(())
    }

    /// Merges a re-announcement of a known device.
    ///
    /// Like [`apply_patch`](Self::apply_patch), with the display name
    /// replaced only when one was sent.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the state does not fit the schema.
    pub fn refresh(
        &mut self,
        display_name: Option<String>,
        patch: &StatePatch,
    ) -> Result<(), ParseError> {
        self.apply_patch(patch)?;
        if let Some(name) = display_name {
            self.display_name = name;
        }
        Ok(())
    }
}

/// Partial update for one device, as carried by a `state` envelope.
///
/// A field that is `None` was absent (or `null`) on the wire and must not
/// change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    /// Raw state fragment to merge.
    pub state: Option<Value>,
    /// New battery level.
    pub battery: Option<BatteryLevel>,
}

impl StatePatch {
    /// Builds a patch from the `s` and `b` fields of a payload.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if `b` is not a valid battery level.
    pub fn from_wire(state: Option<&Value>, battery: Option<&Value>) -> Result<Self, ParseError> {
        let battery = match battery {
            Some(value) => BatteryLevel::from_wire(value)?,
            None => None,
        };
        Ok(Self {
            state: state.filter(|v| !v.is_null()).cloned(),
            battery,
        })
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.battery.is_none()
    }

    /// Returns `true` if the state fragment carries a non-null element at
    /// `index` of a `[level, bitfield]` pair.
    #[must_use]
    pub fn has_state_element(&self, index: usize) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.as_array())
            .and_then(|items| items.get(index))
            .is_some_and(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_key_with_dashed_id() {
        let id = DeviceIdentity::parse_composite_key("ab-cd-FD").unwrap();
        assert_eq!(id.unique_id(), "ab-cd");
        assert_eq!(id.capability_type(), &CapabilityType::FanDimmer);
    }

    #[test]
    fn composite_key_invalid() {
        assert!(DeviceIdentity::parse_composite_key("nodash").is_err());
        assert!(DeviceIdentity::parse_composite_key("-1G").is_err());
        assert!(DeviceIdentity::parse_composite_key("abc-").is_err());
    }

    #[test]
    fn unique_id_of_key() {
        assert_eq!(DeviceIdentity::unique_id_of_key("abc-CS"), "abc");
        assert_eq!(DeviceIdentity::unique_id_of_key("abc"), "abc");
    }

    #[test]
    fn from_wire_defaults() {
        let identity = DeviceIdentity::new("s1", CapabilityType::MotionSensor);
        let record = AccessoryRecord::from_wire(identity, "Hall", None, Some(&Value::Null)).unwrap();
        assert_eq!(record.state(), &RawDeviceState::Scalar(0));
        assert_eq!(record.battery(), BatteryLevel::FULL);
        assert_eq!(record.display_name(), "Hall");
    }

    #[test]
    fn apply_patch_is_atomic() {
        let identity = DeviceIdentity::new("s1", CapabilityType::ContactSensor);
        let mut record =
            AccessoryRecord::from_wire(identity, "Door", Some(&json!(1)), Some(&json!(80))).unwrap();

        let bad = StatePatch {
            state: Some(json!([1, 2])),
            battery: Some(BatteryLevel::new(5).unwrap()),
        };
        assert!(record.apply_patch(&bad).is_err());
        assert_eq!(record.state(), &RawDeviceState::Scalar(1));
        assert_eq!(record.battery().value(), 80);
    }

    #[test]
    fn patch_without_battery_keeps_battery() {
        let identity = DeviceIdentity::new("s1", CapabilityType::ContactSensor);
        let mut record =
            AccessoryRecord::from_wire(identity, "Door", Some(&json!(1)), Some(&json!(35))).unwrap();

        let patch = StatePatch::from_wire(Some(&json!(0)), None).unwrap();
        record.apply_patch(&patch).unwrap();
        assert_eq!(record.state(), &RawDeviceState::Scalar(0));
        assert_eq!(record.battery().value(), 35);
    }

    #[test]
    fn refresh_keeps_absent_fields() {
        let identity = DeviceIdentity::new("abc", CapabilityType::ContactSensor);
        let mut record =
            AccessoryRecord::from_wire(identity, "Door", Some(&json!(1)), Some(&json!(10))).unwrap();

        record.refresh(None, &StatePatch::default()).unwrap();
        assert_eq!(record.display_name(), "Door");
        assert_eq!(record.state(), &RawDeviceState::Scalar(1));
        assert_eq!(record.battery().value(), 10);

        let patch = StatePatch::from_wire(Some(&json!(0)), None).unwrap();
        record.refresh(Some("Back door".to_string()), &patch).unwrap();
        assert_eq!(record.display_name(), "Back door");
        assert_eq!(record.state(), &RawDeviceState::Scalar(0));
        assert_eq!(record.battery().value(), 10);
    }

    #[test]
    fn patch_state_elements() {
        let patch = StatePatch::from_wire(Some(&json!([3, null])), None).unwrap();
        assert!(patch.has_state_element(0));
        assert!(!patch.has_state_element(1));
        assert!(!patch.is_empty());

        let empty = StatePatch::from_wire(Some(&Value::Null), None).unwrap();
        assert!(empty.is_empty());
    }
}
