// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability drivers.
//!
//! A driver translates between an accessory's raw state and the values the
//! host sees. Drivers are small descriptors (channel count, master flag) and
//! hold no state of their own: every call is handed the [`AccessoryRecord`]
//! owned by the registry.
//!
//! The driver family is closed, so dispatch is a plain enum match chosen
//! once per record by [`create_driver`].
//!
//! # Examples
//!
//! ```
//! use mhub_bridge::driver::{StateDelta, create_driver};
//! use mhub_bridge::state::{AccessoryRecord, CharacteristicWrite, DeviceIdentity};
//! use mhub_bridge::types::{CapabilityType, SwitchChannel};
//! use serde_json::json;
//!
//! let identity = DeviceIdentity::new("abc", CapabilityType::ThreeGang);
//! let mut record = AccessoryRecord::from_wire(identity, "Hall", Some(&json!([0, 5])), None).unwrap();
//! let driver = create_driver(record.capability_type());
//!
//! let delta = driver
//!     .write(&mut record, CharacteristicWrite::switch(SwitchChannel::Index(1), true))
//!     .unwrap();
//! assert_eq!(delta, StateDelta::Switch(1, 7));
//! ```

mod fallback;
mod fan;
mod sensor;
mod switch;

pub use fallback::Fallback;
pub use fan::Fan;
pub use sensor::{BatteryMonitor, ContactSensor, MotionSensor, TemperatureHumidity};
pub use switch::SwitchGroup;

use serde_json::Value;

use crate::error::{DeviceError, Error};
use crate::state::{AccessoryRecord, CharacteristicValue, CharacteristicWrite, StatePatch};
use crate::types::CapabilityType;

/// Host service kinds a driver may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ServiceKind {
    /// On/off switch.
    Switch,
    /// Fan with power and rotation speed.
    Fan,
    /// Contact sensor.
    ContactSensor,
    /// Motion sensor.
    MotionSensor,
    /// Temperature sensor.
    TemperatureSensor,
    /// Humidity sensor.
    HumiditySensor,
    /// Battery.
    Battery,
}

/// A host service requested by a driver on initialization.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceDescriptor {
    /// Kind of service.
    pub kind: ServiceKind,
    /// Display name of the service.
    pub name: String,
    /// Subtype distinguishing several services of the same kind.
    pub subtype: Option<String>,
}

impl ServiceDescriptor {
    fn new(kind: ServiceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            subtype: None,
        }
    }

    fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}

/// Accessory information block.
///
/// The hub does not report vendor data, so every accessory carries the same
/// placeholder values.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessoryInformation {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
}

impl Default for AccessoryInformation {
    fn default() -> Self {
        Self {
            manufacturer: "Default-Manufacturer".to_string(),
            model: "Default-Model".to_string(),
            serial_number: "Default-Serial".to_string(),
        }
    }
}

/// The `s` value of an outbound state update.
///
/// Both forms serialize as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum StateDelta {
    /// `[selector, bitfield]`: channel index (or 255 for master) and the
    /// new channel bits.
    Switch(u8, u8),
    /// `[level, power]`: the whole fan state.
    Channels(u8, u8),
}

impl StateDelta {
    /// Returns the wire form.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match *self {
            Self::Switch(a, b) | Self::Channels(a, b) => Value::from(vec![a, b]),
        }
    }
}

/// A capability driver, chosen by capability type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    /// One or more switch channels, optionally with a master switch.
    SwitchGroup(SwitchGroup),
    /// Fan with power and speed level.
    Fan(Fan),
    /// Contact sensor with battery.
    ContactSensor(ContactSensor),
    /// Motion sensor with battery.
    MotionSensor(MotionSensor),
    /// Temperature and humidity sensor with battery.
    TemperatureHumidity(TemperatureHumidity),
    /// Devices without a driver.
    Fallback(Fallback),
}

/// Returns the driver for a capability type.
///
/// Unknown tags get the [`Fallback`] driver and a warning.
#[must_use]
pub fn create_driver(kind: &CapabilityType) -> Driver {
    match kind {
        CapabilityType::FanDimmer => Driver::Fan(Fan),
        CapabilityType::ContactSensor => Driver::ContactSensor(ContactSensor),
        CapabilityType::MotionSensor => Driver::MotionSensor(MotionSensor),
        CapabilityType::TemperatureSensor => Driver::TemperatureHumidity(TemperatureHumidity),
        other => match other.switch_layout() {
            Some(layout) => Driver::SwitchGroup(SwitchGroup::new(layout)),
            None => {
                tracing::warn!(capability = %kind, "Unsupported device type, using fallback driver");
                Driver::Fallback(Fallback)
            }
        },
    }
}

impl Driver {
    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SwitchGroup(_) => "switch group",
            Self::Fan(_) => "fan",
            Self::ContactSensor(_) => "contact sensor",
            Self::MotionSensor(_) => "motion sensor",
            Self::TemperatureHumidity(_) => "temperature sensor",
            Self::Fallback(_) => "fallback",
        }
    }

    /// Returns the accessory information block.
    #[must_use]
    pub fn information(&self) -> AccessoryInformation {
        AccessoryInformation::default()
    }

    /// Returns the host services this driver needs for `record`.
    ///
    /// Called once when the accessory is set up. The fallback driver logs a
    /// warning and asks for nothing.
    #[must_use]
    pub fn initialize(&self, record: &AccessoryRecord) -> Vec<ServiceDescriptor> {
        let name = record.display_name();
        match self {
            Self::SwitchGroup(group) => group.services(name),
            Self::Fan(_) => Fan::services(name),
            Self::ContactSensor(_) => ContactSensor::services(name),
            Self::MotionSensor(_) => MotionSensor::services(name),
            Self::TemperatureHumidity(_) => TemperatureHumidity::services(name),
            Self::Fallback(_) => {
                Fallback::initialize(record);
                Vec::new()
            }
        }
    }

    /// Returns every visible value of `record`, as the host's get hooks
    /// would read them.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the raw state does not have the
    /// shape this driver expects.
    pub fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        match self {
            Self::SwitchGroup(group) => group.characteristics(record),
            Self::Fan(fan) => fan.characteristics(record),
            Self::ContactSensor(sensor) => sensor.characteristics(record),
            Self::MotionSensor(sensor) => sensor.characteristics(record),
            Self::TemperatureHumidity(sensor) => sensor.characteristics(record),
            Self::Fallback(_) => Ok(Vec::new()),
        }
    }

    /// Returns the values to push to the host after `patch` was merged into
    /// `record`.
    ///
    /// Only characteristics backed by a field present in `patch` are
    /// returned. Calling this twice with the same input yields the same
    /// values.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the raw state does not have the
    /// shape this driver expects.
    pub fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        match self {
            Self::SwitchGroup(group) => group.apply_remote_update(record, patch),
            Self::Fan(fan) => fan.apply_remote_update(record, patch),
            Self::ContactSensor(sensor) => sensor.apply_remote_update(record, patch),
            Self::MotionSensor(sensor) => sensor.apply_remote_update(record, patch),
            Self::TemperatureHumidity(sensor) => sensor.apply_remote_update(record, patch),
            Self::Fallback(_) => {
                Fallback::apply_remote_update(record);
                Ok(Vec::new())
            }
        }
    }

    /// Applies a user-initiated change to `record` and returns the state
    /// delta to publish.
    ///
    /// # Errors
    ///
    /// - `DeviceError::ReadOnly` for sensors
    /// - `DeviceError::UnsupportedCapability` if the write does not apply to
    ///   this driver (or the fallback driver)
    /// - `ValueError` if the requested value is out of range
    pub fn write(
        &self,
        record: &mut AccessoryRecord,
        write: CharacteristicWrite,
    ) -> Result<StateDelta, Error> {
        match self {
            Self::SwitchGroup(group) => group.write(record, write),
            Self::Fan(fan) => fan.write(record, write),
            Self::ContactSensor(_) | Self::MotionSensor(_) | Self::TemperatureHumidity(_) => {
                Err(DeviceError::ReadOnly {
                    capability: self.name().to_string(),
                }
                .into())
            }
            Self::Fallback(_) => Err(DeviceError::UnsupportedCapability {
                capability: write.name().to_string(),
            }
            .into()),
        }
    }
}

/// Rejects a write that does not belong to the driver.
fn unsupported(write: CharacteristicWrite) -> Error {
    DeviceError::UnsupportedCapability {
        capability: write.name().to_string(),
    }
    .into()
}
