// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-visible characteristic values.
//!
//! Drivers derive these from raw state. They are what the host framework
//! reads through its get hooks and what the bridge pushes when a remote
//! update arrives. Mapping them onto a concrete characteristic vocabulary
//! (enum constants, units) is left to the host.
//!
//! # Examples
//!
//! ```
//! use mhub_bridge::state::{CharacteristicValue, CharacteristicWrite};
//! use mhub_bridge::types::SwitchChannel;
//!
//! let on = CharacteristicValue::On { channel: SwitchChannel::Index(0), on: true };
//! assert_eq!(on.as_bool(), Some(true));
//!
//! let write = CharacteristicWrite::switch(SwitchChannel::Master, false);
//! assert!(matches!(write, CharacteristicWrite::On { on: false, .. }));
//! ```

use crate::types::{BatteryLevel, SwitchChannel};

/// A visible value of one characteristic.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CharacteristicValue {
    /// On/off state of a switch channel.
    On {
        /// The channel (or master) this value belongs to.
        channel: SwitchChannel,
        /// Whether the channel is on.
        on: bool,
    },

    /// Fan power.
    Active(bool),

    /// Fan rotation speed in percent, unrounded.
    RotationSpeed(f64),

    /// Contact sensor state.
    ContactDetected(bool),

    /// Motion sensor state.
    MotionDetected(bool),

    /// Temperature as reported.
    CurrentTemperature(f64),

    /// Relative humidity in percent.
    CurrentRelativeHumidity(f64),

    /// Battery charge.
    BatteryLevel(BatteryLevel),

    /// Whether the battery is below the low threshold.
    StatusLowBattery(bool),
}

impl CharacteristicValue {
    /// Returns the boolean carried by this value, if it is a flag.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::On { on, .. } => Some(on),
            Self::Active(v)
            | Self::ContactDetected(v)
            | Self::MotionDetected(v)
            | Self::StatusLowBattery(v) => Some(v),
            Self::RotationSpeed(_)
            | Self::CurrentTemperature(_)
            | Self::CurrentRelativeHumidity(_)
            | Self::BatteryLevel(_) => None,
        }
    }

    /// Returns the number carried by this value, if it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::RotationSpeed(v) | Self::CurrentTemperature(v) | Self::CurrentRelativeHumidity(v) => {
                Some(v)
            }
            Self::BatteryLevel(level) => Some(f64::from(level.value())),
            Self::On { .. }
            | Self::Active(_)
            | Self::ContactDetected(_)
            | Self::MotionDetected(_)
            | Self::StatusLowBattery(_) => None,
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::On { .. } => "On",
            Self::Active(_) => "Active",
            Self::RotationSpeed(_) => "RotationSpeed",
            Self::ContactDetected(_) => "ContactSensorState",
            Self::MotionDetected(_) => "MotionDetected",
            Self::CurrentTemperature(_) => "CurrentTemperature",
            Self::CurrentRelativeHumidity(_) => "CurrentRelativeHumidity",
            Self::BatteryLevel(_) => "BatteryLevel",
            Self::StatusLowBattery(_) => "StatusLowBattery",
        }
    }
}

/// A user-initiated change coming from the host.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CharacteristicWrite {
    /// Turn a switch channel (or all, via master) on or off.
    On {
        /// Target channel.
        channel: SwitchChannel,
        /// Requested state.
        on: bool,
    },

    /// Turn a fan on or off.
    Active(bool),

    /// Set fan rotation speed, in percent (0-100).
    RotationSpeed(f64),
}

impl CharacteristicWrite {
    /// Creates a switch write.
    #[must_use]
    pub const fn switch(channel: SwitchChannel, on: bool) -> Self {
        Self::On { channel, on }
    }

    /// Returns a short name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::On { .. } => "On",
            Self::Active(_) => "Active",
            Self::RotationSpeed(_) => "RotationSpeed",
        }
    }
}
