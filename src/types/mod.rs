// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for hub devices.
//!
//! Each type keeps its value within the range the hub and the host agree on,
//! so drivers never have to re-validate.
//!
//! # Types
//!
//! - [`CapabilityType`] - Device type tag (`1G`, `FD`, `CS`, ...)
//! - [`SwitchChannel`] - Channel index of a multi-gang switch, or the master
//! - [`FanLevel`] - Fan speed level (0-6) and its percentage mapping
//! - [`BatteryLevel`] - Sensor battery charge (0-100%)

mod battery;
mod capability_type;
mod fan_speed;
mod switch_channel;

pub use battery::BatteryLevel;
pub use capability_type::{CapabilityType, SwitchLayout};
pub use fan_speed::FanLevel;
pub use switch_channel::SwitchChannel;
