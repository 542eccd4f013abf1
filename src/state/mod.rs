// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state model.
//!
//! - [`RawDeviceState`] - compact device-native state, per-type defaults and
//!   partial merges
//! - [`AccessoryRecord`] - one registered accessory (identity, name, state,
//!   battery)
//! - [`CharacteristicValue`] / [`CharacteristicWrite`] - host-visible values
//!   and user-initiated changes

mod accessory;
mod characteristic;
mod device_state;

pub use accessory::{AccessoryRecord, DeviceIdentity, StatePatch};
pub use characteristic::{CharacteristicValue, CharacteristicWrite};
pub use device_state::{ChannelState, ClimateReading, RawDeviceState, StateSchema, default_state};
