// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan dimmer driver.

use crate::error::{DeviceError, Error};
use crate::state::{
    AccessoryRecord, ChannelState, CharacteristicValue, CharacteristicWrite, StatePatch,
    StateSchema,
};
use crate::types::FanLevel;

use super::{ServiceDescriptor, ServiceKind, StateDelta, unsupported};

/// Driver for `FD` fan dimmers.
///
/// The raw state is `[level, power]`: `level` is the speed (1-6) and `power`
/// is 0 or 1. Either write publishes the whole pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fan;

impl Fan {
    pub(super) fn services(name: &str) -> Vec<ServiceDescriptor> {
        vec![ServiceDescriptor::new(ServiceKind::Fan, name)]
    }

    /// Returns whether the fan is powered. Power is a plain `0`/`1`; any
    /// other value reads as off.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the state is not a channel pair.
    pub fn is_active(&self, record: &AccessoryRecord) -> Result<bool, DeviceError> {
        Ok(fan_state(record)?.bitfield == 1)
    }

    /// Returns the rotation speed in percent, `level * 16.67` unrounded.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the state is not a channel pair.
    pub fn rotation_speed(&self, record: &AccessoryRecord) -> Result<f64, DeviceError> {
        Ok(FanLevel::percentage_of(fan_state(record)?.level))
    }

    pub(super) fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        Ok(vec![
            CharacteristicValue::Active(self.is_active(record)?),
            CharacteristicValue::RotationSpeed(self.rotation_speed(record)?),
        ])
    }

    pub(super) fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = Vec::with_capacity(2);
        if patch.has_state_element(1) {
            values.push(CharacteristicValue::Active(self.is_active(record)?));
        }
        if patch.has_state_element(0) {
            values.push(CharacteristicValue::RotationSpeed(self.rotation_speed(record)?));
        }
        Ok(values)
    }

    pub(super) fn write(
        &self,
        record: &mut AccessoryRecord,
        write: CharacteristicWrite,
    ) -> Result<StateDelta, Error> {
        let identity = record.identity().clone();
        let state = record
            .state_mut()
            .as_channels_mut()
            .ok_or(DeviceError::StateShape {
                expected: StateSchema::Channels.name(),
            })?;

        match write {
            CharacteristicWrite::Active(on) => {
                state.bitfield = u8::from(on);
                tracing::debug!(device = %identity, on, "Set fan active");
            }
            CharacteristicWrite::RotationSpeed(percentage) => {
                let level = FanLevel::from_percentage(percentage)?;
                state.level = level.value();
                tracing::debug!(device = %identity, level = level.value(), "Set fan rotation speed");
            }
            CharacteristicWrite::On { .. } => return Err(unsupported(write)),
        }

        Ok(StateDelta::Channels(state.level, state.bitfield))
    }
}

fn fan_state(record: &AccessoryRecord) -> Result<&ChannelState, DeviceError> {
    record.state().as_channels().ok_or(DeviceError::StateShape {
        expected: StateSchema::Channels.name(),
    })
}
