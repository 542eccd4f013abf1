// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-channel switch driver.

use crate::codec;
use crate::error::{DeviceError, Error};
use crate::state::{
    AccessoryRecord, ChannelState, CharacteristicValue, CharacteristicWrite, StatePatch,
    StateSchema,
};
use crate::types::{SwitchChannel, SwitchLayout};

use super::{ServiceDescriptor, ServiceKind, StateDelta, unsupported};

/// Driver for the switch family (`1G`, `2G`, `3G`, `4G`, `SP`, `PP`, `SR`,
/// `4P`).
///
/// Channel `i` is bit `i` of the bitfield. Devices with more than one channel
/// also get a master switch that reads as on only when every channel is on
/// and that writes the same value to all channels. The master value is
/// derived on every read and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchGroup {
    layout: SwitchLayout,
}

impl SwitchGroup {
    /// Creates a driver for the given layout.
    #[must_use]
    pub const fn new(layout: SwitchLayout) -> Self {
        Self { layout }
    }

    /// Returns the number of physical channels.
    #[must_use]
    pub const fn channel_count(&self) -> u8 {
        self.layout.channels
    }

    /// Returns `true` if the device has a master switch.
    #[must_use]
    pub const fn has_master(&self) -> bool {
        self.layout.master
    }

    /// Returns every addressable channel, master last.
    #[must_use]
    pub fn channels(&self) -> Vec<SwitchChannel> {
        let mut channels: Vec<_> = (0..self.layout.channels).map(SwitchChannel::Index).collect();
        if self.layout.master {
            channels.push(SwitchChannel::Master);
        }
        channels
    }

    pub(super) fn services(&self, name: &str) -> Vec<ServiceDescriptor> {
        if self.layout.channels == 1 && !self.layout.master {
            return vec![ServiceDescriptor::new(ServiceKind::Switch, name).with_subtype("switch")];
        }
        self.channels()
            .into_iter()
            .map(|channel| match channel {
                SwitchChannel::Index(i) => {
                    ServiceDescriptor::new(ServiceKind::Switch, format!("{name} Switch {}", i + 1))
                        .with_subtype(format!("switch{}", i + 1))
                }
                SwitchChannel::Master => {
                    ServiceDescriptor::new(ServiceKind::Switch, format!("{name} Master Switch"))
                        .with_subtype("masterSwitch")
                }
            })
            .collect()
    }

    /// Reads one channel.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::UnsupportedCapability` if the device has no such
    /// channel, or `DeviceError::StateShape` if the state is not a channel
    /// pair.
    pub fn is_on(&self, record: &AccessoryRecord, channel: SwitchChannel) -> Result<bool, DeviceError> {
        self.check_channel(channel)?;
        let bits = channel_state(record)?.bitfield;
        let on = self.read(bits, channel);
        tracing::debug!(device = %record.identity(), %channel, on, "Get switch");
        Ok(on)
    }

    pub(super) fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let bits = channel_state(record)?.bitfield;
        Ok(self.snapshot(bits))
    }

    pub(super) fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        if !patch.has_state_element(1) {
            return Ok(Vec::new());
        }
        let bits = channel_state(record)?.bitfield;
        tracing::debug!(
            device = %record.identity(),
            bits = %codec::to_binary_text(bits),
            "Switch state updated"
        );
        Ok(self.snapshot(bits))
    }

    pub(super) fn write(
        &self,
        record: &mut AccessoryRecord,
        write: CharacteristicWrite,
    ) -> Result<StateDelta, Error> {
        let CharacteristicWrite::On { channel, on } = write else {
            return Err(unsupported(write));
        };
        self.check_channel(channel)?;

        let identity = record.identity().clone();
        let state = record
            .state_mut()
            .as_channels_mut()
            .ok_or(DeviceError::StateShape {
                expected: StateSchema::Channels.name(),
            })?;

        state.bitfield = match channel {
            SwitchChannel::Index(i) => codec::with_bit(state.bitfield, usize::from(i), on),
            SwitchChannel::Master => {
                codec::with_bits(state.bitfield, usize::from(self.layout.channels), on)
            }
        };
        tracing::debug!(device = %identity, %channel, on, "Set switch");

        Ok(StateDelta::Switch(channel.selector(), state.bitfield))
    }

    fn check_channel(&self, channel: SwitchChannel) -> Result<(), DeviceError> {
        let valid = match channel {
            SwitchChannel::Index(i) => i < self.layout.channels,
            SwitchChannel::Master => self.layout.master,
        };
        if valid {
            Ok(())
        } else {
            Err(DeviceError::UnsupportedCapability {
                capability: channel.to_string(),
            })
        }
    }

    fn read(&self, bits: u8, channel: SwitchChannel) -> bool {
        match channel {
            SwitchChannel::Index(i) => codec::decode_bits(bits)[usize::from(i)],
            SwitchChannel::Master => codec::all_set(bits, usize::from(self.layout.channels)),
        }
    }

    fn snapshot(&self, bits: u8) -> Vec<CharacteristicValue> {
        self.channels()
            .into_iter()
            .map(|channel| CharacteristicValue::On {
                channel,
                on: self.read(bits, channel),
            })
            .collect()
    }
}

fn channel_state(record: &AccessoryRecord) -> Result<&ChannelState, DeviceError> {
    record.state().as_channels().ok_or(DeviceError::StateShape {
        expected: StateSchema::Channels.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeviceIdentity;
    use crate::types::CapabilityType;
    use serde_json::json;

    fn three_gang(bits: u8) -> (SwitchGroup, AccessoryRecord) {
        let kind = CapabilityType::ThreeGang;
        let group = SwitchGroup::new(kind.switch_layout().unwrap());
        let record = AccessoryRecord::from_wire(
            DeviceIdentity::new("sw1", kind),
            "Hall",
            Some(&json!([0, bits])),
            None,
        )
        .unwrap();
        (group, record)
    }

    #[test]
    fn reads_channels_and_master() {
        let (group, record) = three_gang(5);
        assert!(group.is_on(&record, SwitchChannel::Index(0)).unwrap());
        assert!(!group.is_on(&record, SwitchChannel::Index(1)).unwrap());
        assert!(group.is_on(&record, SwitchChannel::Index(2)).unwrap());
        assert!(!group.is_on(&record, SwitchChannel::Master).unwrap());

        let (group, record) = three_gang(7);
        assert!(group.is_on(&record, SwitchChannel::Master).unwrap());
    }

    #[test]
    fn master_ignores_bits_beyond_channel_count() {
        let (group, record) = three_gang(0b1111_0111);
        assert!(group.is_on(&record, SwitchChannel::Master).unwrap());
    }

    #[test]
    fn set_channel_publishes_selector_and_word() {
        let (group, mut record) = three_gang(5);
        let delta = group
            .write(&mut record, CharacteristicWrite::switch(SwitchChannel::Index(1), true))
            .unwrap();
        assert_eq!(delta, StateDelta::Switch(1, 7));
        assert_eq!(record.state().as_channels().unwrap().bitfield, 7);
        assert!(group.is_on(&record, SwitchChannel::Master).unwrap());
    }

    #[test]
    fn set_master_writes_all_channels() {
        let (group, mut record) = three_gang(5);
        let delta = group
            .write(&mut record, CharacteristicWrite::switch(SwitchChannel::Master, false))
            .unwrap();
        assert_eq!(delta, StateDelta::Switch(255, 0));

        let delta = group
            .write(&mut record, CharacteristicWrite::switch(SwitchChannel::Master, true))
            .unwrap();
        assert_eq!(delta, StateDelta::Switch(255, 7));
    }

    #[test]
    fn rejects_missing_channels() {
        let (group, mut record) = three_gang(0);
        assert!(group.is_on(&record, SwitchChannel::Index(3)).is_err());
        assert!(
            group
                .write(&mut record, CharacteristicWrite::RotationSpeed(50.0))
                .is_err()
        );

        let single = SwitchGroup::new(CapabilityType::OneGang.switch_layout().unwrap());
        assert!(single.check_channel(SwitchChannel::Master).is_err());
    }

    #[test]
    fn remote_update_pushes_every_channel() {
        let (group, mut record) = three_gang(0);
        let patch = StatePatch::from_wire(Some(&json!([0, 5])), None).unwrap();
        record.apply_patch(&patch).unwrap();

        let values = group.apply_remote_update(&record, &patch).unwrap();
        assert_eq!(
            values,
            vec![
                CharacteristicValue::On { channel: SwitchChannel::Index(0), on: true },
                CharacteristicValue::On { channel: SwitchChannel::Index(1), on: false },
                CharacteristicValue::On { channel: SwitchChannel::Index(2), on: true },
                CharacteristicValue::On { channel: SwitchChannel::Master, on: false },
            ]
        );
        assert_eq!(group.apply_remote_update(&record, &patch).unwrap(), values);
    }

    #[test]
    fn remote_update_without_bitfield_pushes_nothing() {
        let (group, record) = three_gang(5);
        let patch = StatePatch::from_wire(Some(&json!([2])), None).unwrap();
        assert!(group.apply_remote_update(&record, &patch).unwrap().is_empty());
    }

    #[test]
    fn service_names() {
        let (group, _) = three_gang(0);
        let names: Vec<_> = group
            .services("Hall")
            .into_iter()
            .map(|s| (s.name, s.subtype.unwrap()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Hall Switch 1".to_string(), "switch1".to_string()),
                ("Hall Switch 2".to_string(), "switch2".to_string()),
                ("Hall Switch 3".to_string(), "switch3".to_string()),
                ("Hall Master Switch".to_string(), "masterSwitch".to_string()),
            ]
        );

        let single = SwitchGroup::new(CapabilityType::SmartPlug.switch_layout().unwrap());
        let services = single.services("Lamp");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Lamp");
    }
}
