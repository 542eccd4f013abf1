// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability type tags.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The fixed tag that selects a device's driver family.
///
/// The hub sends the tag as the suffix of every composite device key
/// (`"<uniqueId>-<tag>"`). Several tags share one driver: one-gang, smart
/// plug and power panel are all single switches.
///
/// Tags the bridge does not know parse into [`CapabilityType::Unsupported`]
/// so that such devices still register (with the fallback driver).
///
/// # Examples
///
/// ```
/// use mhub_bridge::types::CapabilityType;
///
/// let kind: CapabilityType = "3G".parse().unwrap();
/// assert_eq!(kind, CapabilityType::ThreeGang);
/// assert_eq!(kind.tag(), "3G");
///
/// let odd: CapabilityType = "XY".parse().unwrap();
/// assert!(!odd.is_supported());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapabilityType {
    /// `1G` one-gang wall switch.
    OneGang,
    /// `2G` two-gang wall switch.
    TwoGang,
    /// `3G` three-gang wall switch.
    ThreeGang,
    /// `4G` four-gang wall switch.
    FourGang,
    /// `FD` fan dimmer.
    FanDimmer,
    /// `MS` motion sensor.
    MotionSensor,
    /// `CS` contact sensor.
    ContactSensor,
    /// `TS` temperature and humidity sensor.
    TemperatureSensor,
    /// `SP` smart plug.
    SmartPlug,
    /// `PP` power panel.
    PowerPanel,
    /// `SR` smart relay.
    SmartRelay,
    /// `4P` four-inch touch panel.
    FourInchPanel,
    /// Any tag the bridge has no driver for.
    Unsupported(String),
}

/// Layout of a switch-family device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchLayout {
    /// Number of independently switchable channels.
    pub channels: u8,
    /// Whether the device exposes a master switch over all channels.
    pub master: bool,
}

impl CapabilityType {
    /// Returns the wire tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::OneGang => "1G",
            Self::TwoGang => "2G",
            Self::ThreeGang => "3G",
            Self::FourGang => "4G",
            Self::FanDimmer => "FD",
            Self::MotionSensor => "MS",
            Self::ContactSensor => "CS",
            Self::TemperatureSensor => "TS",
            Self::SmartPlug => "SP",
            Self::PowerPanel => "PP",
            Self::SmartRelay => "SR",
            Self::FourInchPanel => "4P",
            Self::Unsupported(tag) => tag,
        }
    }

    /// Returns `false` for tags that resolve to the fallback driver.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Returns the switch layout for switch-family devices.
    #[must_use]
    pub fn switch_layout(&self) -> Option<SwitchLayout> {
        let (channels, master) = match self {
            Self::OneGang | Self::SmartPlug | Self::PowerPanel => (1, false),
            Self::TwoGang | Self::SmartRelay => (2, true),
            Self::ThreeGang | Self::FourInchPanel => (3, true),
            Self::FourGang => (4, true),
            Self::FanDimmer
            | Self::MotionSensor
            | Self::ContactSensor
            | Self::TemperatureSensor
            | Self::Unsupported(_) => return None,
        };
        Some(SwitchLayout { channels, master })
    }

    /// Returns `true` for battery-powered sensors.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        matches!(
            self,
            Self::MotionSensor | Self::ContactSensor | Self::TemperatureSensor
        )
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CapabilityType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "1G" => Self::OneGang,
            "2G" => Self::TwoGang,
            "3G" => Self::ThreeGang,
            "4G" => Self::FourGang,
            "FD" => Self::FanDimmer,
            "MS" => Self::MotionSensor,
            "CS" => Self::ContactSensor,
            "TS" => Self::TemperatureSensor,
            "SP" => Self::SmartPlug,
            "PP" => Self::PowerPanel,
            "SR" => Self::SmartRelay,
            "4P" => Self::FourInchPanel,
            other => Self::Unsupported(other.to_string()),
        })
    }
}

impl From<String> for CapabilityType {
    fn from(tag: String) -> Self {
        match tag.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<CapabilityType> for String {
    fn from(kind: CapabilityType) -> Self {
        kind.tag().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: [&str; 12] = [
        "1G", "2G", "3G", "4G", "FD", "MS", "CS", "TS", "SP", "PP", "SR", "4P",
    ];

    #[test]
    fn known_tags_round_trip() {
        for tag in KNOWN {
            let kind: CapabilityType = tag.parse().unwrap();
            assert!(kind.is_supported(), "{tag} should be supported");
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let kind: CapabilityType = "ZZ".parse().unwrap();
        assert_eq!(kind, CapabilityType::Unsupported("ZZ".to_string()));
        assert_eq!(kind.to_string(), "ZZ");
    }

    #[test]
    fn tags_are_case_sensitive() {
        let kind: CapabilityType = "fd".parse().unwrap();
        assert!(!kind.is_supported());
    }

    #[test]
    fn switch_layouts() {
        let single = CapabilityType::SmartPlug.switch_layout().unwrap();
        assert_eq!(single.channels, 1);
        assert!(!single.master);

        let relay = CapabilityType::SmartRelay.switch_layout().unwrap();
        assert_eq!(relay.channels, 2);
        assert!(relay.master);

        let panel = CapabilityType::FourInchPanel.switch_layout().unwrap();
        assert_eq!(panel.channels, 3);

        let four = CapabilityType::FourGang.switch_layout().unwrap();
        assert_eq!(four.channels, 4);

        assert!(CapabilityType::FanDimmer.switch_layout().is_none());
    }

    #[test]
    fn battery_only_on_sensors() {
        assert!(CapabilityType::ContactSensor.has_battery());
        assert!(CapabilityType::TemperatureSensor.has_battery());
        assert!(!CapabilityType::OneGang.has_battery());
    }

    #[test]
    fn serde_uses_tag() {
        let json = serde_json::to_string(&CapabilityType::FanDimmer).unwrap();
        assert_eq!(json, "\"FD\"");
        let back: CapabilityType = serde_json::from_str("\"MS\"").unwrap();
        assert_eq!(back, CapabilityType::MotionSensor);
    }
}
