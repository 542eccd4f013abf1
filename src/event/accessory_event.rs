// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory event types.

use crate::driver::ServiceDescriptor;
use crate::state::{CharacteristicValue, DeviceIdentity};

/// Events emitted by the bridge for the host framework.
///
/// Lifecycle events tell the host which accessories to create or drop;
/// [`CharacteristicsUpdated`](Self::CharacteristicsUpdated) carries the
/// values to push after a remote update.
///
/// # Examples
///
/// ```
/// use mhub_bridge::event::AccessoryEvent;
/// use mhub_bridge::state::DeviceIdentity;
/// use mhub_bridge::types::CapabilityType;
///
/// let identity = DeviceIdentity::new("abc", CapabilityType::MotionSensor);
/// let removed = AccessoryEvent::unregistered(identity.clone());
///
/// assert!(removed.is_lifecycle());
/// assert_eq!(removed.identity(), Some(&identity));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AccessoryEvent {
    /// A new accessory was created.
    Registered {
        /// Identity of the accessory.
        identity: DeviceIdentity,
        /// Display name.
        display_name: String,
        /// Services the host should set up.
        services: Vec<ServiceDescriptor>,
    },

    /// A known accessory was announced again and refreshed in place.
    Restored {
        /// Identity of the accessory.
        identity: DeviceIdentity,
        /// Display name.
        display_name: String,
    },

    /// An accessory was removed.
    Unregistered {
        /// Identity of the removed accessory.
        identity: DeviceIdentity,
    },

    /// Characteristic values changed and should be pushed to the host.
    CharacteristicsUpdated {
        /// Identity of the accessory.
        identity: DeviceIdentity,
        /// The new values.
        values: Vec<CharacteristicValue>,
    },

    /// The broker connection went up or down.
    ConnectionChanged {
        /// Whether the bridge is now connected.
        connected: bool,
        /// Error message if the connection was lost.
        error: Option<String>,
    },
}

impl AccessoryEvent {
    /// Returns the accessory this event is about, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        match self {
            Self::Registered { identity, .. }
            | Self::Restored { identity, .. }
            | Self::Unregistered { identity }
            | Self::CharacteristicsUpdated { identity, .. } => Some(identity),
            Self::ConnectionChanged { .. } => None,
        }
    }

    /// Returns `true` for registration and removal events.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Registered { .. } | Self::Restored { .. } | Self::Unregistered { .. }
        )
    }

    /// Returns `true` for characteristic pushes.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Self::CharacteristicsUpdated { .. })
    }

    /// Creates an unregistered event.
    #[must_use]
    pub fn unregistered(identity: DeviceIdentity) -> Self {
        Self::Unregistered { identity }
    }

    /// Creates a characteristics update event.
    #[must_use]
    pub fn updated(identity: DeviceIdentity, values: Vec<CharacteristicValue>) -> Self {
        Self::CharacteristicsUpdated { identity, values }
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected() -> Self {
        Self::ConnectionChanged {
            connected: true,
            error: None,
        }
    }

    /// Creates a disconnected event with an error.
    #[must_use]
    pub fn disconnected_with_error(error: impl Into<String>) -> Self {
        Self::ConnectionChanged {
            connected: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityType;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("abc", CapabilityType::OneGang)
    }

    #[test]
    fn identity_extraction() {
        let updated = AccessoryEvent::updated(identity(), Vec::new());
        assert_eq!(updated.identity(), Some(&identity()));
        assert!(updated.is_update());
        assert!(!updated.is_lifecycle());

        assert_eq!(AccessoryEvent::connected().identity(), None);
    }

    #[test]
    fn lifecycle_events() {
        let restored = AccessoryEvent::Restored {
            identity: identity(),
            display_name: "Lamp".to_string(),
        };
        assert!(restored.is_lifecycle());
        assert!(AccessoryEvent::unregistered(identity()).is_lifecycle());
        assert!(!AccessoryEvent::connected().is_lifecycle());
    }

    #[test]
    fn disconnected_with_error() {
        let event = AccessoryEvent::disconnected_with_error("Connection lost");
        if let AccessoryEvent::ConnectionChanged { connected, error } = event {
            assert!(!connected);
            assert_eq!(error, Some("Connection lost".to_string()));
        } else {
            panic!("Expected ConnectionChanged event");
        }
    }
}
