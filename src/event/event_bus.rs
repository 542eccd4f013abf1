// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel for accessory events.

use tokio::sync::broadcast;

use super::AccessoryEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fans accessory events out to every subscriber.
///
/// Capacity is fixed (default 256). A subscriber that falls behind loses the
/// oldest events and sees `RecvError::Lagged`; the bridge never blocks on a
/// slow host.
///
/// # Examples
///
/// ```
/// use mhub_bridge::event::{AccessoryEvent, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(AccessoryEvent::connected());
/// assert!(matches!(
///     rx.try_recv(),
///     Ok(AccessoryEvent::ConnectionChanged { connected: true, .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AccessoryEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates an event bus buffering up to `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AccessoryEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Without subscribers it is dropped.
    pub fn publish(&self, event: AccessoryEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    /// Publishes several events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = AccessoryEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Publishes an event and returns how many receivers got it.
    #[must_use]
    pub fn publish_counted(&self, event: AccessoryEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeviceIdentity;
    use crate::types::CapabilityType;

    fn removed() -> AccessoryEvent {
        AccessoryEvent::unregistered(DeviceIdentity::new("abc", CapabilityType::OneGang))
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn drop_subscriber_decrements_count() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(removed());

        assert_eq!(rx1.recv().await.unwrap(), removed());
        assert_eq!(rx2.recv().await.unwrap(), removed());
    }

    #[tokio::test]
    async fn publish_all_keeps_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish_all([AccessoryEvent::connected(), removed()]);

        assert!(matches!(
            rx.recv().await.unwrap(),
            AccessoryEvent::ConnectionChanged { .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), removed());
    }

    #[test]
    fn publish_counted_returns_receiver_count() {
        let bus = EventBus::new();
        assert_eq!(bus.publish_counted(removed()), 0);

        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.publish_counted(removed()), 2);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::with_capacity(0);
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
