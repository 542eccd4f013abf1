// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge between one hub and the host.
//!
//! A [`Bridge`] owns the accessory registry, feeds it every inbound message,
//! publishes the resulting [`AccessoryEvent`]s and sends user-initiated
//! writes back to the hub through its [`Transport`].
//!
//! The registry sits behind a lock that is held only while an envelope or a
//! write is applied. Events are broadcast before the lock is released, so
//! subscribers see them in the order the registry changed. Messages are
//! published to the hub after the lock is released.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::config::BridgeConfig;
use crate::driver::{Driver, ServiceDescriptor};
use crate::error::{DeviceError, Error, ParseError, Result};
use crate::event::{AccessoryEvent, EventBus};
use crate::protocol::{
    EnvelopeReport, HubTopics, OutboundMessage, ReconciliationEngine, RequestStamp, Transport,
};
use crate::registry::AccessoryRegistry;
use crate::state::{AccessoryRecord, CharacteristicValue, CharacteristicWrite};
use crate::types::SwitchChannel;

#[cfg(feature = "mqtt")]
use crate::protocol::{MqttTransport, TransportEvent};

/// Reconciles one hub's device state into a typed accessory registry.
///
/// Cheaply cloneable; clones share the registry, the event bus and the
/// transport.
///
/// # Examples
///
/// ```
/// use mhub_bridge::{Bridge, AccessoryEvent};
/// use mhub_bridge::protocol::{HubTopics, MemoryTransport};
/// use mhub_bridge::types::SwitchChannel;
///
/// let transport = MemoryTransport::new();
/// let bridge = Bridge::new(HubTopics::new("hub-1"), transport.clone());
/// let mut events = bridge.subscribe();
///
/// bridge
///     .handle_message(
///         "mha/v1/hub-1/accepted",
///         br#"{"metadata":{"cmd":"addDevices"},"devices":{"abc-2G":{"n":"Hall","s":[0,1]}}}"#,
///     )
///     .unwrap();
/// assert!(matches!(events.try_recv(), Ok(AccessoryEvent::Registered { .. })));
/// assert!(bridge.switch_state("abc", SwitchChannel::Index(0)).unwrap());
///
/// bridge.set_switch("abc", SwitchChannel::Index(1), true).unwrap();
/// let sent = transport.take();
/// assert_eq!(sent[0].topic, "mha/v1/hub-1/devices/state/set");
/// ```
pub struct Bridge<T: Transport> {
    inner: Arc<BridgeInner<T>>,
}

struct BridgeInner<T> {
    registry: RwLock<AccessoryRegistry>,
    engine: ReconciliationEngine,
    events: EventBus,
    transport: T,
}

impl<T: Transport> Clone for Bridge<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("hub_id", &self.topics().hub_id())
            .field("accessories", &self.len())
            .field("subscribers", &self.inner.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Bridge<T> {
    /// Creates a bridge with an empty registry.
    #[must_use]
    pub fn new(topics: HubTopics, transport: T) -> Self {
        Self::with_event_bus(topics, transport, EventBus::new())
    }

    /// Creates a bridge whose event bus buffers `capacity` events per
    /// subscriber.
    #[must_use]
    pub fn with_event_capacity(topics: HubTopics, transport: T, capacity: usize) -> Self {
        Self::with_event_bus(topics, transport, EventBus::with_capacity(capacity))
    }

    /// Creates a bridge for the hub named in `config`, using an already
    /// connected transport.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidConfiguration` if `config` is invalid.
    pub fn from_config(config: &BridgeConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_event_capacity(
            HubTopics::new(config.hub_id.clone()),
            transport,
            config.event_capacity,
        ))
    }

    fn with_event_bus(topics: HubTopics, transport: T, events: EventBus) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                registry: RwLock::new(AccessoryRegistry::new()),
                engine: ReconciliationEngine::new(topics),
                events,
                transport,
            }),
        }
    }

    /// Subscribes to accessory events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AccessoryEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.inner.events
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Returns the hub topics.
    #[must_use]
    pub fn topics(&self) -> &HubTopics {
        self.inner.engine.topics()
    }

    /// Processes one inbound message and broadcasts the resulting events.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if an envelope on the accepted topic is
    /// malformed. The registry is then unchanged and nothing is broadcast.
    pub fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> std::result::Result<EnvelopeReport, ParseError> {
        let mut registry = self.inner.registry.write();
        let outcome = self.inner.engine.process(&mut registry, topic, payload);

        match outcome {
            Ok(reconciliation) => {
                // Broadcasting never blocks
                self.inner.events.publish_all(reconciliation.events);
                drop(registry);
                Ok(reconciliation.report)
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Dropping malformed envelope");
                Err(e)
            }
        }
    }

    /// Asks the hub for its full device list.
    ///
    /// Returns `false` if the request could not be published.
    pub fn request_all_devices(&self) -> bool {
        let message = self.inner.engine.request_all_devices(RequestStamp::now());
        tracing::info!(hub = %self.topics().hub_id(), "Requesting device list");
        self.send(&message)
    }

    /// Applies a user-initiated change and publishes it to the hub.
    ///
    /// The local record changes right away. A failed publish is logged and
    /// not retried; the next hub update corrects the local state.
    ///
    /// # Errors
    ///
    /// - `Error::DeviceNotFound` if no accessory has `unique_id`
    /// - `DeviceError::ReadOnly` or `DeviceError::UnsupportedCapability` if
    ///   the accessory cannot take this write
    /// - `ValueError` if the value is out of range
    pub fn write(&self, unique_id: &str, write: CharacteristicWrite) -> Result<()> {
        let message = {
            let mut registry = self.inner.registry.write();
            self.inner
                .engine
                .apply_write(&mut registry, unique_id, write, RequestStamp::now())?
        };
        tracing::debug!(device = %unique_id, characteristic = write.name(), "Write applied");
        self.send(&message);
        Ok(())
    }

    /// Turns one switch channel, or the master switch, on or off.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn set_switch(&self, unique_id: &str, channel: SwitchChannel, on: bool) -> Result<()> {
        self.write(unique_id, CharacteristicWrite::switch(channel, on))
    }

    /// Turns a fan on or off, keeping its speed level.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn set_fan_active(&self, unique_id: &str, active: bool) -> Result<()> {
        self.write(unique_id, CharacteristicWrite::Active(active))
    }

    /// Sets a fan's rotation speed as a percentage.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn set_fan_speed(&self, unique_id: &str, percentage: f64) -> Result<()> {
        self.write(unique_id, CharacteristicWrite::RotationSpeed(percentage))
    }

    /// Reads every visible value of an accessory.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown id, or
    /// `DeviceError::StateShape` if the stored state does not fit the driver.
    pub fn characteristics(&self, unique_id: &str) -> Result<Vec<CharacteristicValue>> {
        let registry = self.inner.registry.read();
        let accessory = registry
            .lookup(unique_id)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))?;
        Ok(accessory.driver().characteristics(accessory.record())?)
    }

    /// Reads one switch channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown id, or
    /// `DeviceError::UnsupportedCapability` if the accessory is not a switch
    /// or has no such channel.
    pub fn switch_state(&self, unique_id: &str, channel: SwitchChannel) -> Result<bool> {
        let registry = self.inner.registry.read();
        let accessory = registry
            .lookup(unique_id)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))?;
        match accessory.driver() {
            Driver::SwitchGroup(group) => Ok(group.is_on(accessory.record(), channel)?),
            other => Err(DeviceError::UnsupportedCapability {
                capability: format!("switch on a {}", other.name()),
            }
            .into()),
        }
    }

    /// Returns the host services an accessory needs.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown id.
    pub fn services(&self, unique_id: &str) -> Result<Vec<ServiceDescriptor>> {
        let registry = self.inner.registry.read();
        let accessory = registry
            .lookup(unique_id)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))?;
        Ok(accessory.driver().initialize(accessory.record()))
    }

    /// Returns a copy of an accessory's record.
    #[must_use]
    pub fn record(&self, unique_id: &str) -> Option<AccessoryRecord> {
        self.inner
            .registry
            .read()
            .lookup(unique_id)
            .map(|accessory| accessory.record().clone())
    }

    /// Returns copies of every record, for the host to persist.
    #[must_use]
    pub fn records(&self) -> Vec<AccessoryRecord> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|accessory| accessory.record().clone())
            .collect()
    }

    /// Returns every registered unique id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.inner.registry.read().ids()
    }

    /// Returns the number of registered accessories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Returns `true` if no accessory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }

    /// Seeds the registry with records the host cached from an earlier run.
    ///
    /// No events are broadcast; the host already knows these accessories.
    /// Returns how many records were restored.
    pub fn restore(&self, records: impl IntoIterator<Item = AccessoryRecord>) -> usize {
        let count = self.inner.registry.write().restore(records);
        tracing::info!(count, "Restored cached accessories");
        count
    }

    fn send(&self, message: &OutboundMessage) -> bool {
        match self.inner.transport.publish(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(topic = %message.topic, error = %e, "Failed to publish");
                false
            }
        }
    }
}

#[cfg(feature = "mqtt")]
impl Bridge<MqttTransport> {
    /// Connects to the broker and starts processing hub messages.
    ///
    /// Once the broker acknowledges the connection the bridge asks the hub
    /// for its device list. Inbound messages are handled on a spawned task
    /// until the connection drops.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidConfiguration` for an invalid config, or
    /// a `ProtocolError` if the connection cannot be established.
    pub async fn connect(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let (transport, mut transport_events) = MqttTransport::connect(config).await?;
        let bridge = Self::from_config(config, transport)?;

        let pump = bridge.clone();
        tokio::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                pump.handle_transport_event(event);
            }
            tracing::debug!(hub = %pump.topics().hub_id(), "Transport event stream ended");
        });

        Ok(bridge)
    }

    /// Handles one event reported by the MQTT event loop.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.inner.events.publish(AccessoryEvent::connected());
                self.request_all_devices();
            }
            TransportEvent::Message(message) => {
                // Malformed envelopes are logged by handle_message.
                let _ = self.handle_message(&message.topic, &message.payload);
            }
            TransportEvent::Disconnected(error) => {
                tracing::warn!(hub = %self.topics().hub_id(), error = %error, "Connection lost");
                self.inner
                    .events
                    .publish(AccessoryEvent::disconnected_with_error(error));
            }
        }
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.transport.disconnect().await?;
        Ok(())
    }
}
