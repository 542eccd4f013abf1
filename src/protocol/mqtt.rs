// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport for one hub.
//!
//! Connects to the broker described by a [`BridgeConfig`], subscribes to the
//! hub's `accepted` and `rejected` topics once the broker acknowledges the
//! connection, and forwards everything it receives as [`TransportEvent`]s.
//!
//! There is no reconnection logic: when the event loop fails, a
//! [`TransportEvent::Disconnected`] is sent and the loop stops.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, oneshot};

use crate::config::BridgeConfig;
use crate::error::ProtocolError;

use super::{HubTopics, OutboundMessage, Transport};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

const REQUEST_CHANNEL_CAPACITY: usize = 10;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A message received on one of the hub topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// What the MQTT event loop reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker acknowledged the connection and the hub topics were
    /// subscribed.
    Connected,
    /// A message arrived on a subscribed topic.
    Message(InboundMessage),
    /// The connection was lost; the event loop has stopped.
    Disconnected(String),
}

/// Publishes outbound envelopes over MQTT.
///
/// Cheaply cloneable; clones share the same client.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttTransport {
    /// Connects to the broker and waits for its ConnAck.
    ///
    /// Returns the transport together with the receiver of everything the
    /// event loop reports. The first event is always
    /// [`TransportEvent::Connected`].
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` for a bad broker URL,
    /// `ProtocolError::Tls` if certificate files cannot be read, or
    /// `ProtocolError::ConnectionFailed` if no ConnAck arrives within the
    /// configured timeout.
    pub async fn connect(
        config: &BridgeConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), ProtocolError> {
        let address = config.broker_address()?;
        let topics = HubTopics::new(config.hub_id.clone());

        let client_id = config.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("mhub_bridge_{}_{}", std::process::id(), counter)
        });

        let mut mqtt_options = MqttOptions::new(&client_id, &address.host, address.port);
        mqtt_options.set_keep_alive(config.keep_alive());
        mqtt_options.set_clean_session(true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        if let Some(transport) = tls_transport(config)? {
            mqtt_options.set_transport(transport);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(handle_events(
            event_loop,
            client.clone(),
            topics,
            Arc::clone(&connected),
            event_tx,
            connack_tx,
        ));

        let timeout = config.connection_timeout();
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %address.host,
                    port = address.port,
                    tls = address.tls,
                    client_id = %client_id,
                    "Connected to MQTT broker"
                );
            }
            Ok(Err(_)) => {
                return Err(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                return Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )));
            }
        }

        Ok((Self { client, connected }, event_rx))
    }

    /// Returns whether the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!("Disconnecting from MQTT broker");
        self.client.disconnect().await?;
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Transport for MqttTransport {
    fn publish(&self, message: &OutboundMessage) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        let payload = message
            .payload()
            .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?;
        tracing::debug!(topic = %message.topic, payload = %payload, "Publishing");
        self.client
            .try_publish(message.topic.as_str(), QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

/// Builds the TLS transport when a CA is configured.
fn tls_transport(config: &BridgeConfig) -> Result<Option<rumqttc::Transport>, ProtocolError> {
    let Some(ca_path) = &config.ca_path else {
        return Ok(None);
    };
    let ca = read_pem(ca_path)?;
    let client_auth = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
        (None, None) => None,
        _ => {
            return Err(ProtocolError::Tls(
                "client certificate and key must be set together".to_string(),
            ));
        }
    };
    Ok(Some(rumqttc::Transport::tls(ca, client_auth, None)))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ProtocolError> {
    std::fs::read(path).map_err(|e| ProtocolError::Tls(format!("{}: {e}", path.display())))
}

/// Drives the MQTT event loop until it fails or the broker disconnects.
async fn handle_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: HubTopics,
    connected: Arc<AtomicBool>,
    events: mpsc::Sender<TransportEvent>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                for topic in topics.subscriptions() {
                    if let Err(e) = client.try_subscribe(topic, QoS::AtLeastOnce) {
                        tracing::error!(topic = %topic, error = %e, "Failed to subscribe");
                    }
                }
                connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
                let _ = events.send(TransportEvent::Connected).await;
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "MQTT message received"
                );
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if events.send(TransportEvent::Message(message)).await.is_err() {
                    tracing::debug!("Event receiver dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                connected.store(false, Ordering::Release);
                let _ = events
                    .send(TransportEvent::Disconnected(
                        "broker closed the connection".to_string(),
                    ))
                    .await;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                connected.store(false, Ordering::Release);
                let _ = events.send(TransportEvent::Disconnected(e.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn no_tls_without_ca() {
        let config = BridgeConfig::new("hub", "mqtt://localhost");
        assert!(tls_transport(&config).unwrap().is_none());
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let mut config = BridgeConfig::new("hub", "mqtts://localhost");
        config.ca_path = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(
            tls_transport(&config),
            Err(ProtocolError::Tls(_))
        ));
    }

    #[tokio::test]
    async fn invalid_address_fails_fast() {
        let config = BridgeConfig::new("hub", "mqtt://broker:notaport");
        let result = MqttTransport::connect(&config).await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn unreachable_broker_fails() {
        // Port 1 is reserved and nothing listens on it.
        let config = BridgeConfig::new("hub", "mqtt://127.0.0.1:1")
            .with_connection_timeout(Duration::from_secs(2));
        let result = MqttTransport::connect(&config).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[test]
    fn inbound_message_equality() {
        let a = InboundMessage {
            topic: "mha/v1/h/accepted".to_string(),
            payload: b"{}".to_vec(),
        };
        assert_eq!(
            TransportEvent::Message(a.clone()),
            TransportEvent::Message(a)
        );
    }
}
