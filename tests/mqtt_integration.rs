// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::time::Duration;

use mhub_bridge::protocol::{HubTopics, MqttTransport, TransportEvent};
use mhub_bridge::types::SwitchChannel;
use mhub_bridge::{Bridge, BridgeConfig, Error, ProtocolError, Transport};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::{sleep, timeout};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

fn config(port: u16) -> BridgeConfig {
    BridgeConfig::new("hub-test", format!("mqtt://127.0.0.1:{port}"))
        .with_connection_timeout(Duration::from_secs(5))
}

// ============================================================================
// Transport Connection Tests
// ============================================================================

mod transport_connection {
    use super::*;

    #[tokio::test]
    async fn connect_reports_connected_first() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (transport, mut events) = MqttTransport::connect(&config(port)).await.unwrap();
        assert!(transport.is_connected());

        let first = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no transport event");
        assert_eq!(first, Some(TransportEvent::Connected));
    }

    #[tokio::test]
    async fn connect_with_tcp_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = BridgeConfig::new("hub-test", format!("tcp://127.0.0.1:{port}"));
        assert!(MqttTransport::connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn connect_without_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = BridgeConfig::new("hub-test", format!("127.0.0.1:{port}"))
            .with_client_id("fixed-client");
        assert!(MqttTransport::connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn publish_after_connect() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (transport, _events) = MqttTransport::connect(&config(port)).await.unwrap();
        let engine =
            mhub_bridge::protocol::ReconciliationEngine::new(HubTopics::new("hub-test"));
        let message = engine.request_all_devices(mhub_bridge::protocol::RequestStamp::now());

        assert!(transport.publish(&message).is_ok());
    }

    #[tokio::test]
    async fn publish_after_disconnect_fails() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (transport, _events) = MqttTransport::connect(&config(port)).await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());

        let engine =
            mhub_bridge::protocol::ReconciliationEngine::new(HubTopics::new("hub-test"));
        let message = engine.request_all_devices(mhub_bridge::protocol::RequestStamp::now());
        assert!(matches!(
            transport.publish(&message),
            Err(ProtocolError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn no_broker_times_out_or_fails() {
        let port = get_test_port();

        let result = MqttTransport::connect(&config(port)).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }
}

// ============================================================================
// Bridge over MQTT Tests
// ============================================================================

mod bridge_mqtt {
    use super::*;

    #[tokio::test]
    async fn connect_bridge() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let bridge = Bridge::connect(&config(port)).await.unwrap();
        assert!(bridge.transport().is_connected());
        assert!(bridge.is_empty());
        assert_eq!(bridge.topics().accepted(), "mha/v1/hub-test/accepted");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_connecting() {
        let config = BridgeConfig::new("hub/test", "mqtt://127.0.0.1:1");
        let result = Bridge::connect(&config).await;
        assert!(matches!(result, Err(Error::Device(_))));
    }

    #[tokio::test]
    async fn writes_are_published() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let bridge = Bridge::connect(&config(port)).await.unwrap();
        bridge
            .handle_message(
                "mha/v1/hub-test/accepted",
                br#"{"metadata":{"cmd":"addDevice"},"device":{"abc-2G":{"n":"Hall","s":[0,0]}}}"#,
            )
            .unwrap();

        bridge.set_switch("abc", SwitchChannel::Master, true).unwrap();
        assert!(bridge.switch_state("abc", SwitchChannel::Index(1)).unwrap());

        bridge.disconnect().await.unwrap();
        assert!(!bridge.transport().is_connected());
    }
}

// ============================================================================
// Inbound Routing
// ============================================================================
//
// NOTE: The mockforge-mqtt broker used for testing doesn't fully support
// pub/sub message forwarding between clients. Inbound envelope handling is
// covered through `Bridge::handle_message` in tests/reconciliation.rs and in
// the unit tests of src/protocol/engine.rs.
