// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! mHub Bridge - reconciles mHub device state into a typed accessory
//! registry.
//!
//! An mHub publishes its devices and their state as JSON envelopes on MQTT.
//! This library keeps a registry of accessories in step with those
//! envelopes, translates raw state into host characteristics through a
//! driver per device type, and sends user-initiated changes back to the hub.
//!
//! # Supported Devices
//!
//! - **Switches**: 1-4 gang switches, smart plugs, relays and panels, with a
//!   master switch on multi-channel devices
//! - **Fans**: power and six speed levels
//! - **Sensors**: contact, motion, temperature and humidity, with battery
//!
//! Devices of any other type are registered with a fallback driver that
//! keeps their raw state and exposes nothing.
//!
//! # Quick Start
//!
//! ## Connecting to a Broker
//!
//! ```no_run
//! use mhub_bridge::{AccessoryEvent, Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> mhub_bridge::Result<()> {
//!     let config = BridgeConfig::new("hub-1", "mqtt://192.168.1.50:1883")
//!         .with_credentials("user", "secret");
//!
//!     // Subscribes to the hub topics and requests the device list
//!     let bridge = Bridge::connect(&config).await?;
//!
//!     let mut events = bridge.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let AccessoryEvent::Registered { identity, .. } = event {
//!             println!("New accessory: {identity}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Without a Broker
//!
//! Any [`protocol::Transport`] can carry outbound envelopes; inbound ones are
//! fed with [`Bridge::handle_message`].
//!
//! ```
//! use mhub_bridge::Bridge;
//! use mhub_bridge::protocol::{HubTopics, MemoryTransport};
//! use mhub_bridge::types::SwitchChannel;
//!
//! let transport = MemoryTransport::new();
//! let bridge = Bridge::new(HubTopics::new("hub-1"), transport.clone());
//!
//! bridge
//!     .handle_message(
//!         "mha/v1/hub-1/accepted",
//!         br#"{"metadata":{"cmd":"addDevice"},"device":{"abc-3G":{"n":"Hall","s":[0,5]}}}"#,
//!     )
//!     .unwrap();
//!
//! assert!(bridge.switch_state("abc", SwitchChannel::Index(0)).unwrap());
//! assert!(!bridge.switch_state("abc", SwitchChannel::Master).unwrap());
//!
//! bridge.set_switch("abc", SwitchChannel::Master, true).unwrap();
//! assert_eq!(transport.published().len(), 1);
//! ```

mod bridge;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod types;

pub use bridge::Bridge;
pub use config::{BridgeConfig, BrokerAddress};
pub use driver::{Driver, ServiceDescriptor, ServiceKind, StateDelta, create_driver};
pub use error::{DeviceError, Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{AccessoryEvent, EventBus};
pub use protocol::{EnvelopeReport, HubTopics, MemoryTransport, Transport};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttTransport, TransportEvent};
pub use registry::{Accessory, AccessoryRegistry};
pub use state::{AccessoryRecord, CharacteristicValue, CharacteristicWrite, DeviceIdentity};
pub use types::{BatteryLevel, CapabilityType, FanLevel, SwitchChannel};
