// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub protocol: envelopes, topics, reconciliation and transports.
//!
//! - [`Envelope`] - the JSON wire format and its outbound builders
//! - [`HubTopics`] - topic names derived from the hub id
//! - [`ReconciliationEngine`] - applies inbound envelopes to the registry
//! - [`Transport`] - where outbound envelopes go: [`MqttTransport`] (with
//!   the `mqtt` feature) or [`MemoryTransport`]

mod engine;
mod envelope;
mod memory;
#[cfg(feature = "mqtt")]
mod mqtt;
mod topics;

pub use engine::{EnvelopeReport, Reconciliation, ReconciliationEngine};
pub use envelope::{Command, DevicePayload, Envelope, Metadata, OutboundMessage, RequestStamp};
pub use memory::{MemoryTransport, PublishedMessage};
#[cfg(feature = "mqtt")]
pub use mqtt::{InboundMessage, MqttTransport, TransportEvent};
pub use topics::{HubTopics, TopicKind};

use crate::error::ProtocolError;

/// Sends outbound envelopes.
///
/// Publishing is fire and forget: implementations hand the message off
/// without waiting for the broker, and never retry. The bridge calls this
/// with no lock held.
pub trait Transport: Send + Sync {
    /// Hands one message to the transport.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message could not be queued.
    fn publish(&self, message: &OutboundMessage) -> Result<(), ProtocolError>;
}
