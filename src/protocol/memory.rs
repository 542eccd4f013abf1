// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ProtocolError;

use super::{OutboundMessage, Transport};

/// A message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic it was published on.
    pub topic: String,
    /// Serialized envelope.
    pub payload: String,
}

impl PublishedMessage {
    /// Parses the payload back into JSON.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the payload is not JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Records every published message instead of sending it.
///
/// Clones share the same record. Useful for tests and for hosts that move
/// messages over their own channel.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    offline: bool,
}

impl MemoryTransport {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose every publish fails with
    /// `ProtocolError::NotConnected`.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            published: Arc::default(),
            offline: true,
        }
    }

    /// Returns a copy of everything published so far.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Removes and returns everything published so far.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.published.lock())
    }
}

impl Transport for MemoryTransport {
    fn publish(&self, message: &OutboundMessage) -> Result<(), ProtocolError> {
        if self.offline {
            return Err(ProtocolError::NotConnected);
        }
        let payload = message
            .payload()
            .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?;
        self.published.lock().push(PublishedMessage {
            topic: message.topic.clone(),
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Envelope, RequestStamp};

    fn message() -> OutboundMessage {
        OutboundMessage::new(
            "mha/v1/h/devices/get",
            Envelope::get_devices("h", RequestStamp::now()),
        )
    }

    #[test]
    fn records_and_takes() {
        let transport = MemoryTransport::new();
        let shared = transport.clone();

        transport.publish(&message()).unwrap();
        assert_eq!(shared.published().len(), 1);
        assert_eq!(
            shared.published()[0].json().unwrap()["metadata"]["cmd"],
            "getDevices"
        );

        assert_eq!(shared.take().len(), 1);
        assert!(transport.published().is_empty());
    }

    #[test]
    fn offline_fails() {
        let transport = MemoryTransport::offline();
        assert!(matches!(
            transport.publish(&message()),
            Err(ProtocolError::NotConnected)
        ));
        assert!(transport.published().is_empty());
    }
}
