// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub topic names.

/// What an inbound topic means to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Envelopes the hub accepted; these drive the registry.
    Accepted,
    /// Envelopes the hub rejected; logged only.
    Rejected,
    /// Anything else.
    Other,
}

/// The four topics of one hub, derived from its identifier.
///
/// # Examples
///
/// ```
/// use mhub_bridge::protocol::{HubTopics, TopicKind};
///
/// let topics = HubTopics::new("hub-1");
/// assert_eq!(topics.accepted(), "mha/v1/hub-1/accepted");
/// assert_eq!(topics.state_set(), "mha/v1/hub-1/devices/state/set");
/// assert_eq!(topics.classify("mha/v1/hub-1/rejected"), TopicKind::Rejected);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubTopics {
    hub_id: String,
    accepted: String,
    rejected: String,
    devices_get: String,
    state_set: String,
}

impl HubTopics {
    /// Derives the topics for a hub.
    #[must_use]
    pub fn new(hub_id: impl Into<String>) -> Self {
        let hub_id = hub_id.into();
        Self {
            accepted: format!("mha/v1/{hub_id}/accepted"),
            rejected: format!("mha/v1/{hub_id}/rejected"),
            devices_get: format!("mha/v1/{hub_id}/devices/get"),
            state_set: format!("mha/v1/{hub_id}/devices/state/set"),
            hub_id,
        }
    }

    /// Returns the hub identifier.
    #[must_use]
    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    /// Topic the hub answers on.
    #[must_use]
    pub fn accepted(&self) -> &str {
        &self.accepted
    }

    /// Topic the hub reports rejected requests on.
    #[must_use]
    pub fn rejected(&self) -> &str {
        &self.rejected
    }

    /// Topic for the device list request.
    #[must_use]
    pub fn devices_get(&self) -> &str {
        &self.devices_get
    }

    /// Topic for outbound state updates.
    #[must_use]
    pub fn state_set(&self) -> &str {
        &self.state_set
    }

    /// Topics to subscribe to after connecting.
    #[must_use]
    pub fn subscriptions(&self) -> [&str; 2] {
        [&self.accepted, &self.rejected]
    }

    /// Classifies an inbound topic.
    #[must_use]
    pub fn classify(&self, topic: &str) -> TopicKind {
        if topic == self.accepted {
            TopicKind::Accepted
        } else if topic == self.rejected {
            TopicKind::Rejected
        } else {
            TopicKind::Other
        }
    }
}
