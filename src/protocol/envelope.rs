// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON envelope exchanged with the hub.
//!
//! Every message is one envelope: a `metadata` block naming the command plus
//! one payload field whose shape depends on the command.
//!
//! ```json
//! {
//!   "metadata": {"ts": 1700000000000, "request_id": "a1b2c3", "cmd": "addDevice", "mhub_id": "hub-1"},
//!   "device": {"a1b2c3-3G": {"n": "Hall", "s": [0, 5]}}
//! }
//! ```
//!
//! Device maps are kept as raw JSON here so that one malformed entry can be
//! dropped without rejecting its siblings.

use serde::Deserialize as _;
use serde::Deserializer;
use serde_json::{Map, Value};

use crate::driver::StateDelta;
use crate::error::ParseError;
use crate::state::DeviceIdentity;

use super::HubTopics;

/// Envelope command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Command {
    /// Ask the hub for every device (outbound).
    GetDevices,
    /// The full device list; replaces the registry.
    AddDevices,
    /// Devices added or re-announced.
    AddDevice,
    /// Partial state updates (both directions).
    State,
    /// Devices deleted on the hub.
    DeleteDevice,
    /// Any command the bridge does not handle.
    Unknown,
}

impl Command {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetDevices => "getDevices",
            Self::AddDevices => "addDevices",
            Self::AddDevice => "addDevice",
            Self::State => "state",
            Self::DeleteDevice => "deleteDevice",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        match value.as_str() {
            "getDevices" => Self::GetDevices,
            "addDevices" => Self::AddDevices,
            "addDevice" => Self::AddDevice,
            "state" => Self::State,
            "deleteDevice" => Self::DeleteDevice,
            _ => Self::Unknown,
        }
    }
}

impl From<Command> for &'static str {
    fn from(value: Command) -> Self {
        value.as_str()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Metadata {
    /// Topic the envelope was published on, when the sender includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Send time in milliseconds since the Unix epoch.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub ts: i64,
    /// Six hex characters, no correlation semantics.
    #[serde(default, deserialize_with = "null_as_default")]
    pub request_id: String,
    /// The command.
    pub cmd: Command,
    /// Hub identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub mhub_id: String,
    /// Unique id of the device an outbound update targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Reads `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a millisecond timestamp sent as an integer, a float or numeric
/// text. Anything else reads as `0`.
#[allow(clippy::cast_possible_truncation)]
fn lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64),
        _ => None,
    };
    Ok(millis.unwrap_or_default())
}

/// Time and request id stamped on an outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStamp {
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    /// Six lowercase hex characters.
    pub request_id: String,
}

impl RequestStamp {
    /// Length of a request id.
    pub const REQUEST_ID_LEN: usize = 6;

    /// Stamps the current time with a fresh random request id.
    #[must_use]
    pub fn now() -> Self {
        let mut request_id = uuid::Uuid::new_v4().simple().to_string();
        request_id.truncate(Self::REQUEST_ID_LEN);
        Self {
            ts: chrono::Utc::now().timestamp_millis(),
            request_id,
        }
    }
}

/// One envelope.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    /// Metadata block.
    pub metadata: Metadata,
    /// `addDevices` payload: composite key to device payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Map<String, Value>>,
    /// `addDevice` payload (a map) or `deleteDevice` payload (a key list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Value>,
    /// `state` payload: composite key to partial device payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Map<String, Value>>,
}

impl Envelope {
    /// Parses an inbound envelope.
    ///
    /// # Errors
    ///
    /// - `ParseError::Json` if the payload is not JSON or a field has the
    ///   wrong type
    /// - `ParseError::MissingField` if `metadata` or `metadata.cmd` is absent
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(payload)?;
        let metadata = value
            .get("metadata")
            .filter(|m| m.is_object())
            .ok_or_else(|| ParseError::MissingField("metadata".to_string()))?;
        if metadata.get("cmd").is_none_or(Value::is_null) {
            return Err(ParseError::MissingField("metadata.cmd".to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Builds the device list request sent after connecting.
    #[must_use]
    pub fn get_devices(hub_id: &str, stamp: RequestStamp) -> Self {
        Self {
            metadata: Metadata {
                topic: None,
                ts: stamp.ts,
                request_id: stamp.request_id,
                cmd: Command::GetDevices,
                mhub_id: hub_id.to_string(),
                node_id: None,
            },
            devices: None,
            device: None,
            state: None,
        }
    }

    /// Builds an outbound state update for one device.
    #[must_use]
    pub fn state_update(
        topics: &HubTopics,
        identity: &DeviceIdentity,
        delta: StateDelta,
        stamp: RequestStamp,
    ) -> Self {
        let mut entry = Map::new();
        entry.insert("s".to_string(), delta.to_wire());
        let mut state = Map::new();
        state.insert(identity.composite_key(), Value::Object(entry));

        Self {
            metadata: Metadata {
                topic: Some(topics.state_set().to_string()),
                ts: stamp.ts,
                request_id: stamp.request_id,
                cmd: Command::State,
                mhub_id: topics.hub_id().to_string(),
                node_id: Some(identity.unique_id().to_string()),
            },
            devices: None,
            device: None,
            state: Some(state),
        }
    }

    /// Returns the command.
    #[must_use]
    pub fn command(&self) -> Command {
        self.metadata.cmd
    }
}

/// The `{n, s, b}` record of one device inside a payload map.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct DevicePayload {
    /// Display name.
    #[serde(default, rename = "n")]
    pub name: Option<String>,
    /// Raw state, absent or `null` when unknown.
    #[serde(default, rename = "s")]
    pub state: Option<Value>,
    /// Battery level, absent or `null` when unknown.
    #[serde(default, rename = "b")]
    pub battery: Option<Value>,
}

impl DevicePayload {
    /// Parses one map entry.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the entry is not a `{n, s, b}` object.
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        if !value.is_object() {
            return Err(ParseError::UnexpectedFormat(format!(
                "expected a device object, got {value}"
            )));
        }
        Ok(Self::deserialize(value)?)
    }
}

/// An envelope ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Destination topic.
    pub topic: String,
    /// The envelope.
    pub envelope: Envelope,
}

impl OutboundMessage {
    /// Pairs an envelope with its topic.
    #[must_use]
    pub fn new(topic: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            topic: topic.into(),
            envelope,
        }
    }

    /// Serializes the envelope.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if serialization fails.
    pub fn payload(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(&self.envelope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityType;
    use serde_json::json;

    fn stamp() -> RequestStamp {
        RequestStamp {
            ts: 1_700_000_000_000,
            request_id: "a1b2c3".to_string(),
        }
    }

    #[test]
    fn request_stamp_shape() {
        let stamp = RequestStamp::now();
        assert_eq!(stamp.request_id.len(), RequestStamp::REQUEST_ID_LEN);
        assert!(
            stamp
                .request_id
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
        assert!(stamp.ts > 0);
    }

    #[test]
    fn parse_add_device() {
        let envelope = Envelope::parse(
            br#"{"metadata":{"cmd":"addDevice","ts":1,"request_id":"abcdef","mhub_id":"h"},
                 "device":{"x-1G":{"n":"Lamp","s":[0,1]}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.command(), Command::AddDevice);
        assert!(envelope.device.unwrap().is_object());
    }

    #[test]
    fn parse_rejects_missing_cmd() {
        let err = Envelope::parse(br#"{"metadata":{"ts":1}}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField(ref f) if f == "metadata.cmd"));

        let err = Envelope::parse(br#"{"devices":{}}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField(ref f) if f == "metadata"));

        assert!(matches!(
            Envelope::parse(b"not json").unwrap_err(),
            ParseError::Json(_)
        ));
    }

    #[test]
    fn parse_tolerates_loose_metadata() {
        let envelope = Envelope::parse(
            br#"{"metadata":{"cmd":"state","ts":1.7e12,"request_id":null,"mhub_id":null},
                 "state":{}}"#,
        )
        .unwrap();
        assert_eq!(envelope.metadata.ts, 1_700_000_000_000);
        assert!(envelope.metadata.request_id.is_empty());
        assert!(envelope.metadata.mhub_id.is_empty());

        let envelope =
            Envelope::parse(br#"{"metadata":{"cmd":"state","ts":"1700000000123"}}"#).unwrap();
        assert_eq!(envelope.metadata.ts, 1_700_000_000_123);

        let envelope = Envelope::parse(br#"{"metadata":{"cmd":"state","ts":null}}"#).unwrap();
        assert_eq!(envelope.metadata.ts, 0);
    }

    #[test]
    fn parse_rejects_wrong_payload_shape() {
        let err = Envelope::parse(br#"{"metadata":{"cmd":"addDevices"},"devices":[1,2]}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn unknown_command_parses() {
        let envelope = Envelope::parse(br#"{"metadata":{"cmd":"reboot"}}"#).unwrap();
        assert_eq!(envelope.command(), Command::Unknown);
    }

    #[test]
    fn get_devices_shape() {
        let envelope = Envelope::get_devices("hub-1", stamp());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "metadata": {
                    "ts": 1_700_000_000_000_i64,
                    "request_id": "a1b2c3",
                    "cmd": "getDevices",
                    "mhub_id": "hub-1"
                }
            })
        );
    }

    #[test]
    fn state_update_shape() {
        let topics = HubTopics::new("hub-1");
        let identity = DeviceIdentity::new("abc", CapabilityType::ThreeGang);
        let envelope = Envelope::state_update(&topics, &identity, StateDelta::Switch(255, 7), stamp());

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "metadata": {
                    "topic": "mha/v1/hub-1/devices/state/set",
                    "ts": 1_700_000_000_000_i64,
                    "request_id": "a1b2c3",
                    "cmd": "state",
                    "mhub_id": "hub-1",
                    "node_id": "abc"
                },
                "state": {"abc-3G": {"s": [255, 7]}}
            })
        );
    }

    #[test]
    fn device_payload_fields() {
        let payload = DevicePayload::from_value(&json!({"n": "Door", "s": 1, "b": null})).unwrap();
        assert_eq!(payload.name.as_deref(), Some("Door"));
        assert_eq!(payload.state, Some(json!(1)));
        assert_eq!(payload.battery, None);

        assert!(DevicePayload::from_value(&json!([1, 2])).is_err());
        assert!(DevicePayload::from_value(&json!({"n": 5})).is_err());
    }

    #[test]
    fn outbound_payload_is_json() {
        let message = OutboundMessage::new("t", Envelope::get_devices("h", stamp()));
        let text = message.payload().unwrap();
        assert!(text.contains(r#""cmd":"getDevices""#));
    }
}
