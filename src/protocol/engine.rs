// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of hub envelopes with the accessory registry.
//!
//! The engine holds no state besides the hub topics. Each call takes the
//! registry by mutable reference, so the caller decides how access is
//! serialized (the [`Bridge`](crate::Bridge) uses one lock).
//!
//! An envelope is fully validated before the registry is touched. A bad
//! entry inside a valid envelope is dropped on its own and its siblings
//! still apply.

use serde_json::{Map, Value};

use crate::error::{Error, ParseError};
use crate::event::AccessoryEvent;
use crate::registry::{AccessoryRegistry, UpsertOutcome};
use crate::state::{AccessoryRecord, CharacteristicWrite, DeviceIdentity, StatePatch};

use super::envelope::{Command, DevicePayload, Envelope, OutboundMessage, RequestStamp};
use super::topics::{HubTopics, TopicKind};

/// What one envelope did to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeReport {
    /// Command of the envelope, `None` if it was not processed.
    pub command: Option<Command>,
    /// Accessories created.
    pub registered: usize,
    /// Known accessories refreshed in place.
    pub restored: usize,
    /// Accessories recreated because their type changed.
    pub replaced: usize,
    /// Accessories whose state was merged.
    pub updated: usize,
    /// Accessories removed.
    pub removed: usize,
    /// Entries dropped because they were malformed.
    pub skipped: usize,
    /// Entries naming an unknown accessory.
    pub ignored: usize,
}

impl EnvelopeReport {
    fn for_command(command: Command) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }

    /// Returns `true` if the registry was changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.registered + self.restored + self.replaced + self.updated + self.removed > 0
    }
}

/// Result of processing one envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Counts for logs and tests.
    pub report: EnvelopeReport,
    /// Events for the host, in order.
    pub events: Vec<AccessoryEvent>,
}

/// Drives the registry from inbound envelopes and builds outbound ones.
///
/// # Examples
///
/// ```
/// use mhub_bridge::protocol::{HubTopics, ReconciliationEngine};
/// use mhub_bridge::registry::AccessoryRegistry;
///
/// let engine = ReconciliationEngine::new(HubTopics::new("hub-1"));
/// let mut registry = AccessoryRegistry::new();
///
/// let payload = br#"{"metadata":{"cmd":"addDevice"},"device":{"abc-3G":{"n":"Hall","s":[0,5]}}}"#;
/// let outcome = engine
///     .process(&mut registry, "mha/v1/hub-1/accepted", payload)
///     .unwrap();
///
/// assert_eq!(outcome.report.registered, 1);
/// assert!(registry.contains("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    topics: HubTopics,
}

impl ReconciliationEngine {
    /// Creates an engine for one hub.
    #[must_use]
    pub fn new(topics: HubTopics) -> Self {
        Self { topics }
    }

    /// Returns the hub topics.
    #[must_use]
    pub fn topics(&self) -> &HubTopics {
        &self.topics
    }

    /// Processes one inbound message.
    ///
    /// Only the accepted topic drives the registry. Rejections are logged
    /// and other topics ignored; both return an empty reconciliation.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if an accepted envelope is malformed. The
    /// registry is then unchanged.
    pub fn process(
        &self,
        registry: &mut AccessoryRegistry,
        topic: &str,
        payload: &[u8],
    ) -> Result<Reconciliation, ParseError> {
        match self.topics.classify(topic) {
            TopicKind::Accepted => {
                let envelope = Envelope::parse(payload)?;
                self.apply(registry, &envelope)
            }
            TopicKind::Rejected => {
                tracing::warn!(
                    topic = %topic,
                    payload = %String::from_utf8_lossy(payload),
                    "Hub rejected request"
                );
                Ok(Reconciliation::default())
            }
            TopicKind::Other => {
                tracing::debug!(topic = %topic, "Ignoring message on unrelated topic");
                Ok(Reconciliation::default())
            }
        }
    }

    /// Applies a parsed envelope.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the payload field the command needs is
    /// missing or has the wrong shape. The registry is then unchanged.
    pub fn apply(
        &self,
        registry: &mut AccessoryRegistry,
        envelope: &Envelope,
    ) -> Result<Reconciliation, ParseError> {
        let command = envelope.command();
        tracing::debug!(
            cmd = %command,
            request_id = %envelope.metadata.request_id,
            "Processing envelope"
        );

        let outcome = match command {
            Command::AddDevices => {
                let devices = envelope
                    .devices
                    .as_ref()
                    .ok_or_else(|| ParseError::MissingField("devices".to_string()))?;
                replace_all(registry, devices)
            }
            Command::AddDevice => {
                let device = device_map(envelope)?;
                add_each(registry, device)
            }
            Command::State => {
                let state = envelope
                    .state
                    .as_ref()
                    .ok_or_else(|| ParseError::MissingField("state".to_string()))?;
                update_each(registry, state)
            }
            Command::DeleteDevice => {
                let keys = delete_list(envelope)?;
                remove_each(registry, keys)
            }
            Command::GetDevices | Command::Unknown => {
                tracing::debug!(cmd = %command, "Ignoring command");
                Reconciliation::default()
            }
        };

        if outcome.report.command.is_some() {
            tracing::info!(
                cmd = %command,
                registered = outcome.report.registered,
                restored = outcome.report.restored,
                replaced = outcome.report.replaced,
                updated = outcome.report.updated,
                removed = outcome.report.removed,
                skipped = outcome.report.skipped,
                ignored = outcome.report.ignored,
                "Envelope applied"
            );
        }
        Ok(outcome)
    }

    /// Builds the device list request.
    #[must_use]
    pub fn request_all_devices(&self, stamp: RequestStamp) -> OutboundMessage {
        OutboundMessage::new(
            self.topics.devices_get(),
            Envelope::get_devices(self.topics.hub_id(), stamp),
        )
    }

    /// Applies a user-initiated change and builds the state update to
    /// publish.
    ///
    /// The record is updated locally right away; the hub's echo of the
    /// update is merged like any other.
    ///
    /// # Errors
    ///
    /// - `Error::DeviceNotFound` if no accessory has `unique_id`
    /// - the driver's error if the write does not apply or is out of range;
    ///   the record is then unchanged
    pub fn apply_write(
        &self,
        registry: &mut AccessoryRegistry,
        unique_id: &str,
        write: CharacteristicWrite,
        stamp: RequestStamp,
    ) -> Result<OutboundMessage, Error> {
        let accessory = registry
            .lookup_mut(unique_id)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))?;
        let (driver, record) = accessory.parts_mut();
        let delta = driver.write(record, write)?;

        Ok(OutboundMessage::new(
            self.topics.state_set(),
            Envelope::state_update(&self.topics, record.identity(), delta, stamp),
        ))
    }
}

fn device_map(envelope: &Envelope) -> Result<&Map<String, Value>, ParseError> {
    match &envelope.device {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(ParseError::UnexpectedFormat(format!(
            "addDevice expects a device map, got {other}"
        ))),
        None => Err(ParseError::MissingField("device".to_string())),
    }
}

fn delete_list(envelope: &Envelope) -> Result<&[Value], ParseError> {
    match &envelope.device {
        Some(Value::Array(keys)) => Ok(keys),
        Some(other) => Err(ParseError::UnexpectedFormat(format!(
            "deleteDevice expects a key list, got {other}"
        ))),
        None => Err(ParseError::MissingField("device".to_string())),
    }
}

/// One parsed entry of a registration map.
struct Registration {
    /// The record to insert when the device is new.
    record: AccessoryRecord,
    /// `n` as sent, `None` when absent or `null`.
    name: Option<String>,
    /// `s` and `b` as sent, merged into a known record.
    patch: StatePatch,
}

/// Parses every entry of a registration map, dropping bad ones.
fn parse_registrations(devices: &Map<String, Value>, skipped: &mut usize) -> Vec<Registration> {
    devices
        .iter()
        .filter_map(|(key, value)| match parse_registration(key, value) {
            Ok(registration) => Some(registration),
            Err(e) => {
                tracing::warn!(device = %key, error = %e, "Dropping malformed device entry");
                *skipped += 1;
                None
            }
        })
        .collect()
}

fn parse_registration(key: &str, value: &Value) -> Result<Registration, ParseError> {
    let identity = DeviceIdentity::parse_composite_key(key)?;
    let payload = DevicePayload::from_value(value)?;
    let patch = StatePatch::from_wire(payload.state.as_ref(), payload.battery.as_ref())?;
    let display_name = payload
        .name
        .clone()
        .unwrap_or_else(|| identity.unique_id().to_string());
    let record = AccessoryRecord::from_wire(
        identity,
        display_name,
        payload.state.as_ref(),
        payload.battery.as_ref(),
    )?;
    Ok(Registration {
        record,
        name: payload.name,
        patch,
    })
}

fn replace_all(registry: &mut AccessoryRegistry, devices: &Map<String, Value>) -> Reconciliation {
    let mut report = EnvelopeReport::for_command(Command::AddDevices);
    let registrations = parse_registrations(devices, &mut report.skipped);
    let mut events = Vec::new();

    for accessory in registry.clear() {
        tracing::info!(device = %accessory.record().identity(), "Removing accessory before full sync");
        report.removed += 1;
        events.push(AccessoryEvent::unregistered(
            accessory.record().identity().clone(),
        ));
    }

    for registration in registrations {
        register(registry, registration, &mut report, &mut events);
    }
    Reconciliation { report, events }
}

fn add_each(registry: &mut AccessoryRegistry, devices: &Map<String, Value>) -> Reconciliation {
    let mut report = EnvelopeReport::for_command(Command::AddDevice);
    let registrations = parse_registrations(devices, &mut report.skipped);
    let mut events = Vec::new();

    for registration in registrations {
        register(registry, registration, &mut report, &mut events);
    }
    Reconciliation { report, events }
}

/// Registers a new device, or refreshes a known one in place.
///
/// A known device of the same type keeps its record: only the fields the
/// entry carries are merged, as for a state update. A known device of
/// another type is replaced.
fn register(
    registry: &mut AccessoryRegistry,
    registration: Registration,
    report: &mut EnvelopeReport,
    events: &mut Vec<AccessoryEvent>,
) {
    let id = registration.record.unique_id().to_string();
    let known = registry.lookup(&id).is_some_and(|accessory| {
        accessory.record().capability_type() == registration.record.capability_type()
    });

    let outcome = if known {
        let Some(accessory) = registry.lookup_mut(&id) else {
            return;
        };
        let (_, record) = accessory.parts_mut();
        if let Err(e) = record.refresh(registration.name, &registration.patch) {
            tracing::warn!(device = %record.identity(), error = %e, "State does not fit device type");
            report.skipped += 1;
            return;
        }
        UpsertOutcome::Restored
    } else {
        registry.upsert(registration.record)
    };

    let Some(accessory) = registry.lookup(&id) else {
        return;
    };
    let record = accessory.record();
    let driver = accessory.driver();

    match outcome {
        UpsertOutcome::Registered | UpsertOutcome::Replaced { .. } => {
            if let UpsertOutcome::Replaced { previous } = outcome {
                report.replaced += 1;
                events.push(AccessoryEvent::unregistered(DeviceIdentity::new(
                    id.as_str(),
                    previous,
                )));
            } else {
                report.registered += 1;
            }
            tracing::info!(device = %record.identity(), name = %record.display_name(), "Adding new accessory");
            events.push(AccessoryEvent::Registered {
                identity: record.identity().clone(),
                display_name: record.display_name().to_string(),
                services: driver.initialize(record),
            });
        }
        UpsertOutcome::Restored => {
            report.restored += 1;
            tracing::info!(device = %record.identity(), name = %record.display_name(), "Restoring existing accessory");
            events.push(AccessoryEvent::Restored {
                identity: record.identity().clone(),
                display_name: record.display_name().to_string(),
            });
            match driver.characteristics(record) {
                Ok(values) if !values.is_empty() => {
                    events.push(AccessoryEvent::updated(record.identity().clone(), values));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(device = %record.identity(), error = %e, "Cannot read restored accessory");
                }
            }
        }
    }
}

fn update_each(registry: &mut AccessoryRegistry, state: &Map<String, Value>) -> Reconciliation {
    let mut report = EnvelopeReport::for_command(Command::State);
    let mut events = Vec::new();

    for (key, value) in state {
        let unique_id = DeviceIdentity::unique_id_of_key(key);
        let Some(accessory) = registry.lookup_mut(unique_id) else {
            tracing::debug!(device = %key, "Update for unknown device");
            report.ignored += 1;
            continue;
        };

        let patch = match DevicePayload::from_value(value)
            .and_then(|payload| StatePatch::from_wire(payload.state.as_ref(), payload.battery.as_ref()))
        {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(device = %key, error = %e, "Dropping malformed state entry");
                report.skipped += 1;
                continue;
            }
        };

        let (driver, record) = accessory.parts_mut();
        if let Err(e) = record.apply_patch(&patch) {
            tracing::warn!(device = %key, error = %e, "State does not fit device type");
            report.skipped += 1;
            continue;
        }
        report.updated += 1;

        match driver.apply_remote_update(record, &patch) {
            Ok(values) if !values.is_empty() => {
                events.push(AccessoryEvent::updated(record.identity().clone(), values));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(device = %key, error = %e, "Cannot derive characteristics");
            }
        }
    }
    Reconciliation { report, events }
}

fn remove_each(registry: &mut AccessoryRegistry, keys: &[Value]) -> Reconciliation {
    let mut report = EnvelopeReport::for_command(Command::DeleteDevice);
    let mut events = Vec::new();

    for key in keys {
        let Some(key) = key.as_str() else {
            tracing::warn!(key = %key, "Dropping non-string device key");
            report.skipped += 1;
            continue;
        };
        match registry.remove(DeviceIdentity::unique_id_of_key(key)) {
            Some(accessory) => {
                tracing::info!(device = %accessory.record().identity(), "Removing accessory");
                report.removed += 1;
                events.push(AccessoryEvent::unregistered(accessory.into_record().identity().clone()));
            }
            None => {
                tracing::debug!(device = %key, "Delete for unknown device");
                report.ignored += 1;
            }
        }
    }
    Reconciliation { report, events }
}
