// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory registry.
//!
//! The registry is the single owner of every [`AccessoryRecord`]. It is a
//! plain map with no locking of its own; the [`Bridge`](crate::Bridge) wraps
//! it in one lock so that inbound envelopes and user writes never interleave.

use std::collections::HashMap;

use crate::driver::{Driver, create_driver};
use crate::state::AccessoryRecord;
use crate::types::CapabilityType;

/// A registered accessory: its record and the driver chosen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessory {
    record: AccessoryRecord,
    driver: Driver,
}

impl Accessory {
    /// Wraps a record with the driver for its capability type.
    #[must_use]
    pub fn new(record: AccessoryRecord) -> Self {
        let driver = create_driver(record.capability_type());
        Self { record, driver }
    }

    /// Returns the record.
    #[must_use]
    pub fn record(&self) -> &AccessoryRecord {
        &self.record
    }

    /// Returns the driver.
    #[must_use]
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Returns the driver and the record, the latter mutably.
    pub fn parts_mut(&mut self) -> (&Driver, &mut AccessoryRecord) {
        (&self.driver, &mut self.record)
    }

    /// Consumes the accessory, returning its record.
    #[must_use]
    pub fn into_record(self) -> AccessoryRecord {
        self.record
    }
}

/// Result of [`AccessoryRegistry::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The unique id was unknown; a new accessory was created.
    Registered,
    /// The unique id was known with the same type; its slot was kept and
    /// the name, state and battery refreshed.
    Restored,
    /// The unique id was known with another type; the old accessory was
    /// removed and a new one created.
    Replaced {
        /// Type of the removed accessory.
        previous: CapabilityType,
    },
}

/// Map of unique id to accessory.
///
/// # Examples
///
/// ```
/// use mhub_bridge::registry::{AccessoryRegistry, UpsertOutcome};
/// use mhub_bridge::state::{AccessoryRecord, DeviceIdentity};
/// use mhub_bridge::types::CapabilityType;
///
/// let mut registry = AccessoryRegistry::new();
/// let record = AccessoryRecord::from_wire(
///     DeviceIdentity::new("abc", CapabilityType::OneGang),
///     "Lamp",
///     None,
///     None,
/// )
/// .unwrap();
///
/// assert_eq!(registry.upsert(record.clone()), UpsertOutcome::Registered);
/// assert_eq!(registry.upsert(record), UpsertOutcome::Restored);
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AccessoryRegistry {
    accessories: HashMap<String, Accessory>,
}

impl AccessoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes the accessory for `record`'s unique id.
    pub fn upsert(&mut self, record: AccessoryRecord) -> UpsertOutcome {
        let id = record.unique_id().to_string();

        if let Some(existing) = self.accessories.get_mut(&id) {
            if existing.record.capability_type() == record.capability_type() {
                existing.record.refresh_from(record);
                return UpsertOutcome::Restored;
            }
            let previous = existing.record.capability_type().clone();
            tracing::info!(
                device = %id,
                previous = %previous,
                current = %record.capability_type(),
                "Device type changed, replacing accessory"
            );
            self.accessories.insert(id, Accessory::new(record));
            return UpsertOutcome::Replaced { previous };
        }

        self.accessories.insert(id, Accessory::new(record));
        UpsertOutcome::Registered
    }

    /// Seeds the registry with records persisted by the host.
    ///
    /// Same rules as [`upsert`](Self::upsert). Returns the number of records
    /// taken.
    pub fn restore(&mut self, records: impl IntoIterator<Item = AccessoryRecord>) -> usize {
        records
            .into_iter()
            .map(|record| {
                tracing::debug!(device = %record.identity(), "Restoring accessory from cache");
                self.upsert(record)
            })
            .count()
    }

    /// Returns the accessory for a unique id.
    #[must_use]
    pub fn lookup(&self, unique_id: &str) -> Option<&Accessory> {
        self.accessories.get(unique_id)
    }

    /// Returns the accessory for a unique id, mutably.
    pub fn lookup_mut(&mut self, unique_id: &str) -> Option<&mut Accessory> {
        self.accessories.get_mut(unique_id)
    }

    /// Removes and returns the accessory for a unique id.
    pub fn remove(&mut self, unique_id: &str) -> Option<Accessory> {
        self.accessories.remove(unique_id)
    }

    /// Removes every accessory, returning them.
    pub fn clear(&mut self) -> Vec<Accessory> {
        self.accessories.drain().map(|(_, accessory)| accessory).collect()
    }

    /// Returns `true` if the unique id is registered.
    #[must_use]
    pub fn contains(&self, unique_id: &str) -> bool {
        self.accessories.contains_key(unique_id)
    }

    /// Returns the number of accessories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accessories.len()
    }

    /// Returns `true` if no accessory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accessories.is_empty()
    }

    /// Returns every unique id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.accessories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Iterates over all accessories in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Accessory> {
        self.accessories.values()
    }
}
