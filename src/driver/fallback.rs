// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for devices of an unknown type.

use crate::state::AccessoryRecord;

/// Keeps unknown devices registered without exposing any service.
///
/// Every call logs a warning; none fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fallback;

impl Fallback {
    pub(super) fn initialize(record: &AccessoryRecord) {
        tracing::warn!(
            device = %record.identity(),
            capability = %record.capability_type(),
            "Initializing fallback device for unsupported type"
        );
    }

    pub(super) fn apply_remote_update(record: &AccessoryRecord) {
        tracing::warn!(
            device = %record.identity(),
            capability = %record.capability_type(),
            "Ignoring update for unsupported device type"
        );
    }
}
