// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events for the host framework.
//!
//! The bridge never calls into the host directly. It publishes
//! [`AccessoryEvent`]s on an [`EventBus`] (a tokio broadcast channel) and the
//! host subscribes to create accessories, drop them and push characteristic
//! values.

mod accessory_event;
mod event_bus;

pub use accessory_event::AccessoryEvent;
pub use event_bus::EventBus;
