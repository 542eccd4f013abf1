// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch channel addressing for multi-gang devices.

use std::fmt;

use crate::codec::WORD_BITS;
use crate::error::ValueError;

/// Addresses one channel of a switch-family device, or all of them.
///
/// On the wire an outbound switch update names its target with a selector
/// byte: the channel's bit index, or `255` for the master switch.
///
/// # Examples
///
/// ```
/// use mhub_bridge::types::SwitchChannel;
///
/// let second = SwitchChannel::index(1).unwrap();
/// assert_eq!(second.selector(), 1);
/// assert_eq!(SwitchChannel::Master.selector(), 255);
///
/// // Only eight channels fit in a state word
/// assert!(SwitchChannel::index(8).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchChannel {
    /// A single channel, by bit index (0-7).
    Index(u8),
    /// The synthetic master channel over all physical channels.
    Master,
}

impl SwitchChannel {
    /// Selector byte used for the master switch.
    pub const MASTER_SELECTOR: u8 = 255;

    /// Creates a single-channel address.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `index` is not a valid bit index.
    pub fn index(index: u8) -> Result<Self, ValueError> {
        // WORD_BITS is 8
        #[allow(clippy::cast_possible_truncation)]
        let max = (WORD_BITS - 1) as u8;
        if index > max {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: u16::from(max),
                actual: u16::from(index),
            });
        }
        Ok(Self::Index(index))
    }

    /// Returns the selector byte for outbound updates.
    #[must_use]
    pub const fn selector(&self) -> u8 {
        match self {
            Self::Index(i) => *i,
            Self::Master => Self::MASTER_SELECTOR,
        }
    }

    /// Returns `true` for the master channel.
    #[must_use]
    pub const fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }
}

impl fmt::Display for SwitchChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "switch {}", i + 1),
            Self::Master => f.write_str("master switch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_indices() {
        for i in 0..8 {
            assert_eq!(SwitchChannel::index(i).unwrap().selector(), i);
        }
    }

    #[test]
    fn invalid_index() {
        assert!(matches!(
            SwitchChannel::index(8),
            Err(ValueError::OutOfRange { actual: 8, .. })
        ));
    }

    #[test]
    fn master_selector() {
        assert_eq!(SwitchChannel::Master.selector(), 255);
        assert!(SwitchChannel::Master.is_master());
        assert!(!SwitchChannel::Index(0).is_master());
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(SwitchChannel::Index(0).to_string(), "switch 1");
        assert_eq!(SwitchChannel::Master.to_string(), "master switch");
    }
}
