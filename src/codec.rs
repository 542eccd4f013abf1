// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bit codec for multi-channel state words.
//!
//! Multi-gang devices report every channel in one byte: bit `i` is channel
//! `i`. The codec unpacks that byte into eight booleans in ascending bit
//! order (index 0 is the least-significant bit) and packs them back.
//!
//! # Examples
//!
//! ```
//! use mhub_bridge::codec::{decode_bits, encode_bits};
//!
//! // 0b101: channels 0 and 2 on, channel 1 off
//! let bits = decode_bits(5);
//! assert!(bits[0]);
//! assert!(!bits[1]);
//! assert!(bits[2]);
//! assert_eq!(encode_bits(&bits), 5);
//! ```

use crate::error::ValueError;

/// Number of channels carried by one state word.
pub const WORD_BITS: usize = 8;

/// Unpacked state word, index 0 = least-significant bit.
pub type Bits = [bool; WORD_BITS];

/// Decodes a state word into its eight bits, least-significant first.
#[must_use]
pub fn decode_bits(word: u8) -> Bits {
    let mut bits = [false; WORD_BITS];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = word & (1 << i) != 0;
    }
    bits
}

/// Packs eight bits, least-significant first, back into a state word.
#[must_use]
pub fn encode_bits(bits: &Bits) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0u8, |word, (i, &bit)| if bit { word | (1 << i) } else { word })
}

/// Returns `word` with bit `index` set to `on`.
///
/// Indices past the word are ignored.
#[must_use]
pub fn with_bit(word: u8, index: usize, on: bool) -> u8 {
    let mut bits = decode_bits(word);
    if let Some(bit) = bits.get_mut(index) {
        *bit = on;
    }
    encode_bits(&bits)
}

/// Returns `word` with bits `[0, count)` all set to `on`.
#[must_use]
pub fn with_bits(word: u8, count: usize, on: bool) -> u8 {
    let mut bits = decode_bits(word);
    for bit in bits.iter_mut().take(count) {
        *bit = on;
    }
    encode_bits(&bits)
}

/// Returns `true` iff bits `[0, count)` of `word` are all set.
#[must_use]
pub fn all_set(word: u8, count: usize) -> bool {
    decode_bits(word).iter().take(count).all(|&bit| bit)
}

/// Formats a state word as eight binary digits, most-significant first.
///
/// ```
/// use mhub_bridge::codec::to_binary_text;
///
/// assert_eq!(to_binary_text(5), "00000101");
/// ```
#[must_use]
pub fn to_binary_text(word: u8) -> String {
    format!("{word:08b}")
}

/// Parses eight binary digits, most-significant first, into a state word.
///
/// # Errors
///
/// Returns `ValueError::InvalidBinaryText` unless the input is exactly eight
/// `0`/`1` characters.
pub fn from_binary_text(text: &str) -> Result<u8, ValueError> {
    if text.len() != WORD_BITS || !text.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(ValueError::InvalidBinaryText(text.to_string()));
    }
    u8::from_str_radix(text, 2).map_err(|_| ValueError::InvalidBinaryText(text.to_string()))
}
