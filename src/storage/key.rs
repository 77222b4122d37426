// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Reserved key prefixes and addressing key construction.
//!
//! The key-space is laid out so that system data sorts before user data:
//!
//! ```text
//! ""                      KEY_MIN
//! \x00\x00\x00...         range-local keys (range descriptors)
//! \x00\x00meta1<key>      level-1 addressing records
//! \x00\x00meta2<key>      level-2 addressing records
//! \x00\x00meta\xff        META_MAX
//! ...                     user keys
//! \xff\xff                KEY_MAX
//! ```
//!
//! These bytes are persisted and must not change.

use super::Key;

/// The smallest key; the first range always starts here.
pub const KEY_MIN: &[u8] = b"";

/// The largest key; the last range always ends here.
pub const KEY_MAX: &[u8] = b"\xff\xff";

/// Prefix for keys local to a range rather than addressable by the index.
pub const LOCAL_PREFIX: &[u8] = b"\x00\x00\x00";

/// Prefix under which range descriptors are persisted, keyed by start key.
pub const RANGE_DESCRIPTOR_PREFIX: &[u8] = b"\x00\x00\x00rdsc";

/// Common prefix of both addressing levels.
pub const META_PREFIX: &[u8] = b"\x00\x00meta";

/// Prefix of level-1 addressing records.
pub const META1_PREFIX: &[u8] = b"\x00\x00meta1";

/// Prefix of level-2 addressing records.
pub const META2_PREFIX: &[u8] = b"\x00\x00meta2";

/// Upper bound of the addressing key-space.
pub const META_MAX: &[u8] = b"\x00\x00meta\xff";

/// Concatenates a prefix and a key.
#[inline]
pub fn make_key(prefix: &[u8], key: &[u8]) -> Key {
    let mut bytes = Vec::with_capacity(prefix.len() + key.len());
    bytes.extend_from_slice(prefix);
    bytes.extend_from_slice(key);
    Key::new(bytes)
}

/// Returns the level-1 addressing key for `key`.
#[inline]
pub fn meta1_key(key: &[u8]) -> Key {
    make_key(META1_PREFIX, key)
}

/// Returns the level-2 addressing key for `key`.
#[inline]
pub fn meta2_key(key: &[u8]) -> Key {
    make_key(META2_PREFIX, key)
}

/// Returns the key under which the descriptor of the range starting at `start_key` lives.
#[inline]
pub fn range_descriptor_key(start_key: &[u8]) -> Key {
    make_key(RANGE_DESCRIPTOR_PREFIX, start_key)
}

/// Returns the addressing key one level up from `key`.
///
/// - the empty key and level-1 keys map to `KEY_MIN` (the level-1 range is the root);
/// - a level-2 key maps to the level-1 key with the same suffix;
/// - any other key maps to its level-2 key.
pub fn range_meta_key(key: &[u8]) -> Key {
    if key.is_empty() || key.starts_with(META1_PREFIX) {
        return Key::from(KEY_MIN);
    }
    if let Some(suffix) = key.strip_prefix(META2_PREFIX) {
        return meta1_key(suffix);
    }
    meta2_key(key)
}

/// Returns true if `key` is a level-1 addressing key.
#[inline]
pub fn is_meta1_key(key: &[u8]) -> bool {
    key.starts_with(META1_PREFIX)
}

/// Returns true if `key` is a level-2 addressing key.
#[inline]
pub fn is_meta2_key(key: &[u8]) -> bool {
    key.starts_with(META2_PREFIX)
}
