// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! MVCC types and trait definitions.

use crate::time::Timestamp;

use super::error::StorageError;

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: usize = 8 * 1024; // 8KB

/// Maximum value size in bytes.
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024; // 64MB

/// A key in the ordered key-space.
///
/// Keys compare as raw byte strings, which is the order ranges partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Creates a new key from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the key.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the key begins with `prefix`.
    #[inline]
    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Returns the smallest key strictly greater than this one.
    pub fn next(&self) -> Key {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(&self.0);
        bytes.push(0);
        Key(bytes)
    }

    /// Returns the smallest key greater than every key carrying this key as a prefix.
    ///
    /// Returns the key unchanged if it consists solely of `0xff` bytes.
    pub fn prefix_end(&self) -> Key {
        let mut bytes = self.0.clone();
        while let Some(last) = bytes.pop() {
            if last < 0xff {
                bytes.push(last + 1);
                return Key(bytes);
            }
        }
        self.clone()
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

/// A value in the MVCC store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(pub Vec<u8>);

impl Value {
    /// Creates a new value from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encodes an integer counter value (8 bytes, big-endian).
    #[inline]
    pub fn from_i64(n: i64) -> Self {
        Self(n.to_be_bytes().to_vec())
    }

    /// Decodes an integer counter value written by [`Value::from_i64`].
    pub fn as_i64(&self) -> Result<i64, StorageError> {
        let bytes: [u8; 8] = self.0.as_slice().try_into().map_err(|_| {
            StorageError::InvalidEncoding(format!(
                "integer value must be 8 bytes, got {}",
                self.0.len()
            ))
        })?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Returns the value bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the value.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the value is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A versioned key-value entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvccEntry {
    pub key: Key,
    pub value: Option<Value>, // None = tombstone
    pub timestamp: Timestamp,
}

impl MvccEntry {
    /// Creates a new entry with a value.
    pub fn new(key: Key, value: Value, timestamp: Timestamp) -> Self {
        Self {
            key,
            value: Some(value),
            timestamp,
        }
    }

    /// Creates a tombstone entry (deletion marker).
    pub fn tombstone(key: Key, timestamp: Timestamp) -> Self {
        Self {
            key,
            value: None,
            timestamp,
        }
    }

    /// Returns true if this entry is a tombstone.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// A value together with the timestamp of the version it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Value,
    pub timestamp: Timestamp,
}

/// A key and the value visible for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Key,
    pub value: Value,
    pub timestamp: Timestamp,
}

/// The MVCC storage engine trait.
///
/// Each write creates a new version of a key at a timestamp. A read at
/// timestamp `t` observes the newest version at or below `t`; a tombstone
/// hides everything older.
pub trait MvccStore: Send + Sync {
    /// Reads the newest version of `key` visible at `ts`.
    fn get(&self, key: &Key, ts: &Timestamp) -> Result<Option<Versioned>, StorageError>;

    /// Scans keys in `[start, end)` visible at `ts`, returning at most `limit` rows.
    ///
    /// A `limit` of zero means no limit.
    fn scan(
        &self,
        start: &Key,
        end: &Key,
        ts: &Timestamp,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError>;

    /// Returns the timestamp of the newest version of `key`, tombstones included.
    fn latest_timestamp(&self, key: &Key) -> Result<Option<Timestamp>, StorageError>;

    /// Atomically writes a batch of entries: either all become visible or none do.
    fn batch_write(&self, entries: Vec<MvccEntry>) -> Result<(), StorageError>;
}
