// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory MVCC storage implementation.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::time::Timestamp;

use super::{
    Key, KeyValue, MvccEntry, MvccStore, StorageError, Value, Versioned, MAX_KEY_SIZE,
    MAX_VALUE_SIZE,
};

type Versions = BTreeMap<Timestamp, Option<Value>>;

/// In-memory MVCC storage.
///
/// Keys are kept in byte order; each key maps to its versions ordered by
/// timestamp. A single `RwLock` over the whole map makes batch writes atomic
/// with respect to concurrent readers.
#[derive(Debug, Default)]
pub struct MemMvccStore {
    data: RwLock<BTreeMap<Key, Versions>>,
}

impl MemMvccStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys with at least one version.
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Validates key size.
    fn validate_key(key: &Key) -> Result<(), StorageError> {
        if key.len() > MAX_KEY_SIZE {
            return Err(StorageError::KeyTooLarge {
                size: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        Ok(())
    }

    /// Validates value size.
    fn validate_value(value: &Value) -> Result<(), StorageError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(StorageError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(())
    }

    /// Returns the newest version at or below `ts`, tombstones included.
    #[inline]
    fn visible<'a>(versions: &'a Versions, ts: &Timestamp) -> Option<(Timestamp, &'a Option<Value>)> {
        versions
            .range(..=*ts)
            .next_back()
            .map(|(version_ts, value)| (*version_ts, value))
    }
}

impl MvccStore for MemMvccStore {
    fn get(&self, key: &Key, ts: &Timestamp) -> Result<Option<Versioned>, StorageError> {
        Self::validate_key(key)?;

        let data = self.data.read();
        let Some(versions) = data.get(key) else {
            return Ok(None);
        };

        Ok(match Self::visible(versions, ts) {
            Some((timestamp, Some(value))) => Some(Versioned {
                value: value.clone(),
                timestamp,
            }),
            // Tombstone or nothing old enough.
            _ => None,
        })
    }

    fn scan(
        &self,
        start: &Key,
        end: &Key,
        ts: &Timestamp,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError> {
        Self::validate_key(start)?;
        Self::validate_key(end)?;

        let mut results = Vec::new();
        if start >= end {
            return Ok(results);
        }

        let data = self.data.read();
        let range = data.range::<Key, _>((Bound::Included(start), Bound::Excluded(end)));

        for (key, versions) in range {
            if limit > 0 && results.len() >= limit {
                break;
            }
            if let Some((timestamp, Some(value))) = Self::visible(versions, ts) {
                results.push(KeyValue {
                    key: key.clone(),
                    value: value.clone(),
                    timestamp,
                });
            }
        }

        Ok(results)
    }

    fn latest_timestamp(&self, key: &Key) -> Result<Option<Timestamp>, StorageError> {
        Self::validate_key(key)?;

        let data = self.data.read();
        Ok(data
            .get(key)
            .and_then(|versions| versions.keys().next_back().copied()))
    }

    fn batch_write(&self, entries: Vec<MvccEntry>) -> Result<(), StorageError> {
        // Validate everything before touching the map so a bad entry applies nothing.
        for entry in &entries {
            Self::validate_key(&entry.key)?;
            if let Some(ref value) = entry.value {
                Self::validate_value(value)?;
            }
        }

        let mut data = self.data.write();
        for entry in entries {
            data.entry(entry.key)
                .or_default()
                .insert(entry.timestamp, entry.value);
        }

        Ok(())
    }
}
