// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Read timestamp cache.
//!
//! Remembers the newest timestamp at which each key or key span was read. A
//! transactional write at or below that timestamp would rewrite history under
//! the reader, so the writer is pushed above it instead. Entries older than
//! the retention window are folded into a low-water mark that applies to
//! every key.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::storage::Key;
use crate::time::Timestamp;
use crate::txn::TxnId;

/// How long individual reads are remembered before folding into the low-water mark.
const RETENTION: Duration = Duration::from_secs(10);

/// Entries are pruned once the cache grows past this many.
const PRUNE_THRESHOLD: usize = 4096;

/// The newest read of a key and, if exactly one transaction read at that
/// timestamp, its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReadEntry {
    pub(crate) timestamp: Timestamp,
    pub(crate) txn: Option<TxnId>,
}

impl ReadEntry {
    fn new(timestamp: Timestamp, txn: Option<&TxnId>) -> Self {
        Self {
            timestamp,
            txn: txn.cloned(),
        }
    }

    fn forward(&mut self, timestamp: Timestamp, txn: Option<&TxnId>) {
        if timestamp > self.timestamp {
            self.timestamp = timestamp;
            self.txn = txn.cloned();
        } else if timestamp == self.timestamp && self.txn.as_ref() != txn {
            self.txn = None;
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TimestampCache {
    low_water: Timestamp,
    points: BTreeMap<Key, ReadEntry>,
    spans: Vec<(Key, Key, ReadEntry)>,
}

impl TimestampCache {
    /// Records a read of `key` at `timestamp`.
    pub(crate) fn record_read(&mut self, key: &Key, timestamp: Timestamp, txn: Option<&TxnId>) {
        self.maybe_prune(timestamp);
        self.points
            .entry(key.clone())
            .and_modify(|entry| entry.forward(timestamp, txn))
            .or_insert_with(|| ReadEntry::new(timestamp, txn));
    }

    /// Records a read of every key in `[start, end)` at `timestamp`.
    pub(crate) fn record_scan(
        &mut self,
        start: &Key,
        end: &Key,
        timestamp: Timestamp,
        txn: Option<&TxnId>,
    ) {
        if start >= end {
            return;
        }
        self.maybe_prune(timestamp);
        self.spans
            .push((start.clone(), end.clone(), ReadEntry::new(timestamp, txn)));
    }

    /// Returns the newest read covering `key`.
    pub(crate) fn max_read(&self, key: &Key) -> ReadEntry {
        let mut max = ReadEntry::new(self.low_water, None);
        if let Some(entry) = self.points.get(key) {
            max.forward(entry.timestamp, entry.txn.as_ref());
        }
        for (start, end, entry) in &self.spans {
            if start <= key && key < end {
                max.forward(entry.timestamp, entry.txn.as_ref());
            }
        }
        max
    }

    /// Returns the read timestamp a write of `key` at `timestamp` by `txn`
    /// must move above, if any.
    ///
    /// A transaction's own read at its write timestamp does not block it.
    pub(crate) fn blocking_read(&self, key: &Key, timestamp: Timestamp, txn: &TxnId) -> Option<Timestamp> {
        let read = self.max_read(key);
        if read.timestamp == Timestamp::ZERO {
            return None;
        }
        let blocked = read.timestamp > timestamp
            || (read.timestamp == timestamp && read.txn.as_ref() != Some(txn));
        blocked.then_some(read.timestamp)
    }

    pub(crate) fn len(&self) -> usize {
        self.points.len() + self.spans.len()
    }

    fn maybe_prune(&mut self, now: Timestamp) {
        if self.len() < PRUNE_THRESHOLD {
            return;
        }
        let horizon = u64::try_from(RETENTION.as_nanos()).unwrap_or(u64::MAX);
        self.prune(Timestamp::from_nanos(now.wall_time().saturating_sub(horizon)));
    }

    /// Folds every entry older than `cutoff` into the low-water mark.
    fn prune(&mut self, cutoff: Timestamp) {
        let mut low_water = self.low_water;
        self.points.retain(|_, entry| {
            if entry.timestamp < cutoff {
                low_water.forward(entry.timestamp);
                return false;
            }
            true
        });
        self.spans.retain(|(_, _, entry)| {
            if entry.timestamp < cutoff {
                low_water.forward(entry.timestamp);
                return false;
            }
            true
        });
        self.low_water = low_water;
    }
}
