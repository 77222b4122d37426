// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction record types.

use rand::Rng;
use uuid::Uuid;

use crate::storage::Key;
use crate::time::{Clock, Timestamp};

/// Unique transaction identifier: the anchor key followed by 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxnId(pub Vec<u8>);

impl TxnId {
    /// Creates a fresh identifier anchored at `key`.
    pub fn new(key: &Key) -> Self {
        let mut bytes = Vec::with_capacity(key.len() + 16);
        bytes.extend_from_slice(key.as_bytes());
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        Self(bytes)
    }

    /// Returns the random suffix as a UUID, if the identifier carries one.
    pub fn uuid(&self) -> Option<Uuid> {
        let start = self.0.len().checked_sub(16)?;
        Uuid::from_slice(&self.0[start..]).ok()
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.uuid() {
            Some(uuid) => write!(f, "{}", &uuid.simple().to_string()[..8]),
            None => write!(f, "{}", self.0.escape_ascii()),
        }
    }
}

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Serializable - full isolation, the default.
    #[default]
    Serializable,
    /// Snapshot isolation - reads see a consistent snapshot, write-write conflicts detected.
    Snapshot,
}

/// Transaction status as recorded by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnStatus {
    #[default]
    Pending,
    Committed,
    Aborted,
}

/// The state tracked for one logical transaction.
///
/// The record travels with every request of the transaction and comes back
/// inside conflict errors, so its fields are public wire state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Unique identifier for this transaction.
    pub id: TxnId,
    /// Key of the first operation; anchors the transaction's identity.
    pub key: Key,
    /// Restart counter, bumped on each ordering-conflict retry.
    pub epoch: u32,
    /// Conflict arbitration priority. Only ever upgraded.
    pub priority: i32,
    pub isolation: IsolationLevel,
    pub status: TxnStatus,
    /// Provisional commit timestamp. Never moves backwards.
    pub timestamp: Timestamp,
    /// Timestamp at which the transaction started.
    pub orig_timestamp: Timestamp,
    /// Upper bound of the uncertainty window: `orig_timestamp + max_offset`.
    pub max_timestamp: Timestamp,
}

impl Transaction {
    /// Creates a new pending transaction anchored at `key`.
    pub fn new(key: Key, user_priority: i32, isolation: IsolationLevel, clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            id: TxnId::new(&key),
            key,
            epoch: 0,
            priority: make_priority(user_priority),
            isolation,
            status: TxnStatus::Pending,
            timestamp: now,
            orig_timestamp: now,
            max_timestamp: now.add_duration(clock.max_offset()),
        }
    }

    /// Raises the priority to at least `min`. Never lowers it.
    #[inline]
    pub fn upgrade_priority(&mut self, min: i32) {
        if min > self.priority {
            self.priority = min;
        }
    }

    /// Returns true if the transaction is still pending.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == TxnStatus::Pending
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "txn {} (key={} epoch={} pri={} ts={})",
            self.id, self.key, self.epoch, self.priority, self.timestamp
        )
    }
}

/// Converts a user priority into a transaction priority.
///
/// A negative user priority pins the priority to its absolute value, which
/// makes conflict outcomes deterministic. Otherwise a random priority is drawn
/// from `(i32::MAX - i32::MAX / user_priority, i32::MAX]`, so a user priority of
/// 100 is far more likely to win a conflict than a user priority of 1.
pub fn make_priority(user_priority: i32) -> i32 {
    if user_priority < 0 {
        return user_priority.saturating_neg();
    }
    let user_priority = user_priority.max(1);
    let span = (i32::MAX / user_priority).max(1);
    i32::MAX - rand::thread_rng().gen_range(0..span)
}
