// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Ordered batches of writes applied as one atomic unit.

use super::{Key, Value};

/// One write in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Key, value: Value },
    Delete { key: Key },
}

impl BatchOp {
    /// Returns the key this operation writes.
    #[inline]
    pub fn key(&self) -> &Key {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// A list of puts and deletes.
///
/// Operations apply in insertion order, so a delete followed by a put of the
/// same key leaves the put in place. Whoever executes the batch is
/// responsible for all-or-nothing application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put.
    pub fn put(&mut self, key: impl Into<Key>, value: Value) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value,
        });
        self
    }

    /// Appends a delete.
    pub fn delete(&mut self, key: impl Into<Key>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Appends every operation from `ops`.
    pub fn extend(&mut self, ops: impl IntoIterator<Item = BatchOp>) {
        self.ops.extend(ops);
    }

    /// Returns the queued operations in order.
    #[inline]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    #[inline]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
