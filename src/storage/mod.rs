// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage-facing types: keys, MVCC versions, range descriptors and the
//! range addressing index.
//!
//! # Key Concepts
//!
//! The key-space is split into ranges, each described by a
//! [`RangeDescriptor`]. To find the range that owns a key, clients scan a
//! two-level addressing index stored in the key-space itself (see
//! [`key`] for the layout). Splits and merges keep that index exact by
//! appending updates from [`split_range_addressing`] and
//! [`merge_range_addressing`] to the same atomic [`WriteBatch`] that
//! rewrites the descriptors.
//!
//! # Example
//!
//! ```
//! use rangekv::storage::{
//!     bootstrap_range_addressing, split_range_addressing, RangeDescriptor, RangeId,
//!     WriteBatch, KEY_MAX, KEY_MIN,
//! };
//!
//! let whole = RangeDescriptor::new(RangeId(1), KEY_MIN, KEY_MAX);
//! let left = RangeDescriptor::new(RangeId(1), KEY_MIN, "m");
//! let right = RangeDescriptor::new(RangeId(2), "m", KEY_MAX);
//!
//! let mut batch = WriteBatch::new();
//! bootstrap_range_addressing(&mut batch, &whole).unwrap();
//! split_range_addressing(&mut batch, &whole, &left, &right).unwrap();
//! assert_eq!(batch.len(), 5);
//! ```

mod addressing;
mod batch;
mod descriptor;
mod error;
pub mod key;
mod memory;
mod mvcc;

pub use addressing::{
    bootstrap_range_addressing, lookup_range, merge_range_addressing, split_range_addressing,
};
pub use batch::{BatchOp, WriteBatch};
pub use descriptor::{RangeDescriptor, RangeId};
pub use error::{AddressingError, StorageError};
pub use key::{KEY_MAX, KEY_MIN};
pub use memory::MemMvccStore;
pub use mvcc::{
    Key, KeyValue, MvccEntry, MvccStore, Value, Versioned, MAX_KEY_SIZE, MAX_VALUE_SIZE,
};
