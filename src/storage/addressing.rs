// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Maintenance of the two-level range addressing index.
//!
//! Every range is addressed by a record keyed on its end key, one level above
//! the range's own keys:
//!
//! - a range ending in user space has a level-2 record `meta2 + end_key`;
//! - a range ending in level-2 space has a level-1 record `meta1 + suffix`;
//! - a range that starts at `KEY_MIN` or inside level-2 space holds the tail of
//!   the level-2 records, so it also owns the `meta1 + KEY_MAX` record.
//!
//! Splits and merges append the record changes to the same [`WriteBatch`] that
//! persists the new descriptors, so the index commits or fails together with
//! them. The functions here are pure: the same descriptors always yield the
//! same operations, and on error the batch is left untouched.

use crate::time::Timestamp;

use super::key::{
    is_meta1_key, is_meta2_key, meta1_key, meta2_key, range_descriptor_key, range_meta_key,
    KEY_MAX, KEY_MIN, META1_PREFIX, META2_PREFIX,
};
use super::{
    AddressingError, BatchOp, Key, MvccStore, RangeDescriptor, StorageError, WriteBatch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaAction {
    Put,
    Delete,
}

/// Appends the addressing records for the very first range of an empty store.
pub fn bootstrap_range_addressing(
    batch: &mut WriteBatch,
    desc: &RangeDescriptor,
) -> Result<(), AddressingError> {
    let mut ops = Vec::new();
    range_addressing(&mut ops, desc, MetaAction::Put)?;
    batch.extend(ops);
    Ok(())
}

/// Appends the addressing updates for splitting `original` into `left` and `right`.
///
/// Only puts are emitted: the right-hand range inherits the original end key
/// and overwrites its record, while the left-hand range gains a record for the
/// new boundary.
pub fn split_range_addressing(
    batch: &mut WriteBatch,
    original: &RangeDescriptor,
    left: &RangeDescriptor,
    right: &RangeDescriptor,
) -> Result<(), AddressingError> {
    let tiles = left.start_key == original.start_key
        && left.end_key == right.start_key
        && right.end_key == original.end_key
        && left.start_key < left.end_key
        && right.start_key < right.end_key;
    if !tiles {
        return Err(AddressingError::InvalidSplit {
            original: original.clone(),
            left: left.clone(),
            right: right.clone(),
        });
    }

    let mut ops = Vec::new();
    range_addressing(&mut ops, left, MetaAction::Put)?;
    range_addressing(&mut ops, right, MetaAction::Put)?;
    batch.extend(ops);
    Ok(())
}

/// Appends the addressing updates for merging `left` and `right` into `merged`.
///
/// The records describing the vanished boundary (the left range's end key) are
/// deleted, then the merged range's records are written.
pub fn merge_range_addressing(
    batch: &mut WriteBatch,
    left: &RangeDescriptor,
    right: &RangeDescriptor,
    merged: &RangeDescriptor,
) -> Result<(), AddressingError> {
    let adjacent = merged.start_key == left.start_key
        && left.end_key == right.start_key
        && right.end_key == merged.end_key;
    if !adjacent {
        return Err(AddressingError::InvalidMerge {
            left: left.clone(),
            right: right.clone(),
            merged: merged.clone(),
        });
    }

    let mut ops = Vec::new();
    range_addressing(&mut ops, left, MetaAction::Delete)?;
    range_addressing(&mut ops, merged, MetaAction::Put)?;
    batch.extend(ops);
    Ok(())
}

fn range_addressing(
    ops: &mut Vec<BatchOp>,
    desc: &RangeDescriptor,
    action: MetaAction,
) -> Result<(), AddressingError> {
    if is_meta1_key(desc.start_key.as_bytes()) || is_meta1_key(desc.end_key.as_bytes()) {
        return Err(AddressingError::Meta1Split { desc: desc.clone() });
    }

    let mut emit = |key: Key| {
        ops.push(match action {
            MetaAction::Put => BatchOp::Put {
                key,
                value: desc.encode(),
            },
            MetaAction::Delete => BatchOp::Delete { key },
        })
    };

    if is_meta2_key(desc.end_key.as_bytes()) {
        emit(range_meta_key(desc.end_key.as_bytes()));
    } else {
        emit(meta2_key(desc.end_key.as_bytes()));
        if desc.start_key.as_bytes() == KEY_MIN || is_meta2_key(desc.start_key.as_bytes()) {
            emit(meta1_key(KEY_MAX));
        }
    }
    Ok(())
}

/// Resolves `key` to the descriptor of the range that owns it.
///
/// Scans the addressing level above `key` for the first record strictly after
/// `range_meta_key(key)`; a range owns every key below its end key, so a key
/// equal to an end key belongs to the next range. Level-1 keys always live in
/// the first range, whose descriptor is read directly.
pub fn lookup_range<S: MvccStore + ?Sized>(
    store: &S,
    key: &[u8],
    ts: &Timestamp,
) -> Result<Option<RangeDescriptor>, StorageError> {
    let meta_key = range_meta_key(key);
    if meta_key.is_empty() {
        return store
            .get(&range_descriptor_key(KEY_MIN), ts)?
            .map(|found| RangeDescriptor::decode(found.value.as_bytes()))
            .transpose();
    }

    let level_end = if is_meta1_key(meta_key.as_bytes()) {
        Key::from(META1_PREFIX).prefix_end()
    } else {
        Key::from(META2_PREFIX).prefix_end()
    };

    let rows = store.scan(&meta_key.next(), &level_end, ts, 1)?;
    rows.first()
        .map(|row| RangeDescriptor::decode(row.value.as_bytes()))
        .transpose()
}
