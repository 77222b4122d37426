// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage error types.

use super::{Key, RangeDescriptor};

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("key too large: {size} > {max}")]
    KeyTooLarge { size: usize, max: usize },

    #[error("value too large: {size} > {max}")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage corruption at key {key}: {reason}")]
    Corruption { key: Key, reason: String },

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Errors raised while computing addressing index updates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressingError {
    /// The level-1 range holds the root of the index and may never be split.
    #[error("meta1 addressing records cannot be split: {desc}")]
    Meta1Split { desc: RangeDescriptor },

    #[error("descriptors {left} and {right} do not tile {original}")]
    InvalidSplit {
        original: RangeDescriptor,
        left: RangeDescriptor,
        right: RangeDescriptor,
    },

    #[error("descriptors {left} and {right} do not merge into {merged}")]
    InvalidMerge {
        left: RangeDescriptor,
        right: RangeDescriptor,
        merged: RangeDescriptor,
    },
}
