// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! rangekv: client-side transaction coordination and range addressing for a
//! range-partitioned, multi-versioned key-value store.
//!
//! The crate is organised bottom-up:
//!
//! - [`time`]: hybrid logical clock and timestamps;
//! - [`storage`]: keys, MVCC store, range descriptors and the two-level
//!   range addressing index maintained across splits and merges;
//! - [`kv`]: the request/reply protocol, the [`KvService`] trait and a
//!   single-node service;
//! - [`txn`]: the transaction coordinator and the retry-until-done driver.

pub mod kv;
pub mod storage;
pub mod time;
pub mod txn;

pub use kv::{Db, KvError, KvService, LocalKv};
pub use storage::{Key, MemMvccStore, MvccStore, RangeDescriptor, RangeId, StorageError, Value};
pub use time::{Clock, HlcClock, Timestamp};
pub use txn::{IsolationLevel, RetryOptions, Transaction, Txn, TxnConfig, TxnCoordinator, TxnId};
