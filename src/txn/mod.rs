// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Client-side transactions with priority-based conflict handling.
//!
//! # Key Concepts
//!
//! ## Coordinator
//!
//! A [`TxnCoordinator`] wraps a key-value service and makes every request
//! sent through it part of one transaction. The transaction record is created
//! lazily, anchored at the key of the first operation.
//!
//! ## Conflicts
//!
//! - A write intent the service already cleared is retried immediately.
//! - A write intent still held by another transaction is retried with
//!   exponential backoff, after raising our priority to just below the
//!   holder's.
//! - A retry error moves the transaction to the next epoch at the pushed
//!   timestamp, and an aborted error replaces the record with a new one whose
//!   priority is at least the aborter's. Both are returned so the body reruns.
//!
//! ## Driver
//!
//! [`Db::run_transaction`](crate::kv::Db::run_transaction) reruns a body on
//! restart errors, aborts on any other error and commits on success.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rangekv::kv::{Db, KvError, LocalKv};
//! use rangekv::storage::MemMvccStore;
//! use rangekv::time::HlcClock;
//! use rangekv::txn::TxnConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), KvError> {
//! let clock = Arc::new(HlcClock::default());
//! let kv = LocalKv::new(Arc::new(MemMvccStore::new()), clock.clone())?;
//! let db = Db::new(Arc::new(kv), clock);
//!
//! let total = db
//!     .run_transaction(TxnConfig::default(), |txn| async move {
//!         txn.increment("apples", 3).await?;
//!         txn.increment("apples", 4).await
//!     })
//!     .await?;
//! assert_eq!(total, 7);
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod driver;
mod in_flight;
mod retry;
mod transaction;

pub use config::{RetryOptions, TxnConfig};
pub use coordinator::TxnCoordinator;
pub use driver::Txn;
pub use transaction::{make_priority, IsolationLevel, Transaction, TxnId, TxnStatus};
