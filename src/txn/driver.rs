// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Retry-until-done transaction driver.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::kv::{Db, KvError};
use crate::time::Timestamp;

use super::{Transaction, TxnConfig, TxnCoordinator};

/// The handle a transaction body works through.
///
/// Dereferences to a [`Db`] whose requests travel through the transaction's
/// [`TxnCoordinator`], so `txn.get(..)` and `txn.put(..)` read and write
/// inside the transaction. Administrative methods are rejected.
#[derive(Clone, Debug)]
pub struct Txn {
    db: Db,
    coordinator: Arc<TxnCoordinator>,
}

impl Txn {
    /// Returns a snapshot of the current transaction record.
    pub fn transaction(&self) -> Option<Transaction> {
        self.coordinator.transaction()
    }

    /// Returns the newest timestamp the transaction has observed.
    pub fn timestamp(&self) -> Timestamp {
        self.coordinator.timestamp()
    }
}

impl Deref for Txn {
    type Target = Db;

    fn deref(&self) -> &Db {
        &self.db
    }
}

impl Db {
    /// Runs `retryable` inside a transaction until it finishes without a
    /// restart error, then commits.
    ///
    /// The body is re-run from the top whenever it returns a
    /// [`TransactionRetry`](KvError::TransactionRetry) or
    /// [`TransactionAborted`](KvError::TransactionAborted) error; by then the
    /// session has already moved to a new epoch or a new record. Any other
    /// error aborts the transaction and is returned. If the abort fails as
    /// well, both errors come back in [`KvError::AbortFailed`].
    ///
    /// The body may run several times and should have no side effects beyond
    /// the operations it sends through the handle.
    #[instrument(skip(self, config, retryable), fields(user = %config.user))]
    pub async fn run_transaction<T, F, Fut>(
        &self,
        config: TxnConfig,
        mut retryable: F,
    ) -> Result<T, KvError>
    where
        F: FnMut(Txn) -> Fut,
        Fut: Future<Output = Result<T, KvError>>,
    {
        let user = config.user.clone();
        let coordinator = Arc::new(TxnCoordinator::new(
            self.service().clone(),
            self.clock().clone(),
            config,
        ));
        let txn = Txn {
            db: Db::new(coordinator.clone(), self.clock().clone()).with_user(user),
            coordinator,
        };

        let mut attempt: u32 = 0;
        let result = loop {
            attempt += 1;
            match retryable(txn.clone()).await {
                Err(err) if err.is_txn_restart() => {
                    debug!(attempt, error = %err, "Restarting transaction body");
                }
                result => break result,
            }
        };

        match result {
            Ok(value) => {
                txn.coordinator.commit().await?;
                debug!(attempts = attempt, "Transaction committed");
                Ok(value)
            }
            Err(cause) => match txn.coordinator.abort().await {
                Ok(()) => Err(cause),
                Err(abort) => {
                    warn!(error = %cause, abort_error = %abort, "Abort after failed transaction body also failed");
                    Err(KvError::AbortFailed {
                        cause: Box::new(cause),
                        abort: Box::new(abort),
                    })
                }
            },
        }
    }
}
