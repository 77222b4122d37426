// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key-value service error types.

use crate::storage::{AddressingError, Key, StorageError};
use crate::txn::Transaction;

use super::Method;

/// Errors returned by a key-value service or a transactional session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    /// The key holds a provisional write from another transaction.
    ///
    /// `resolved` means the service already cleared the blocking intent (for
    /// example by aborting a lower-priority holder) and the operation can be
    /// retried immediately.
    #[error("conflicting write intent on key {key} from {txn} (resolved={resolved})")]
    WriteIntent {
        key: Key,
        txn: Transaction,
        resolved: bool,
    },

    /// The transaction must restart at a later timestamp; `txn` carries the pushed record.
    #[error("{txn} must retry: {reason}")]
    TransactionRetry { txn: Transaction, reason: String },

    /// The transaction was aborted; `txn` carries the priority of the aborter.
    #[error("{txn} aborted")]
    TransactionAborted { txn: Transaction },

    #[error("transaction has already been committed or aborted")]
    TransactionClosed,

    #[error("method {method} cannot be sent through a transactional session")]
    NonTransactional { method: Method },

    #[error("no range found for key {key}")]
    RangeNotFound { key: Key },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected reply to {method}: {got}")]
    UnexpectedResponse { method: Method, got: String },

    #[error("addressing error: {0}")]
    Addressing(#[from] AddressingError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A transaction body failed and the abort that followed failed too.
    #[error("{cause}; abort also failed: {abort}")]
    AbortFailed {
        cause: Box<KvError>,
        abort: Box<KvError>,
    },
}

/// How the transactional session reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict<'a> {
    /// Blocked by another transaction's intent with the given priority.
    WriteIntent { resolved: bool, priority: i32 },
    /// Ordering conflict; the service returned the pushed transaction.
    Ordering { txn: &'a Transaction },
    /// The transaction was aborted by a pusher with the given priority.
    Aborted { priority: i32 },
    /// Anything else; passed through untouched.
    Other,
}

impl KvError {
    /// Classifies the error for the session's retry logic.
    pub fn conflict(&self) -> Conflict<'_> {
        match self {
            KvError::WriteIntent { txn, resolved, .. } => Conflict::WriteIntent {
                resolved: *resolved,
                priority: txn.priority,
            },
            KvError::TransactionRetry { txn, .. } => Conflict::Ordering { txn },
            KvError::TransactionAborted { txn } => Conflict::Aborted {
                priority: txn.priority,
            },
            _ => Conflict::Other,
        }
    }

    /// Returns true if the whole transaction body should be re-run.
    pub fn is_txn_restart(&self) -> bool {
        matches!(
            self,
            KvError::TransactionRetry { .. } | KvError::TransactionAborted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::HlcClock;
    use crate::txn::IsolationLevel;

    fn txn(priority: i32) -> Transaction {
        Transaction::new(
            Key::from("k"),
            -priority,
            IsolationLevel::default(),
            &HlcClock::default(),
        )
    }

    #[test]
    fn test_conflict_classification() {
        let err = KvError::WriteIntent {
            key: Key::from("k"),
            txn: txn(9),
            resolved: false,
        };
        assert_eq!(
            err.conflict(),
            Conflict::WriteIntent {
                resolved: false,
                priority: 9
            }
        );
        assert!(!err.is_txn_restart());

        let err = KvError::TransactionAborted { txn: txn(4) };
        assert_eq!(err.conflict(), Conflict::Aborted { priority: 4 });
        assert!(err.is_txn_restart());

        let err = KvError::TransactionRetry {
            txn: txn(1),
            reason: "write too old".into(),
        };
        assert!(matches!(err.conflict(), Conflict::Ordering { .. }));
        assert!(err.is_txn_restart());

        assert_eq!(KvError::TransactionClosed.conflict(), Conflict::Other);
    }

    #[test]
    fn test_abort_failed_message_names_both() {
        let err = KvError::AbortFailed {
            cause: Box::new(KvError::InvalidRequest("boom".into())),
            abort: Box::new(KvError::TransactionClosed),
        };
        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("already been committed"));
    }

    #[test]
    fn test_from_storage_error() {
        let err: KvError = StorageError::InvalidEncoding("bad".into()).into();
        assert!(matches!(err, KvError::Storage(_)));
    }
}
