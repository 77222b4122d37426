// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction configuration.

use std::time::Duration;

use super::IsolationLevel;

/// Backoff schedule for operations blocked by another transaction's intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: u32,
    /// Total attempts before giving up (None = retry until the conflict clears).
    pub max_attempts: Option<u32>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(150),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
            max_attempts: None,
        }
    }
}

impl RetryOptions {
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Caps the number of attempts; the last conflict error is returned once exhausted.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }
}

/// Per-transaction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnConfig {
    /// User stamped on every request of the transaction.
    pub user: String,
    /// Priority hint. Negative values pin the priority to their absolute value.
    pub user_priority: i32,
    pub isolation: IsolationLevel,
    pub retry: RetryOptions,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            user_priority: 1,
            isolation: IsolationLevel::Serializable,
            retry: RetryOptions::default(),
        }
    }
}

impl TxnConfig {
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_user_priority(mut self, priority: i32) -> Self {
        self.user_priority = priority;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}
