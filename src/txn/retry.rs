// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff state for one operation.

use std::time::Duration;

use super::RetryOptions;

#[derive(Debug)]
pub(crate) struct Backoff<'a> {
    opts: &'a RetryOptions,
    next: Duration,
    attempts: u32,
}

impl<'a> Backoff<'a> {
    pub(crate) fn new(opts: &'a RetryOptions) -> Self {
        Self {
            opts,
            next: opts.initial_backoff,
            attempts: 0,
        }
    }

    /// Starts the schedule over, as if no attempt had failed.
    pub(crate) fn reset(&mut self) {
        self.next = self.opts.initial_backoff;
        self.attempts = 0;
    }

    /// Records a failed attempt and returns how long to wait before the next
    /// one, or `None` once the attempt budget is spent.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if let Some(max) = self.opts.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = self.next.min(self.opts.max_backoff);
        self.next = delay
            .saturating_mul(self.opts.multiplier)
            .min(self.opts.max_backoff);
        Some(delay)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }
}
