// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid logical clock time service.
//!
//! Every request issued by the transaction layer carries a [`Timestamp`]
//! obtained from a [`Clock`]. The clock combines physical time with a logical
//! counter and absorbs timestamps observed in replies, so timestamps handed out
//! by one node never run backwards relative to anything that node has seen.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use rangekv::time::{Clock, HlcClock};
//!
//! let clock = HlcClock::new(Duration::from_millis(250));
//! let a = clock.now();
//! let b = clock.now();
//! assert!(b > a);
//! ```

mod hlc;
mod timestamp;

pub use hlc::{HlcClock, ManualClock, PhysicalClock, SystemClock};
pub use timestamp::Timestamp;

use std::time::Duration;

/// The clock abstraction consumed by the transaction layer.
pub trait Clock: Send + Sync {
    /// Returns a timestamp greater than every timestamp previously returned or observed.
    fn now(&self) -> Timestamp;

    /// Folds a timestamp observed from another node into the clock.
    ///
    /// Returns the new local reading, which is strictly greater than `remote`.
    fn update(&self, remote: Timestamp) -> Timestamp;

    /// Returns the maximum assumed offset between any two clocks in the cluster.
    fn max_offset(&self) -> Duration;
}
