// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid Logical Clock (HLC) implementation.
//!
//! HLC combines physical time with a logical counter to provide monotonic timestamps
//! even when physical clocks are imperfect. Timestamps received from other nodes are
//! folded in through [`Clock::update`], so causally later events always carry later
//! timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::{Clock, Timestamp};

/// Source of physical wall time in nanoseconds since the Unix epoch.
pub trait PhysicalClock: Send + Sync {
    /// Returns the current physical time.
    fn now_nanos(&self) -> u64;
}

/// Physical clock backed by the operating system's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now_nanos(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Physical clock that only moves when told to. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock reading `nanos`.
    pub fn new(nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    /// Sets the clock to `nanos`.
    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::Release);
    }

    /// Advances the clock by `nanos`.
    pub fn increment(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl PhysicalClock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }
}

/// Hybrid logical clock.
///
/// Guarantees that each call to `now()` returns a timestamp greater than all previous
/// calls and all timestamps passed to `update()`, even under concurrent access.
pub struct HlcClock {
    physical: Arc<dyn PhysicalClock>,
    state: Mutex<Timestamp>,
    max_offset: Duration,
}

impl HlcClock {
    /// Creates a clock over system time with the given maximum clock offset.
    ///
    /// The `max_offset` parameter represents the assumed maximum clock skew between
    /// nodes in the cluster. Transactions use it to size their uncertainty window.
    pub fn new(max_offset: Duration) -> Self {
        Self::with_physical(Arc::new(SystemClock), max_offset)
    }

    /// Creates a clock over an arbitrary physical source.
    pub fn with_physical(physical: Arc<dyn PhysicalClock>, max_offset: Duration) -> Self {
        Self {
            physical,
            state: Mutex::new(Timestamp::ZERO),
            max_offset,
        }
    }

    /// Creates a clock driven by a [`ManualClock`] along with a handle to move it.
    pub fn manual(start_nanos: u64, max_offset: Duration) -> (Self, Arc<ManualClock>) {
        let manual = Arc::new(ManualClock::new(start_nanos));
        let clock = Self::with_physical(manual.clone(), max_offset);
        (clock, manual)
    }
}

impl Default for HlcClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl std::fmt::Debug for HlcClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlcClock")
            .field("state", &*self.state.lock())
            .field("max_offset", &self.max_offset)
            .finish()
    }
}

impl Clock for HlcClock {
    fn now(&self) -> Timestamp {
        let physical = self.physical.now_nanos();
        let mut state = self.state.lock();

        if physical > state.wall_time() {
            *state = Timestamp::from_nanos(physical);
        } else {
            *state = state.next();
        }
        *state
    }

    fn update(&self, remote: Timestamp) -> Timestamp {
        let physical = self.physical.now_nanos();
        let mut state = self.state.lock();

        if physical > state.wall_time() && physical > remote.wall_time() {
            *state = Timestamp::from_nanos(physical);
        } else if remote > *state {
            *state = remote.next();
        } else {
            *state = state.next();
        }
        *state
    }

    #[inline]
    fn max_offset(&self) -> Duration {
        self.max_offset
    }
}
