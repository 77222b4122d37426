// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid logical clock timestamp.

use std::time::Duration;

/// A hybrid logical clock reading: physical wall time plus a logical counter.
///
/// Timestamps order first by wall time, then by the logical component, so two
/// events sharing a wall-clock reading can still be totally ordered. Field order
/// matters for the derived `Ord`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    wall_time: u64,
    logical: u32,
}

impl Timestamp {
    /// The zero timestamp, before every real reading.
    pub const ZERO: Timestamp = Timestamp {
        wall_time: 0,
        logical: 0,
    };

    /// The largest representable timestamp.
    pub const MAX: Timestamp = Timestamp {
        wall_time: u64::MAX,
        logical: u32::MAX,
    };

    /// Creates a timestamp from wall time (nanoseconds since Unix epoch) and a logical tick.
    #[inline]
    pub fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    /// Creates a timestamp with a zero logical component.
    #[inline]
    pub fn from_nanos(wall_time: u64) -> Self {
        Self::new(wall_time, 0)
    }

    /// Returns the wall time in nanoseconds since the Unix epoch.
    #[inline]
    pub fn wall_time(&self) -> u64 {
        self.wall_time
    }

    /// Returns the logical component.
    #[inline]
    pub fn logical(&self) -> u32 {
        self.logical
    }

    /// Returns the smallest timestamp strictly greater than this one.
    #[inline]
    pub fn next(&self) -> Timestamp {
        if self.logical == u32::MAX {
            Timestamp::new(self.wall_time.saturating_add(1), 0)
        } else {
            Timestamp::new(self.wall_time, self.logical + 1)
        }
    }

    /// Returns this timestamp shifted forward by `offset` of wall time.
    #[inline]
    pub fn add_duration(&self, offset: Duration) -> Timestamp {
        let nanos = u64::try_from(offset.as_nanos()).unwrap_or(u64::MAX);
        Timestamp::new(self.wall_time.saturating_add(nanos), self.logical)
    }

    /// Ratchets this timestamp up to `other` if `other` is later.
    ///
    /// Returns true if the timestamp moved.
    #[inline]
    pub fn forward(&mut self, other: Timestamp) -> bool {
        if *self < other {
            *self = other;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.wall_time, self.logical)
    }
}
