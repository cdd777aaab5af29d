// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock abstraction.
//!
//! Everything time-dependent (entry timestamps, descriptor ages, log file
//! rollover) reads the time through a [`Clock`] so tests can drive it.

use std::sync::Arc;

use parking_lot::Mutex;

/// Source of wall-clock time at one-second resolution.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<i64>>,
}

impl FakeClock {
    pub fn new(epoch_secs: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(epoch_secs)),
        }
    }

    pub fn set(&self, epoch_secs: i64) {
        *self.now.lock() = epoch_secs;
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock() += secs;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        // 2026-01-30T08:14:09Z
        Self::new(1_769_760_849)
    }
}

impl Clock for FakeClock {
    fn epoch_secs(&self) -> i64 {
        *self.now.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
