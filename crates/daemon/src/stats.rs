// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide counters, reported once on exit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Counters shared by the controller and its workers.
#[derive(Debug, Default)]
pub struct Stats {
    pub datagrams: AtomicU64,
    pub oversized: AtomicU64,
    pub malformed: AtomicU64,
    pub queued: AtomicU64,
    pub filtered: AtomicU64,
    pub batches: AtomicU64,
    pub written: AtomicU64,
    pub writer_respawns: AtomicU64,
    pub spawn_fallbacks: AtomicU64,
}

impl Stats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            datagrams: get(&self.datagrams),
            oversized: get(&self.oversized),
            malformed: get(&self.malformed),
            queued: get(&self.queued),
            filtered: get(&self.filtered),
            batches: get(&self.batches),
            written: get(&self.written),
            writer_respawns: get(&self.writer_respawns),
            spawn_fallbacks: get(&self.spawn_fallbacks),
        }
    }

    /// Emit the final `stats:` line.
    pub fn log(&self) {
        info!("{}", self.snapshot());
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub oversized: u64,
    pub malformed: u64,
    pub queued: u64,
    pub filtered: u64,
    pub batches: u64,
    pub written: u64,
    pub writer_respawns: u64,
    pub spawn_fallbacks: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stats: datagrams={} oversized={} malformed={} queued={} filtered={} \
             batches={} written={} writer_respawns={} spawn_fallbacks={}",
            self.datagrams,
            self.oversized,
            self.malformed,
            self.queued,
            self.filtered,
            self.batches,
            self.written,
            self.writer_respawns,
            self.spawn_fallbacks,
        )
    }
}
