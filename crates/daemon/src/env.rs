// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Every tunable is optional; unset or unparsable values yield `None` and
//! the caller falls back to its default.

use std::time::Duration;

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Entries per batch
pub fn batch_size() -> Option<usize> {
    parsed::<usize>("HTTPLOGD_BATCH_SIZE").filter(|&n| n > 0)
}

/// Flush deadline after the last accepted line
pub fn flush_timeout() -> Option<Duration> {
    parsed::<u64>("HTTPLOGD_FLUSH_TIMEOUT_MS")
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

/// Worker reaping / housekeeping tick
pub fn reap_interval() -> Option<Duration> {
    parsed::<u64>("HTTPLOGD_REAP_INTERVAL_MS")
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

/// Live batch workers above which datagrams are not read
pub fn max_live_workers() -> Option<usize> {
    parsed("HTTPLOGD_MAX_LIVE_WORKERS")
}

/// Ceiling of the spawn-failure fallback sleep
pub fn max_spawn_delay() -> Option<Duration> {
    parsed::<u64>("HTTPLOGD_MAX_SPAWN_DELAY_SECS")
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

/// Share of cached descriptors closed when the cache is full
pub fn gc_percent() -> Option<u8> {
    parsed::<u8>("HTTPLOGD_GC_PERCENT").filter(|p| (1..=100).contains(p))
}

/// Bind attempts before giving up
pub fn bind_retries() -> Option<u32> {
    parsed::<u32>("HTTPLOGD_BIND_RETRIES").filter(|&n| n > 0)
}
