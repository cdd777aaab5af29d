// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptor budget for the writer's cache.

/// Limit assumed when `getrlimit` is unavailable.
pub const FALLBACK_FD_LIMIT: u64 = 1024;

/// Cap applied to an unlimited soft limit.
const UNLIMITED_CAP: u64 = 65536;

/// Share of the descriptor limit the cache may use, in percent.
pub const CACHE_SHARE_PERCENT: u64 = 80;

/// Soft `RLIMIT_NOFILE`, or `None` when it cannot be read.
#[allow(unsafe_code)]
pub fn soft_nofile_limit() -> Option<u64> {
    let mut rl = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `rl` is a valid, writable rlimit for the duration of the call.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) } != 0 {
        return None;
    }
    if rl.rlim_cur == libc::RLIM_INFINITY {
        return Some(UNLIMITED_CAP);
    }
    Some(rl.rlim_cur as u64)
}

/// Cache slots for a descriptor limit, leaving headroom for the process.
pub fn cache_capacity(fd_limit: u64) -> usize {
    (fd_limit.saturating_mul(CACHE_SHARE_PERCENT) / 100) as usize
}

/// Cache slots for this process.
pub fn default_cache_capacity() -> usize {
    let limit = soft_nofile_limit().unwrap_or_else(|| {
        tracing::warn!(
            fallback = FALLBACK_FD_LIMIT,
            "getrlimit(RLIMIT_NOFILE) failed, assuming default"
        );
        FALLBACK_FD_LIMIT
    });
    cache_capacity(limit)
}
