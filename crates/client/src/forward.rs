// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-to-datagram forwarding.

use std::io::{self, BufRead};

use tracing::{debug, warn};

/// Longest line the daemon accepts; longer ones are not sent.
pub const MAX_LINE_SIZE: usize = 2048;

/// Outcome of one forwarding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub sent: u64,
    pub discarded: u64,
    pub failed: u64,
}

/// Send every line of `input` through `send` until EOF.
///
/// The trailing newline is stripped. Send failures are counted and
/// forwarding continues; only read errors end the run early.
pub fn forward<R, F>(mut input: R, mut send: F) -> io::Result<Counts>
where
    R: BufRead,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut counts = Counts::default();
    let mut line = Vec::with_capacity(MAX_LINE_SIZE + 1);

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            return Ok(counts);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }

        if line.len() > MAX_LINE_SIZE {
            debug!(len = line.len(), "line too long, discarded");
            counts.discarded += 1;
            continue;
        }

        match send(&line) {
            Ok(()) => counts.sent += 1,
            Err(e) => {
                warn!(error = %e, "send failed");
                counts.failed += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
