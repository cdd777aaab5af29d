// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity buffer of parsed entries awaiting dispatch.

use thiserror::Error;

use crate::entry::LogEntry;

/// Entries collected before a batch is handed to a worker.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Returned by [`BatchBuffer::push`] when the buffer is already full.
///
/// The rejected entry is handed back so the caller can flush and retry.
#[derive(Debug, Error)]
#[error("batch buffer full ({capacity} entries)")]
pub struct BatchFull {
    pub capacity: usize,
    pub entry: LogEntry,
}

/// Ordered, bounded list of entries.
///
/// Full batches are moved out with [`take`](Self::take); the buffer is then
/// empty again and keeps its capacity.
#[derive(Debug)]
pub struct BatchBuffer {
    entries: Vec<LogEntry>,
    capacity: usize,
}

impl BatchBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `entry`, returning the new length.
    pub fn push(&mut self, entry: LogEntry) -> Result<usize, BatchFull> {
        if self.is_full() {
            return Err(BatchFull {
                capacity: self.capacity,
                entry,
            });
        }
        self.entries.push(entry);
        Ok(self.entries.len())
    }

    /// Move all buffered entries out, leaving an empty buffer.
    pub fn take(&mut self) -> Vec<LogEntry> {
        std::mem::replace(&mut self.entries, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
