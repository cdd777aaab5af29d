// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turning a flushed batch into writer messages.

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use hl_core::{format_line, Clock, LogEntry, SpoolLayout};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use crate::protocol::{write_message, Message, ProtocolError};
use crate::stats::Stats;
use crate::writer::{WorkerError, WriterWorker};

/// Lowest status that is logged; informational replies are dropped.
pub const MIN_LOGGED_STATUS: u32 = 200;

/// Errors while handing a batch to the writer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The channel to the writer is gone.
    #[error("dispatch channel lost: {0}")]
    Channel(#[source] ProtocolError),

    /// The inline writer failed.
    #[error("writer failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("worker thread panicked")]
    Panicked,
}

/// Everything needed to turn entries into messages.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub layout: Arc<SpoolLayout>,
    /// Active log file name.
    pub log_file: String,
    pub stats: Arc<Stats>,
}

/// Write record for `entry`, or `None` if it is not logged.
pub fn process_entry(layout: &SpoolLayout, log_file: &str, entry: &LogEntry) -> Option<Message> {
    if entry.status() < MIN_LOGGED_STATUS {
        trace!(status = entry.status(), line = entry.raw(), "not logging informational reply");
        return None;
    }
    let path = layout.file_path(entry, log_file);
    Some(Message::Write {
        path: path.to_string_lossy().into_owned(),
        line: format_line(entry),
    })
}

/// Destination of a batch's messages.
pub trait Sink {
    /// Deliver messages in order.
    fn send(&mut self, messages: &[Message]) -> Result<(), DispatchError>;
}

/// Shared controller end of the writer channel.
///
/// A batch holds the lock for all its frames so they stay contiguous.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    stream: Arc<Mutex<UnixStream>>,
}

impl ChannelSink {
    pub fn new(stream: Arc<Mutex<UnixStream>>) -> Self {
        Self { stream }
    }
}

impl Sink for ChannelSink {
    fn send(&mut self, messages: &[Message]) -> Result<(), DispatchError> {
        let mut stream = self.stream.lock();
        for msg in messages {
            write_message(&mut *stream, msg).map_err(DispatchError::Channel)?;
        }
        Ok(())
    }
}

/// Writes straight through a writer owned by the caller.
pub struct InlineSink<'a, C: Clock> {
    writer: &'a mut WriterWorker<C>,
}

impl<'a, C: Clock> InlineSink<'a, C> {
    pub fn new(writer: &'a mut WriterWorker<C>) -> Self {
        Self { writer }
    }
}

impl<C: Clock> Sink for InlineSink<'_, C> {
    fn send(&mut self, messages: &[Message]) -> Result<(), DispatchError> {
        for msg in messages {
            self.writer.handle(msg)?;
        }
        Ok(())
    }
}

/// Format `entries` and hand them to `sink` in batch order.
///
/// Returns the number of write records sent.
pub fn process_batch(
    entries: &[LogEntry],
    ctx: &DispatchContext,
    sink: &mut dyn Sink,
) -> Result<usize, DispatchError> {
    let messages: Vec<Message> = entries
        .iter()
        .filter_map(|entry| {
            let msg = process_entry(&ctx.layout, &ctx.log_file, entry);
            if msg.is_none() {
                Stats::incr(&ctx.stats.filtered);
            }
            msg
        })
        .collect();
    sink.send(&messages)?;
    Ok(messages.len())
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
