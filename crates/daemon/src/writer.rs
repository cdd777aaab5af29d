// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer worker: drains dispatch messages into log files.
//!
//! The worker owns its [`FdCache`]; nothing else touches it. In streaming
//! mode it runs on a dedicated thread reading frames from the channel until
//! the controller shuts the channel down.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;

use hl_core::Clock;
use thiserror::Error;
use tracing::{debug, info};

use crate::fd_cache::{CacheError, FdCache};
use crate::protocol::{read_message, Message, ProtocolError};
use crate::stats::Stats;
use crate::supervisor::{Job, WorkerResult};

/// Errors that stop a writer.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("dispatch channel: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Owns the descriptor cache and applies messages in order.
#[derive(Debug)]
pub struct WriterWorker<C: Clock> {
    cache: FdCache<C>,
    stats: Arc<Stats>,
}

impl<C: Clock> WriterWorker<C> {
    pub fn new(cache: FdCache<C>, stats: Arc<Stats>) -> Self {
        Self { cache, stats }
    }

    pub fn cache(&self) -> &FdCache<C> {
        &self.cache
    }

    /// Apply one message.
    pub fn handle(&mut self, msg: &Message) -> Result<(), WorkerError> {
        match msg {
            Message::Write { path, line } => {
                self.cache.append_line(path, line)?;
                Stats::incr(&self.stats.written);
            }
            Message::Close { cutoff } => {
                let closed = self.cache.close_all(*cutoff, true);
                info!(cutoff, closed, "closed descriptors of previous log files");
            }
        }
        Ok(())
    }

    /// Read and apply messages until the channel is closed.
    ///
    /// Returns how many messages were applied.
    pub fn run<R: Read>(&mut self, reader: &mut R) -> Result<u64, WorkerError> {
        let mut handled = 0u64;
        loop {
            let msg = match read_message(reader) {
                Ok(msg) => msg,
                Err(ProtocolError::ConnectionClosed) => break,
                Err(e) => return Err(e.into()),
            };
            self.handle(&msg)?;
            handled += 1;
        }
        debug!(handled, open = self.cache.len(), "writer channel closed");
        Ok(handled)
    }

    /// Flush and close every descriptor.
    pub fn close_all(&mut self) -> usize {
        self.cache.close_all(i64::MAX, true)
    }
}

/// Everything needed to build a writer, possibly more than once.
#[derive(Debug, Clone)]
pub struct WriterSpec<C: Clock> {
    pub spool: PathBuf,
    pub capacity: usize,
    pub gc_percent: u8,
    pub clock: C,
    pub stats: Arc<Stats>,
}

impl<C: Clock> WriterSpec<C> {
    /// Writer owned by the caller.
    pub fn build(&self) -> Result<WriterWorker<C>, CacheError> {
        let cache = FdCache::new(&self.spool, self.capacity, self.clock.clone())?
            .with_gc_percent(self.gc_percent);
        Ok(WriterWorker::new(cache, Arc::clone(&self.stats)))
    }

    /// Thread body draining `reader` with a fresh writer.
    pub fn job(&self, mut reader: UnixStream) -> Job {
        let spec = self.clone();
        Box::new(move || -> WorkerResult {
            let mut writer = spec.build().map_err(WorkerError::from)?;
            let result = writer.run(&mut reader);
            writer.close_all();
            Ok(result?)
        })
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
