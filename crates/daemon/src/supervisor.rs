// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker threads: spawning, reaping and spawn-failure backoff.
//!
//! Batch workers are one-shot: each formats one batch onto the channel and
//! exits. The writer is long-lived and is respawned if it dies while the
//! daemon is running.

use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::dispatch::DispatchError;

/// Result of a worker thread: records handled, or why it stopped.
pub type WorkerResult = Result<u64, DispatchError>;

/// Boxed worker body.
pub type Job = Box<dyn FnOnce() -> WorkerResult + Send + 'static>;

/// Shortest fallback sleep after a failed spawn.
pub const MIN_SPAWN_DELAY: Duration = Duration::from_secs(1);

/// Interval between attempts to bring back a dead writer.
pub const WRITER_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum interval between warnings about a writer that cannot be respawned.
pub const WRITER_WARN_INTERVAL: Duration = Duration::from_secs(600);

/// Creates worker threads. Spawning may fail.
pub trait Spawner: Send + Sync {
    fn spawn(&self, name: &str, job: Job) -> io::Result<JoinHandle<WorkerResult>>;
}

/// Spawns named OS threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: &str, job: Job) -> io::Result<JoinHandle<WorkerResult>> {
        std::thread::Builder::new().name(name.to_string()).spawn(job)
    }
}

/// Doubling delay between `min` and `max`, reset on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Delay to wait now; the following call returns twice as much.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Tracks live worker threads.
pub struct Supervisor<S: Spawner> {
    spawner: S,
    batches: Vec<JoinHandle<WorkerResult>>,
    writer: Option<JoinHandle<WorkerResult>>,
    backoff: Backoff,
    next_writer_attempt: Option<Instant>,
    last_writer_warning: Option<Instant>,
    spawned: u64,
}

impl<S: Spawner> Supervisor<S> {
    pub fn new(spawner: S, max_spawn_delay: Duration) -> Self {
        Self {
            spawner,
            batches: Vec::new(),
            writer: None,
            backoff: Backoff::new(MIN_SPAWN_DELAY, max_spawn_delay),
            next_writer_attempt: None,
            last_writer_warning: None,
            spawned: 0,
        }
    }

    /// Live batch workers, including finished ones not yet reaped.
    pub fn live_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn writer_alive(&self) -> bool {
        self.writer.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Start a batch worker. On failure the caller processes the batch
    /// itself after sleeping for the returned delay.
    pub fn spawn_batch(&mut self, job: Job) -> Result<(), (io::Error, Duration)> {
        self.spawned += 1;
        let name = format!("batch-{}", self.spawned);
        match self.spawner.spawn(&name, job) {
            Ok(handle) => {
                self.backoff.reset();
                self.batches.push(handle);
                Ok(())
            }
            Err(e) => Err((e, self.backoff.next_delay())),
        }
    }

    /// Start the writer.
    pub fn spawn_writer(&mut self, job: Job) -> io::Result<()> {
        let handle = self.spawner.spawn("writer", job)?;
        self.writer = Some(handle);
        self.next_writer_attempt = None;
        Ok(())
    }

    /// Collect finished batch workers.
    pub fn reap(&mut self) -> Vec<WorkerResult> {
        let (finished, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.batches)
            .into_iter()
            .partition(|h| h.is_finished());
        self.batches = live;
        finished.into_iter().map(join).collect()
    }

    /// Take the writer's result if it has exited.
    pub fn reap_writer(&mut self) -> Option<WorkerResult> {
        if self.writer.as_ref()?.is_finished() {
            return self.writer.take().map(join);
        }
        None
    }

    /// Respawn a dead writer, rate-limiting attempts and warnings.
    ///
    /// Returns `true` when a new writer was started.
    pub fn respawn_writer(&mut self, now: Instant, job: impl FnOnce() -> Job) -> bool {
        if self.writer.is_some() {
            return false;
        }
        if self.next_writer_attempt.is_some_and(|at| now < at) {
            return false;
        }
        match self.spawner.spawn("writer", job()) {
            Ok(handle) => {
                self.writer = Some(handle);
                self.next_writer_attempt = None;
                true
            }
            Err(e) => {
                self.next_writer_attempt = Some(now + WRITER_RETRY_INTERVAL);
                let quiet = self
                    .last_writer_warning
                    .is_some_and(|at| now.duration_since(at) < WRITER_WARN_INTERVAL);
                if !quiet {
                    warn!(error = %e, retry_in = ?WRITER_RETRY_INTERVAL, "cannot respawn writer");
                    self.last_writer_warning = Some(now);
                }
                false
            }
        }
    }

    /// Wait for every batch worker.
    pub fn join_batches(&mut self) -> Vec<WorkerResult> {
        std::mem::take(&mut self.batches)
            .into_iter()
            .map(join)
            .collect()
    }

    /// Wait for the writer, if any.
    pub fn join_writer(&mut self) -> Option<WorkerResult> {
        self.writer.take().map(join)
    }
}

fn join(handle: JoinHandle<WorkerResult>) -> WorkerResult {
    handle.join().unwrap_or(Err(DispatchError::Panicked))
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
