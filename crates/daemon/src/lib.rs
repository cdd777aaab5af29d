// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! httplogd: access-log collection daemon
//!
//! Receives access-log lines over UDP, batches them and appends each to a
//! per-site file under the spool directory.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod env;
pub mod fd_cache;
pub mod fd_limit;
pub mod lifecycle;
pub mod logging;
pub mod protocol;
pub mod stats;
pub mod supervisor;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use config::{Args, Config, Mode};
pub use controller::{Controller, Output, Streaming};
pub use dispatch::{process_batch, process_entry, DispatchError};
pub use fd_cache::{CacheError, CacheStats, FdCache};
pub use lifecycle::DaemonError;
pub use protocol::{Message, ProtocolError, MAX_PATH_SIZE, MAX_PAYLOAD_SIZE};
pub use stats::{Stats, StatsSnapshot};
pub use supervisor::{Backoff, Spawner, Supervisor, ThreadSpawner};
pub use writer::{WorkerError, WriterSpec, WriterWorker};
