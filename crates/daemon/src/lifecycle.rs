// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup checks, socket binding, fatal errors.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hl_core::{SpoolLayout, SystemClock};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, Mode, BIND_RETRY_DELAY};
use crate::controller::{Controller, Output, Streaming};
use crate::dispatch::DispatchError;
use crate::fd_cache::CacheError;
use crate::fd_limit;
use crate::protocol::ProtocolError;
use crate::stats::Stats;
use crate::supervisor::{Supervisor, ThreadSpawner};
use crate::writer::{WorkerError, WriterSpec};

/// Errors that end the daemon. Each maps to a distinct exit code.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cannot bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("cannot spawn writer: {0}")]
    WriterSpawn(#[source] io::Error),

    #[error("cannot create dispatch channel: {0}")]
    Channel(#[source] io::Error),

    #[error("dispatch channel lost: {0}")]
    ChannelLost(#[source] ProtocolError),

    #[error("setup failed: {0}")]
    Setup(#[from] io::Error),

    #[error("spool directory {}: {reason}", path.display())]
    Spool { path: PathBuf, reason: String },

    #[error("descriptor cache: {0}")]
    Cache(#[from] CacheError),

    #[error("writer failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("worker thread panicked")]
    Panicked,
}

impl DaemonError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Bind { .. } => 1,
            DaemonError::WriterSpawn(_) => 2,
            DaemonError::Channel(_) | DaemonError::ChannelLost(_) => 3,
            DaemonError::Setup(_) => 4,
            DaemonError::Spool { .. } => 5,
            DaemonError::Cache(_) => 6,
            DaemonError::Worker(_) | DaemonError::Panicked => 7,
        }
    }
}

impl From<DispatchError> for DaemonError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Channel(e) => DaemonError::ChannelLost(e),
            DispatchError::Worker(e) => DaemonError::Worker(e),
            DispatchError::Panicked => DaemonError::Panicked,
        }
    }
}

/// The spool must be an existing directory.
pub fn check_spool(path: &Path) -> Result<(), DaemonError> {
    let meta = std::fs::metadata(path).map_err(|e| DaemonError::Spool {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(DaemonError::Spool {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(())
}

/// Bind the datagram socket, retrying `attempts` times `delay` apart.
pub async fn bind(addr: &str, attempts: u32, delay: Duration) -> Result<UdpSocket, DaemonError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match UdpSocket::bind(addr).await {
            Ok(socket) => return Ok(socket),
            Err(e) if attempt < attempts => {
                warn!(addr, attempt, error = %e, "bind failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(DaemonError::Bind {
                    addr: addr.to_string(),
                    source,
                })
            }
        }
    }
}

/// Result of a successful startup.
pub struct Started {
    pub socket: UdpSocket,
    pub controller: Controller<ThreadSpawner, SystemClock>,
}

/// Validate the environment and build the controller.
pub async fn startup(config: &Config, stats: Arc<Stats>) -> Result<Started, DaemonError> {
    check_spool(&config.spool)?;
    let socket = bind(&config.listen_addr(), config.bind_retries, BIND_RETRY_DELAY).await?;

    let capacity = fd_limit::default_cache_capacity();
    if capacity == 0 {
        return Err(CacheError::ZeroCapacity.into());
    }
    let spec = WriterSpec {
        spool: config.spool.clone(),
        capacity,
        gc_percent: config.gc_percent,
        clock: SystemClock,
        stats: Arc::clone(&stats),
    };

    let output = match config.mode {
        Mode::Foreground => Output::Inline(spec.build()?),
        Mode::Daemon => {
            let (tx, rx) = UnixStream::pair().map_err(DaemonError::Channel)?;
            let supervisor = Supervisor::new(ThreadSpawner, config.max_spawn_delay);
            Output::Streaming(Streaming::start(tx, rx, supervisor, spec)?)
        }
    };

    let layout = SpoolLayout::new(&config.account_sites);
    let controller = Controller::new(config, layout, SystemClock, stats, output);
    info!(
        addr = %config.listen_addr(),
        mode = ?config.mode,
        spool = %config.spool.display(),
        cache_capacity = capacity,
        "httplogd started"
    );
    Ok(Started { socket, controller })
}

/// Start and run until terminated.
pub async fn run(config: &Config, stats: Arc<Stats>) -> Result<(), DaemonError> {
    let Started { socket, controller } = startup(config, stats).await?;
    controller.run(socket, CancellationToken::new()).await
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
