// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: command line plus environment tunables.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hl_core::DEFAULT_BATCH_SIZE;

use crate::env;
use crate::fd_cache::DEFAULT_GC_PERCENT;

pub const DEFAULT_PORT: u16 = 8181;
pub const DEFAULT_LISTEN: &str = "0.0.0.0";
pub const DEFAULT_SPOOL: &str = "/var/log/httpd-log";
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(4000);
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_LIVE_WORKERS: usize = 10;
pub const DEFAULT_MAX_SPAWN_DELAY: Duration = Duration::from_secs(64);
pub const DEFAULT_BIND_RETRIES: u32 = 7;
pub const BIND_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Name of the daemon's own log inside the spool (daemon mode).
pub const DAEMON_LOG_FILE: &str = "httplogd.log";

/// Access-log collector: receives log lines over UDP and files them per site
#[derive(Debug, Clone, Parser)]
#[command(name = "httplogd", version)]
pub struct Args {
    /// Address to listen on
    #[arg(short = 'l', long = "listen", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// UDP port
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Verbosity, 0 (warnings only) to 9 (everything)
    #[arg(short = 'd', long = "debug", default_value_t = 1)]
    pub debug: u8,

    /// Stay in the foreground and write inline (default)
    #[arg(short = 'n', long = "nodaemon", conflicts_with = "daemon")]
    pub nodaemon: bool,

    /// Daemon mode: dedicated writer thread, log to the spool
    #[arg(short = 'D', long = "daemon")]
    pub daemon: bool,

    /// Spool directory holding the log tree
    #[arg(short = 's', long = "spool", default_value = DEFAULT_SPOOL)]
    pub spool: PathBuf,

    /// Shared site whose traffic is split per account (repeatable)
    #[arg(long = "account-site", value_name = "HOST")]
    pub account_sites: Vec<String>,
}

/// How batches reach the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The controller writes batches itself.
    Foreground,
    /// Batch workers feed a long-lived writer thread over a channel.
    Daemon,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub port: u16,
    pub debug: u8,
    pub mode: Mode,
    pub spool: PathBuf,
    pub account_sites: Vec<String>,
    pub batch_size: usize,
    pub flush_timeout: Duration,
    pub reap_interval: Duration,
    pub max_live_workers: usize,
    pub max_spawn_delay: Duration,
    pub gc_percent: u8,
    pub bind_retries: u32,
}

impl Config {
    /// Combine parsed arguments with environment overrides.
    pub fn load(args: Args) -> Self {
        let mode = if args.daemon {
            Mode::Daemon
        } else {
            Mode::Foreground
        };
        Self {
            listen: args.listen,
            port: args.port,
            debug: args.debug,
            mode,
            spool: args.spool,
            account_sites: args.account_sites,
            batch_size: env::batch_size().unwrap_or(DEFAULT_BATCH_SIZE),
            flush_timeout: env::flush_timeout().unwrap_or(DEFAULT_FLUSH_TIMEOUT),
            reap_interval: env::reap_interval().unwrap_or(DEFAULT_REAP_INTERVAL),
            max_live_workers: env::max_live_workers().unwrap_or(DEFAULT_MAX_LIVE_WORKERS),
            max_spawn_delay: env::max_spawn_delay().unwrap_or(DEFAULT_MAX_SPAWN_DELAY),
            gc_percent: env::gc_percent().unwrap_or(DEFAULT_GC_PERCENT),
            bind_retries: env::bind_retries().unwrap_or(DEFAULT_BIND_RETRIES),
        }
    }

    /// `host:port` to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }

    /// Where the daemon's own log goes in daemon mode.
    pub fn log_path(&self) -> Option<PathBuf> {
        match self.mode {
            Mode::Daemon => Some(self.spool.join(DAEMON_LOG_FILE)),
            Mode::Foreground => None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
