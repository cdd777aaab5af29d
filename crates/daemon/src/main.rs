// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! httplogd
//!
//! Architecture:
//! - Controller: main task receiving datagrams and flushing batches
//! - Writer: owns the descriptor cache; inline in the foreground, a
//!   dedicated thread fed over a socket pair in daemon mode

use std::sync::Arc;

use clap::Parser;
use hl_daemon::lifecycle::{self, check_spool};
use hl_daemon::logging::setup_logging;
use hl_daemon::{Args, Config, DaemonError, Stats};
use tracing::error;

#[tokio::main]
async fn main() {
    let config = Config::load(Args::parse());
    let stats = Arc::new(Stats::default());

    // Daemon mode logs into the spool, so it must exist first.
    if let Err(e) = check_spool(&config.spool) {
        eprintln!("httplogd: {e}");
        eprintln!("httplogd: {}", stats.snapshot());
        std::process::exit(e.exit_code());
    }

    let log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            let e = DaemonError::Setup(e);
            eprintln!("httplogd: {e}");
            eprintln!("httplogd: {}", stats.snapshot());
            std::process::exit(e.exit_code());
        }
    };

    let code = match lifecycle::run(&config, Arc::clone(&stats)).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Fatal: {}", e);
            eprintln!("httplogd: {e}");
            e.exit_code()
        }
    };

    stats.log();
    drop(log_guard);
    std::process::exit(code);
}
