// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup for the daemon.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;

use crate::config::Config;

/// Filter directive for a `--debug` level.
pub fn filter_directive(level: u8) -> &'static str {
    match level {
        0 => "warn",
        1..=3 => "info",
        4..=6 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `--debug`.
///
/// Foreground mode logs to stderr; daemon mode appends to the spool's
/// `httplogd.log`. Keep the guard alive until exit.
pub fn setup_logging(config: &Config) -> io::Result<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (writer, guard) = match config.log_path() {
        Some(path) => {
            let dir = path.parent().ok_or_else(|| no_log_dir(&path))?;
            let file = path.file_name().ok_or_else(|| no_log_dir(&path))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file))
        }
        None => tracing_appender::non_blocking(io::stderr()),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(config.log_path().is_none()),
        )
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}

fn no_log_dir(path: &std::path::Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid log path {}", path.display()),
    )
}
