// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! httplog - forward access-log lines from stdin to httplogd

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod forward;

use std::io;
use std::net::UdpSocket;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8181;

#[derive(Parser)]
#[command(
    name = "httplog",
    version,
    about = "Forward access-log lines to httplogd",
    disable_help_flag = true
)]
struct Cli {
    /// Daemon host
    #[arg(short = 'h', long = "host", default_value = DEFAULT_HOST)]
    host: String,

    /// Daemon UDP port
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Debug level (0 = warnings only, 7+ = trace)
    #[arg(short = 'd', long = "debug", default_value_t = 1)]
    debug: u8,

    /// Print help
    #[arg(long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

/// Map a numeric debug level onto a tracing filter.
fn filter_directive(level: u8) -> &'static str {
    match level {
        0 => "warn",
        1..=3 => "info",
        4..=6 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli.debug)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let socket = UdpSocket::bind(("0.0.0.0", 0)).context("cannot create UDP socket")?;
    socket
        .connect((cli.host.as_str(), cli.port))
        .with_context(|| format!("cannot resolve {}:{}", cli.host, cli.port))?;

    let counts = forward::forward(io::stdin().lock(), |line| socket.send(line).map(drop))
        .context("cannot read standard input")?;

    info!(
        sent = counts.sent,
        discarded = counts.discarded,
        failed = counts.failed,
        "done"
    );
    Ok(())
}
