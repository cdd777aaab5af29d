// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::net::UdpSocket;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

pub const POLL_INTERVAL_MS: u64 = 10;
pub const WAIT_MAX_MS: u64 = 5000;

pub fn httplogd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_httplogd"))
}

/// A UDP port that was free a moment ago.
pub fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

/// A raw access-log line.
pub fn log_line(vhost: &str, uri: &str, status: u32) -> String {
    format!("198.51.100.7\t-\t-\t{status}\t2326\t{vhost}\tGET {uri} HTTP/1.1\t-\tcurl/8.5")
}

/// Poll `done` until it holds or the wait times out.
pub fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(WAIT_MAX_MS);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
    false
}

/// Lines in every log file under `root`.
pub fn count_lines(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_lines(&path)
            } else if path.file_name().is_some_and(|n| n != "httplogd.log") {
                std::fs::read_to_string(&path).map_or(0, |s| s.lines().count())
            } else {
                0
            }
        })
        .sum()
}

/// Running daemon listening on a private port.
pub struct Daemon {
    child: Option<Child>,
    pub port: u16,
}

impl Daemon {
    pub fn start(spool: &Path, extra: &[&str]) -> Self {
        Self::start_with_env(spool, extra, &[("HTTPLOGD_FLUSH_TIMEOUT_MS", "50")])
    }

    pub fn start_with_env(spool: &Path, extra: &[&str], env: &[(&str, &str)]) -> Self {
        let port = free_port();
        let child = httplogd()
            .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-s"])
            .arg(spool)
            .args(extra)
            .env("HTTPLOGD_REAP_INTERVAL_MS", "20")
            .envs(env.iter().copied())
            .env_remove("RUST_LOG")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        Self {
            child: Some(child),
            port,
        }
    }

    /// Wait until the daemon holds its port.
    pub fn wait_bound(&self) -> bool {
        wait_for(|| UdpSocket::bind(("127.0.0.1", self.port)).is_err())
    }

    pub fn send(&self, line: &str) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .send_to(line.as_bytes(), ("127.0.0.1", self.port))
            .unwrap();
    }

    /// Send `line` until `done` holds; the socket may not be bound yet.
    pub fn send_until(&self, line: &str, mut done: impl FnMut() -> bool) -> bool {
        wait_for(|| {
            if done() {
                return true;
            }
            self.send(line);
            std::thread::sleep(Duration::from_millis(50));
            done()
        })
    }

    pub fn signal(&self, name: &str) {
        let pid = self.child.as_ref().map(Child::id).unwrap();
        let status = Command::new("kill")
            .arg(format!("-{name}"))
            .arg(pid.to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    /// Terminate and collect exit status and stderr.
    pub fn stop(mut self) -> (ExitStatus, String) {
        self.signal("TERM");
        let output = self.child.take().unwrap().wait_with_output().unwrap();
        (
            output.status,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
