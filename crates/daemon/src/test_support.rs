// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::supervisor::{Job, Spawner, ThreadSpawner, WorkerResult};

/// Spawner that fails while `failures` is positive, then spawns threads.
#[derive(Debug, Clone, Default)]
pub struct FlakySpawner {
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl FlakySpawner {
    pub fn failing(times: usize) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(times)),
            attempts: Arc::default(),
        }
    }

    pub fn fail_next(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Spawner for FlakySpawner {
    fn spawn(&self, name: &str, job: Job) -> io::Result<JoinHandle<WorkerResult>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "Resource temporarily unavailable",
            ));
        }
        ThreadSpawner.spawn(name, job)
    }
}

/// Raw access-log line with the given fields of interest.
pub fn log_line(vhost: &str, uri: &str, status: u32) -> String {
    format!("192.0.2.10\t-\t-\t{status}\t512\t{vhost}\tGET {uri} HTTP/1.1\thttp://ref.example/\tcurl/8.5")
}

/// Spawner whose threads wait for [`GatedSpawner::open`] before running.
#[derive(Debug, Clone, Default)]
pub struct GatedSpawner {
    open: Arc<std::sync::atomic::AtomicBool>,
}

impl GatedSpawner {
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl Spawner for GatedSpawner {
    fn spawn(&self, name: &str, job: Job) -> io::Result<JoinHandle<WorkerResult>> {
        let open = Arc::clone(&self.open);
        let gated: Job = Box::new(move || {
            while !open.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            job()
        });
        ThreadSpawner.spawn(name, gated)
    }
}

/// Total lines in every file under `root`, skipping the daemon's own log.
pub fn count_lines(root: &std::path::Path) -> usize {
    let mut total = 0;
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            total += count_lines(&path);
        } else if path.file_name().is_some_and(|n| n != "httplogd.log") {
            total += std::fs::read_to_string(&path).map_or(0, |s| s.lines().count());
        }
    }
    total
}
