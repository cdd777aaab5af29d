// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use clap::Parser;
use hl_core::{FakeClock, Rollover};
use tempfile::TempDir;

use super::*;
use crate::config::Args;
use crate::supervisor::ThreadSpawner;
use crate::test_support::{count_lines, log_line, FlakySpawner, GatedSpawner};

// 2026-01-30T08:14:09Z
const NOW: i64 = 1_769_760_849;
const DAY: i64 = 86_400;

fn config(batch_size: usize) -> Config {
    let mut config = Config::load(Args::try_parse_from(["httplogd"]).unwrap());
    config.batch_size = batch_size;
    config.flush_timeout = Duration::from_millis(50);
    config.reap_interval = Duration::from_millis(10);
    config.max_live_workers = 10;
    config
}

fn spec(dir: &TempDir, clock: &FakeClock, stats: &Arc<Stats>) -> WriterSpec<FakeClock> {
    WriterSpec {
        spool: dir.path().to_path_buf(),
        capacity: 32,
        gc_percent: 20,
        clock: clock.clone(),
        stats: Arc::clone(stats),
    }
}

struct Harness<S: Spawner> {
    dir: TempDir,
    clock: FakeClock,
    stats: Arc<Stats>,
    controller: Controller<S, FakeClock>,
}

fn inline(batch_size: usize) -> Harness<ThreadSpawner> {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new(NOW);
    let stats = Arc::new(Stats::default());
    let writer = spec(&dir, &clock, &stats).build().unwrap();
    let controller = Controller::new(
        &config(batch_size),
        SpoolLayout::default(),
        clock.clone(),
        Arc::clone(&stats),
        Output::Inline(writer),
    );
    Harness {
        dir,
        clock,
        stats,
        controller,
    }
}

fn streaming<S: Spawner>(batch_size: usize, spawner: S) -> Harness<S> {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new(NOW);
    let stats = Arc::new(Stats::default());
    let (tx, rx) = UnixStream::pair().unwrap();
    let supervisor = Supervisor::new(spawner, Duration::from_secs(64));
    let output = Output::Streaming(
        Streaming::start(tx, rx, supervisor, spec(&dir, &clock, &stats)).unwrap(),
    );
    let mut config = config(batch_size);
    config.max_live_workers = 0;
    let controller = Controller::new(
        &config,
        SpoolLayout::default(),
        clock.clone(),
        Arc::clone(&stats),
        output,
    );
    Harness {
        dir,
        clock,
        stats,
        controller,
    }
}

fn local_name(at: i64) -> String {
    let mut rollover = Rollover::local();
    rollover.advance(at).unwrap().name
}

fn read(root: &Path, vhost_dir: &str, at: i64) -> String {
    std::fs::read_to_string(root.join(vhost_dir).join(local_name(at))).unwrap_or_default()
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn full_batch_flushes_automatically() {
    let mut h = inline(128);

    for n in 0..127 {
        let line = log_line(&format!("site{}.example", n % 7), "/", 200);
        assert!(h.controller.receive(line.as_bytes()).await.unwrap());
    }
    assert_eq!(h.controller.pending(), 127);
    assert_eq!(count_lines(h.dir.path()), 0);

    let last = log_line("site0.example", "/", 200);
    h.controller.receive(last.as_bytes()).await.unwrap();

    assert_eq!(h.controller.pending(), 0);
    assert_eq!(count_lines(h.dir.path()), 128);
    let stats = h.stats.snapshot();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.queued, 128);
    assert_eq!(stats.written, 128);
}

#[tokio::test]
async fn partial_batch_waits_for_flush() {
    let mut h = inline(128);
    for _ in 0..5 {
        h.controller
            .receive(log_line("example.org", "/", 200).as_bytes())
            .await
            .unwrap();
    }
    assert_eq!(count_lines(h.dir.path()), 0);

    h.controller.flush().await.unwrap();

    assert_eq!(h.controller.pending(), 0);
    assert_eq!(read(h.dir.path(), "e/x/example.org", NOW).lines().count(), 5);
}

#[tokio::test]
async fn informational_replies_are_not_written() {
    let mut h = inline(4);
    h.controller
        .receive(log_line("example.org", "/upgrade", 101).as_bytes())
        .await
        .unwrap();
    h.controller
        .receive(log_line("example.org", "/page", 200).as_bytes())
        .await
        .unwrap();
    h.controller.flush().await.unwrap();

    let written = read(h.dir.path(), "e/x/example.org", NOW);
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains("GET /page HTTP/1.1"));
    assert_eq!(h.stats.snapshot().filtered, 1);
}

#[tokio::test]
async fn bad_datagrams_are_counted_not_queued() {
    let mut h = inline(4);

    let oversized = vec![b'a'; MAX_LINE_SIZE + 1];
    assert!(!h.controller.receive(&oversized).await.unwrap());
    assert!(!h.controller.receive(b"no separators at all").await.unwrap());
    assert!(h
        .controller
        .receive(log_line("example.org", "/", 200).as_bytes())
        .await
        .unwrap());

    let stats = h.stats.snapshot();
    assert_eq!(stats.datagrams, 3);
    assert_eq!(stats.oversized, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(h.controller.pending(), 1);
}

#[tokio::test]
async fn rollover_switches_file_and_closes_old_descriptors() {
    let mut h = inline(8);
    h.controller.flush().await.unwrap();
    assert_eq!(h.controller.log_file(), Some(local_name(NOW).as_str()));

    h.controller
        .receive(log_line("example.org", "/day1", 200).as_bytes())
        .await
        .unwrap();
    h.controller.flush().await.unwrap();
    let old_path = format!("e/x/example.org/{}", local_name(NOW));

    h.clock.set(NOW + 2 * DAY);
    h.controller.housekeeping().await.unwrap();

    assert_eq!(
        h.controller.log_file(),
        Some(local_name(NOW + 2 * DAY).as_str())
    );
    assert_eq!(h.controller.pending_cutoff(), None);
    match h.controller.output() {
        Output::Inline(writer) => assert!(writer.cache().slot_of(&old_path).is_none()),
        Output::Streaming(_) => unreachable!(),
    }

    h.controller
        .receive(log_line("example.org", "/day3", 200).as_bytes())
        .await
        .unwrap();
    h.controller.flush().await.unwrap();

    let old = read(h.dir.path(), "e/x/example.org", NOW);
    let new = read(h.dir.path(), "e/x/example.org", NOW + 2 * DAY);
    assert!(old.contains("/day1") && !old.contains("/day3"));
    assert!(new.contains("/day3") && !new.contains("/day1"));
}

#[tokio::test]
async fn lines_pending_at_rollover_keep_the_old_name() {
    let mut h = inline(8);
    h.controller.flush().await.unwrap();
    h.controller
        .receive(log_line("example.org", "/late", 200).as_bytes())
        .await
        .unwrap();

    h.clock.set(NOW + 2 * DAY);
    h.controller.housekeeping().await.unwrap();

    assert_eq!(h.controller.pending(), 0);
    assert!(read(h.dir.path(), "e/x/example.org", NOW).contains("/late"));
}

#[tokio::test]
async fn descriptors_used_in_the_rollover_second_are_closed() {
    let mut h = inline(8);
    h.controller.flush().await.unwrap();
    h.controller
        .receive(log_line("example.org", "/late", 200).as_bytes())
        .await
        .unwrap();

    // The pending line is written with the same timestamp as the rollover.
    h.clock.set(NOW + 2 * DAY);
    h.controller.housekeeping().await.unwrap();

    let old_path = format!("e/x/example.org/{}", local_name(NOW));
    match h.controller.output() {
        Output::Inline(writer) => {
            assert!(writer.cache().slot_of(&old_path).is_none());
            assert!(writer.cache().is_empty());
        }
        Output::Streaming(_) => unreachable!(),
    }
}

#[tokio::test]
async fn streaming_mode_writes_through_writer_thread() {
    let mut h = streaming(16, ThreadSpawner);
    h.controller.flush().await.unwrap();

    for n in 0..40 {
        let line = log_line(&format!("host{}.example", n % 3), "/", 200);
        h.controller.receive(line.as_bytes()).await.unwrap();
    }
    assert_eq!(h.controller.pending(), 8);

    let dir = h.dir;
    h.controller.shutdown().await.unwrap();

    assert_eq!(count_lines(dir.path()), 40);
    assert_eq!(h.stats.snapshot().batches, 3);
    assert_eq!(h.stats.snapshot().written, 40);
}

#[tokio::test]
async fn spawn_failure_falls_back_to_inline_dispatch() {
    let spawner = FlakySpawner::default();
    let mut h = streaming(4, spawner.clone());
    h.controller.flush().await.unwrap();
    spawner.fail_next(1);

    for _ in 0..4 {
        h.controller
            .receive(log_line("example.org", "/", 200).as_bytes())
            .await
            .unwrap();
    }
    assert_eq!(h.stats.snapshot().spawn_fallbacks, 1);

    let dir = h.dir;
    h.controller.shutdown().await.unwrap();
    assert_eq!(count_lines(dir.path()), 4);
}

#[tokio::test]
async fn too_many_live_workers_pause_receive() {
    let spawner = GatedSpawner::default();
    let mut h = streaming(2, spawner.clone());
    h.controller.flush().await.unwrap();
    assert!(h.controller.accepting());

    for _ in 0..2 {
        h.controller
            .receive(log_line("example.org", "/", 200).as_bytes())
            .await
            .unwrap();
    }
    assert!(!h.controller.accepting());

    spawner.open();
    let mut controller = h.controller;
    for _ in 0..500 {
        controller.housekeeping().await.unwrap();
        if controller.accepting() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(controller.accepting());
    controller.shutdown().await.unwrap();
    assert_eq!(count_lines(h.dir.path()), 2);
}

#[tokio::test]
async fn streaming_cutoff_is_delivered_after_workers_finish() {
    let mut h = streaming(2, ThreadSpawner);
    h.controller.flush().await.unwrap();
    for _ in 0..2 {
        h.controller
            .receive(log_line("example.org", "/", 200).as_bytes())
            .await
            .unwrap();
    }

    h.clock.set(NOW + 2 * DAY);
    let mut controller = h.controller;
    for _ in 0..500 {
        controller.housekeeping().await.unwrap();
        if controller.pending_cutoff().is_none()
            && controller.log_file() == Some(local_name(NOW + 2 * DAY).as_str())
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(controller.pending_cutoff(), None);
    assert_eq!(
        controller.log_file(),
        Some(local_name(NOW + 2 * DAY).as_str())
    );
    controller.shutdown().await.unwrap();
    assert_eq!(count_lines(h.dir.path()), 2);
}

#[tokio::test]
async fn dead_writer_is_respawned() {
    let mut h = streaming(1, ThreadSpawner);
    h.controller.flush().await.unwrap();

    // A file where a directory is needed kills the writer.
    std::fs::write(h.dir.path().join("b"), "").unwrap();
    h.controller
        .receive(log_line("bad.example", "/", 200).as_bytes())
        .await
        .unwrap();

    let mut controller = h.controller;
    for _ in 0..500 {
        controller.housekeeping().await.unwrap();
        if h.stats.snapshot().writer_respawns == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.stats.snapshot().writer_respawns, 1);

    controller
        .receive(log_line("good.example", "/", 200).as_bytes())
        .await
        .unwrap();
    controller.shutdown().await.unwrap();
    assert_eq!(read(h.dir.path(), "g/o/good.example", NOW).lines().count(), 1);
}

#[tokio::test]
async fn run_serves_datagrams_until_cancelled() {
    let h = inline(128);
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let token = CancellationToken::new();
    let root = h.dir.path().to_path_buf();

    let driver = async {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for n in 0..3 {
            let line = log_line("example.org", &format!("/{n}"), 200);
            client.send_to(line.as_bytes(), addr).await.unwrap();
        }
        // Flushed by the timeout, not by size.
        wait_for(|| count_lines(&root) == 3).await;
        token.cancel();
    };

    let (result, ()) = tokio::join!(h.controller.run(socket, token.clone()), driver);
    result.unwrap();
    assert_eq!(h.stats.snapshot().datagrams, 3);
}
