// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end: datagrams in, log files out.

use crate::prelude::*;

#[test]
fn foreground_writes_lines_and_reports_stats_on_sigterm() {
    let spool = tempfile::tempdir().unwrap();
    let daemon = Daemon::start(spool.path(), &["-n"]);

    assert!(daemon.send_until(&log_line("www.example.com", "/", 200), || {
        count_lines(spool.path()) > 0
    }));
    daemon.send(&log_line("www.example.com", "/second", 200));
    daemon.send(&log_line("www.example.com", "/upgrade", 101));
    let expected = count_lines(spool.path()) + 1;
    assert!(wait_for(|| count_lines(spool.path()) == expected));

    let (status, stderr) = daemon.stop();
    assert_eq!(status.code(), Some(0), "{stderr}");
    assert!(stderr.contains("stats: datagrams="), "{stderr}");

    let dir = spool.path().join("e/x/www.example.com");
    let files: Vec<_> = std::fs::read_dir(&dir).unwrap().flatten().collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().to_string_lossy().into_owned();
    assert!(name.ends_with(".log") && name.len() == "YYYY-MM-DD.log".len(), "{name}");

    let content = std::fs::read_to_string(files[0].path()).unwrap();
    assert!(content.contains("\"GET /second HTTP/1.1\" 200 2326"));
    assert!(!content.contains("/upgrade"));
}

#[test]
fn daemon_mode_logs_into_spool_and_writes_through_writer() {
    let spool = tempfile::tempdir().unwrap();
    let daemon = Daemon::start(spool.path(), &["-D", "--account-site", "shared.example.net"]);

    assert!(daemon.send_until(&log_line("shared.example.net", "/~bob/a.html", 200), || {
        count_lines(spool.path()) > 0
    }));

    let (status, _stderr) = daemon.stop();
    assert_eq!(status.code(), Some(0));
    assert!(spool.path().join("users/shared.example.net/b/o/bob").is_dir());

    let log = std::fs::read_to_string(spool.path().join("httplogd.log")).unwrap();
    assert!(log.contains("httplogd started"), "{log}");
    assert!(log.contains("stats: datagrams="), "{log}");
}

#[test]
fn sighup_flushes_pending_lines() {
    let spool = tempfile::tempdir().unwrap();
    let daemon = Daemon::start_with_env(
        spool.path(),
        &["-n"],
        &[("HTTPLOGD_FLUSH_TIMEOUT_MS", "600000")],
    );
    assert!(daemon.wait_bound());

    daemon.send(&log_line("hup.example.org", "/", 200));
    std::thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(count_lines(spool.path()), 0);

    assert!(wait_for(|| {
        daemon.signal("HUP");
        std::thread::sleep(std::time::Duration::from_millis(50));
        count_lines(spool.path()) == 1
    }));

    let (status, stderr) = daemon.stop();
    assert_eq!(status.code(), Some(0));
    assert!(stderr.contains("Received SIGHUP"), "{stderr}");
}

#[test]
fn malformed_datagrams_are_counted_not_written() {
    let spool = tempfile::tempdir().unwrap();
    let daemon = Daemon::start(spool.path(), &["-n"]);
    assert!(daemon.wait_bound());

    daemon.send("no separators here");
    assert!(daemon.send_until(&log_line("ok.example.org", "/", 200), || {
        count_lines(spool.path()) > 0
    }));

    let (_status, stderr) = daemon.stop();
    assert!(stderr.contains("malformed=1"), "{stderr}");
}
