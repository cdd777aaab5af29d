// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface and startup failures.

use assert_cmd::Command;

#[test]
fn help_lists_options() {
    let output = Command::cargo_bin("httplogd")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--listen", "--port", "--debug", "--nodaemon", "--daemon", "--spool"] {
        assert!(help.contains(flag), "missing {flag} in:\n{help}");
    }
}

#[test]
fn daemon_and_nodaemon_are_exclusive() {
    Command::cargo_bin("httplogd")
        .unwrap()
        .args(["-n", "-D"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_spool_exits_5_with_stats() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("httplogd")
        .unwrap()
        .arg("-s")
        .arg(dir.path().join("missing"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("spool directory"), "{stderr}");
    assert!(stderr.contains("stats: datagrams=0"), "{stderr}");
}

#[test]
fn spool_that_is_a_file_exits_5_with_stats() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("file");
    std::fs::write(&file, "").unwrap();

    let output = Command::cargo_bin("httplogd")
        .unwrap()
        .arg("-s")
        .arg(&file)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a directory"), "{stderr}");
    assert!(stderr.contains("stats:"), "{stderr}");
}

#[test]
fn port_in_use_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    Command::cargo_bin("httplogd")
        .unwrap()
        .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-s"])
        .arg(dir.path())
        .env("HTTPLOGD_BIND_RETRIES", "1")
        .assert()
        .code(1);
}
