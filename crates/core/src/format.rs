// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NCSA extended (combined) log line formatting.
//!
//! `host - user [dd/Mon/YYYY:HH:MM:SS +hhmm] "method uri proto" status bytes "referrer" "agent"`

use std::fmt::Write;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::entry::LogEntry;

/// strftime pattern for the bracketed timestamp, zone included.
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Format `epoch_secs` as `[dd/Mon/YYYY:HH:MM:SS ±hhmm]` in `tz`.
pub fn format_timestamp_in<Tz>(tz: &Tz, epoch_secs: i64) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(epoch_secs, 0).single() {
        Some(dt) => format!("[{}]", dt.format(TIMESTAMP_FORMAT)),
        None => {
            let dt = DateTime::<Utc>::from_timestamp(epoch_secs, 0).unwrap_or_default();
            format!("[{}]", dt.format(TIMESTAMP_FORMAT))
        }
    }
}

/// Format an entry as one output line (no trailing newline), local time.
pub fn format_line(entry: &LogEntry) -> String {
    format_line_in(&Local, entry)
}

/// Like [`format_line`] for an explicit time zone.
pub fn format_line_in<Tz>(tz: &Tz, entry: &LogEntry) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let user = match entry.user() {
        "" => "-",
        user => user,
    };

    let mut out = String::with_capacity(entry.raw().len() + 48);
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "{} - {} {} \"{} {} {}\" {} ",
        entry.host(),
        user,
        format_timestamp_in(tz, entry.received_at()),
        entry.method(),
        entry.uri(),
        entry.proto(),
        entry.status(),
    );
    match entry.bytes() {
        Some(bytes) => {
            let _ = write!(out, "{}", bytes);
        }
        None => out.push('-'),
    }
    let _ = write!(
        out,
        " \"{}\" \"{}\"",
        entry.referrer(),
        entry.user_agent()
    );
    out
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
