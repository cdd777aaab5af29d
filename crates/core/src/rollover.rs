// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Date-derived log file name.
//!
//! The active name is `YYYY-MM-DD.log` for the local day. It is recomputed
//! on first use and whenever the clock passes the next local midnight.

use chrono::{Days, Local, NaiveTime, TimeZone};

/// strftime pattern of the active log file name.
pub const LOG_FILE_FORMAT: &str = "%Y-%m-%d.log";

/// Result of [`Rollover::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolledOver {
    /// Name in effect before the rollover; `None` on first use.
    pub previous: Option<String>,
    /// Newly active name.
    pub name: String,
    /// Descriptors last used before this instant belong to old names. The
    /// rollover second itself is included, so lines flushed under the old
    /// name just before the switch are covered.
    pub cutoff: i64,
}

/// Tracks the active log file name for one time zone.
#[derive(Debug, Clone)]
pub struct Rollover<Tz: TimeZone = Local> {
    tz: Tz,
    name: Option<String>,
    /// Epoch seconds of the next midnight.
    threshold: i64,
}

impl Rollover<Local> {
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl<Tz> Rollover<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            name: None,
            threshold: i64::MIN,
        }
    }

    /// Active name, if one was computed yet.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// True when the name must be recomputed at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.name.is_none() || now > self.threshold
    }

    /// Recompute the name if due.
    pub fn advance(&mut self, now: i64) -> Option<RolledOver> {
        if !self.is_due(now) {
            return None;
        }

        let at = self
            .tz
            .timestamp_opt(now, 0)
            .earliest()
            .unwrap_or_else(|| self.tz.timestamp_nanos(0));
        let name = at.format(LOG_FILE_FORMAT).to_string();
        self.threshold = next_midnight(&self.tz, &at.date_naive()).unwrap_or(now.saturating_add(86_400));

        let previous = self.name.replace(name.clone());
        Some(RolledOver {
            previous,
            name,
            cutoff: now.saturating_add(1),
        })
    }
}

/// Epoch seconds of the first instant of the day after `day` in `tz`.
fn next_midnight<Tz: TimeZone>(tz: &Tz, day: &chrono::NaiveDate) -> Option<i64> {
    let next = day.checked_add_days(Days::new(1))?;
    let midnight = next.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
}

#[cfg(test)]
#[path = "rollover_tests.rs"]
mod tests;
