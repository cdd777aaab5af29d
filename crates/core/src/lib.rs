// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hl-core: access-log records and the pure logic shared by the daemon

pub mod batch;
pub mod clock;
pub mod entry;
pub mod format;
pub mod layout;
pub mod parser;
pub mod rollover;

pub use batch::{BatchBuffer, BatchFull, DEFAULT_BATCH_SIZE};
pub use clock::{Clock, FakeClock, SystemClock};
pub use entry::{FieldSpan, LogEntry};
pub use format::format_line;
pub use layout::{hash_path, SpoolLayout};
pub use parser::{parse, Field, ParseError, FIELD_SEPARATOR, MAX_LINE_SIZE};
pub use rollover::{RolledOver, Rollover};
