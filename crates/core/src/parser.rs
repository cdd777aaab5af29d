// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-log line parser.
//!
//! Lines follow the web server format
//! `%a\t%l\t%u\t%s\t%b\t%v\t%r\t%{Referer}i\t%{User-agent}i`, where the
//! request field `%r` is itself `method uri protocol` separated by spaces.
//!
//! Parsing is a single left-to-right pass. The first missing separator stops
//! it and the line is rejected; a malformed line never affects other lines.

use std::fmt;

use thiserror::Error;

use crate::entry::{FieldSpan, LogEntry, Spans};

/// Separator between top-level fields.
pub const FIELD_SEPARATOR: u8 = b'\t';

/// Separator inside the request field.
pub const REQUEST_SEPARATOR: u8 = b' ';

/// Largest accepted line, in bytes.
pub const MAX_LINE_SIZE: usize = 2048;

/// Field whose terminating separator was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Host,
    Ident,
    User,
    Status,
    Bytes,
    VirtualHost,
    Request,
    Referrer,
    Method,
    Uri,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Host => "host",
            Field::Ident => "ident",
            Field::User => "user",
            Field::Status => "status",
            Field::Bytes => "bytes",
            Field::VirtualHost => "vhost",
            Field::Request => "request",
            Field::Referrer => "referrer",
            Field::Method => "method",
            Field::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// A line that could not be understood.
///
/// `annotated` is the raw line with every separator consumed so far shown as
/// `'` and the position where parsing stopped marked with `^`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ignoring line: no separator after {field} (pos {position}) in \"{annotated}\"")]
pub struct ParseError {
    pub field: Field,
    pub position: usize,
    pub annotated: String,
}

/// Parse one raw line received at `received_at` (epoch seconds).
///
/// Invalid UTF-8 is replaced, and one trailing line terminator is dropped.
pub fn parse(raw: &[u8], received_at: i64) -> Result<LogEntry, ParseError> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\n').unwrap_or(&line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line: Box<str> = line.into();

    let mut cursor = Cursor::new(&line);
    let spans = match parse_fields(&mut cursor) {
        Ok(parsed) => parsed,
        Err(field) => {
            let position = cursor.pos;
            return Err(ParseError {
                field,
                position,
                annotated: cursor.annotate(),
            });
        }
    };

    let (spans, status, bytes) = spans;
    Ok(LogEntry::new(line, received_at, status, bytes, spans))
}

type Parsed = (Spans, u32, Option<u64>);

fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Parsed, Field> {
    let mut spans = Spans::default();
    let end = cursor.line.len();

    spans.host = cursor.field(FIELD_SEPARATOR, end, Field::Host)?;
    spans.ident = cursor.field(FIELD_SEPARATOR, end, Field::Ident)?;
    spans.user = cursor.field(FIELD_SEPARATOR, end, Field::User)?;
    let status = cursor.field(FIELD_SEPARATOR, end, Field::Status)?;
    let bytes = cursor.field(FIELD_SEPARATOR, end, Field::Bytes)?;
    spans.vhost = cursor.field(FIELD_SEPARATOR, end, Field::VirtualHost)?;
    let request = cursor.field(FIELD_SEPARATOR, end, Field::Request)?;
    spans.referrer = cursor.field(FIELD_SEPARATOR, end, Field::Referrer)?;
    // The agent is the last field; a trailing separator is optional.
    spans.user_agent = cursor.rest(FIELD_SEPARATOR, end);

    cursor.pos = request.start();
    spans.method = cursor.field(REQUEST_SEPARATOR, request.end(), Field::Method)?;
    spans.uri = cursor.field(REQUEST_SEPARATOR, request.end(), Field::Uri)?;
    spans.proto = FieldSpan::new(cursor.pos, request.end());

    let status = leading_number(status.slice(cursor.line))
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);
    let bytes = bytes.slice(cursor.line);
    let bytes = if bytes.starts_with('-') {
        None
    } else {
        Some(leading_number(bytes).unwrap_or(0))
    };

    Ok((spans, status, bytes))
}

/// Value of the leading decimal digits, `atoi` style.
fn leading_number(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    s.get(..digits)?.parse().ok()
}

struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    /// Offsets of separators consumed so far.
    consumed: Vec<usize>,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            pos: 0,
            consumed: Vec::with_capacity(12),
        }
    }

    /// Take the field starting at the cursor and ending at the next `sep`
    /// before `end`. On failure the cursor stays at the field start.
    fn field(&mut self, sep: u8, end: usize, which: Field) -> Result<FieldSpan, Field> {
        let haystack = self.line.as_bytes().get(self.pos..end).unwrap_or_default();
        let offset = haystack.iter().position(|&b| b == sep).ok_or(which)?;
        let span = FieldSpan::new(self.pos, self.pos + offset);
        self.consumed.push(self.pos + offset);
        self.pos += offset + 1;
        Ok(span)
    }

    /// Take everything up to the next `sep`, or to `end` if there is none.
    fn rest(&mut self, sep: u8, end: usize) -> FieldSpan {
        let haystack = self.line.as_bytes().get(self.pos..end).unwrap_or_default();
        match haystack.iter().position(|&b| b == sep) {
            Some(offset) => {
                let span = FieldSpan::new(self.pos, self.pos + offset);
                self.consumed.push(self.pos + offset);
                self.pos += offset + 1;
                span
            }
            None => {
                let span = FieldSpan::new(self.pos, end);
                self.pos = end;
                span
            }
        }
    }

    fn annotate(&self) -> String {
        let mut out = String::with_capacity(self.line.len() + 1);
        for (idx, c) in self.line.char_indices() {
            if idx == self.pos {
                out.push('^');
            } else if self.consumed.contains(&idx) {
                out.push('\'');
            } else {
                out.push(c);
            }
        }
        if self.pos >= self.line.len() {
            out.push('^');
        }
        out
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
