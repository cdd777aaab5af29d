// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed access-log record.
//!
//! A [`LogEntry`] owns one immutable copy of the raw line and describes each
//! field as a [`FieldSpan`] into it, so parsing allocates once per line.

/// Byte range of one field inside the raw line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSpan {
    start: u32,
    len: u32,
}

impl FieldSpan {
    /// Span covering `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        let len = end.saturating_sub(start);
        Self {
            start: start as u32,
            len: len as u32,
        }
    }

    pub fn start(&self) -> usize {
        self.start as usize
    }

    pub fn end(&self) -> usize {
        (self.start + self.len) as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolve the span against the line it was taken from.
    pub fn slice<'a>(&self, raw: &'a str) -> &'a str {
        raw.get(self.start()..self.end()).unwrap_or("")
    }
}

/// Field spans produced by the parser, in line order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Spans {
    pub host: FieldSpan,
    pub ident: FieldSpan,
    pub user: FieldSpan,
    pub vhost: FieldSpan,
    pub referrer: FieldSpan,
    pub user_agent: FieldSpan,
    pub method: FieldSpan,
    pub uri: FieldSpan,
    pub proto: FieldSpan,
}

/// One request record received from a web server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    raw: Box<str>,
    received_at: i64,
    status: u32,
    bytes: Option<u64>,
    spans: Spans,
}

impl LogEntry {
    pub(crate) fn new(
        raw: Box<str>,
        received_at: i64,
        status: u32,
        bytes: Option<u64>,
        spans: Spans,
    ) -> Self {
        Self {
            raw,
            received_at,
            status,
            bytes,
            spans,
        }
    }

    /// The original line, kept for diagnostics.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Receipt time in seconds since the epoch.
    pub fn received_at(&self) -> i64 {
        self.received_at
    }

    /// HTTP status; `0` when the server logged `-`.
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Bytes sent in the reply; `None` when the server logged `-`.
    pub fn bytes(&self) -> Option<u64> {
        self.bytes
    }

    pub fn host(&self) -> &str {
        self.spans.host.slice(&self.raw)
    }

    /// identd remote user, usually `-`.
    pub fn ident(&self) -> &str {
        self.spans.ident.slice(&self.raw)
    }

    /// Authenticated user; may be empty.
    pub fn user(&self) -> &str {
        self.spans.user.slice(&self.raw)
    }

    pub fn vhost(&self) -> &str {
        self.spans.vhost.slice(&self.raw)
    }

    pub fn referrer(&self) -> &str {
        self.spans.referrer.slice(&self.raw)
    }

    pub fn user_agent(&self) -> &str {
        self.spans.user_agent.slice(&self.raw)
    }

    pub fn method(&self) -> &str {
        self.spans.method.slice(&self.raw)
    }

    pub fn uri(&self) -> &str {
        self.spans.uri.slice(&self.raw)
    }

    /// Protocol string as sent; not validated.
    pub fn proto(&self) -> &str {
        self.spans.proto.slice(&self.raw)
    }
}
