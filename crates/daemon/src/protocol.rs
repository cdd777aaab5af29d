// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format of the controller → writer channel.
//!
//! Each frame is:
//!
//! ```text
//! kind: u8 | path_len: u32 BE | path | payload_len: u32 BE | payload
//! ```
//!
//! A write record carries the relative log path and one formatted line
//! without its newline. A close record has an empty path and an 8-byte
//! big-endian cutoff timestamp as payload.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("Path too long: {size} bytes (max {max})")]
    PathTooLong { size: usize, max: usize },

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Close record payload must be {expected} bytes, got {size}")]
    BadCutoff { size: usize, expected: usize },

    #[error("Path is not valid UTF-8")]
    InvalidPath,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Largest relative path carried by a write record.
pub const MAX_PATH_SIZE: usize = 4096;

/// Largest payload (one formatted line).
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024;

const KIND_WRITE: u8 = 1;
const KIND_CLOSE: u8 = 2;
const CUTOFF_SIZE: usize = std::mem::size_of::<i64>();

/// One message for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Append `line` plus a newline to `path` (relative to the spool).
    Write { path: String, line: String },
    /// Close every cached descriptor last used before `cutoff`.
    Close { cutoff: i64 },
}

impl Message {
    pub fn write(path: impl Into<String>, line: impl Into<String>) -> Self {
        Message::Write {
            path: path.into(),
            line: line.into(),
        }
    }
}

/// Encode a message into one frame.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let (kind, path, payload): (u8, &[u8], std::borrow::Cow<'_, [u8]>) = match msg {
        Message::Write { path, line } => (KIND_WRITE, path.as_bytes(), line.as_bytes().into()),
        Message::Close { cutoff } => (KIND_CLOSE, &[], cutoff.to_be_bytes().to_vec().into()),
    };
    check_sizes(path.len(), payload.len())?;

    let mut frame = Vec::with_capacity(1 + 4 + path.len() + 4 + payload.len());
    frame.push(kind);
    frame.extend_from_slice(&(path.len() as u32).to_be_bytes());
    frame.extend_from_slice(path);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one complete frame.
pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
    let mut reader = frame;
    read_message(&mut reader)
}

/// Read one message, accumulating partial reads.
///
/// EOF before the first byte of a frame is a clean close
/// ([`ProtocolError::ConnectionClosed`]); EOF inside a frame is an I/O error.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
    let mut kind = [0u8; 1];
    if !read_frame_start(reader, &mut kind)? {
        return Err(ProtocolError::ConnectionClosed);
    }
    let kind = kind[0];
    if kind != KIND_WRITE && kind != KIND_CLOSE {
        return Err(ProtocolError::UnknownKind(kind));
    }

    let path_len = read_len(reader)?;
    if path_len > MAX_PATH_SIZE {
        return Err(ProtocolError::PathTooLong {
            size: path_len,
            max: MAX_PATH_SIZE,
        });
    }
    let path = read_exact_vec(reader, path_len)?;

    let payload_len = read_len(reader)?;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let payload = read_exact_vec(reader, payload_len)?;

    match kind {
        KIND_CLOSE => {
            let bytes: [u8; CUTOFF_SIZE] =
                payload
                    .as_slice()
                    .try_into()
                    .map_err(|_| ProtocolError::BadCutoff {
                        size: payload.len(),
                        expected: CUTOFF_SIZE,
                    })?;
            Ok(Message::Close {
                cutoff: i64::from_be_bytes(bytes),
            })
        }
        _ => {
            let path = String::from_utf8(path).map_err(|_| ProtocolError::InvalidPath)?;
            let line = String::from_utf8_lossy(&payload).into_owned();
            Ok(Message::Write { path, line })
        }
    }
}

/// Encode and write one message.
pub fn write_message<W: Write>(writer: &mut W, msg: &Message) -> Result<(), ProtocolError> {
    let frame = encode(msg)?;
    write_frame(writer, &frame)
}

/// Write all of `frame`, retrying transient conditions with the unsent
/// remainder. Any other error is returned.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError> {
    let mut rest = frame;
    while !rest.is_empty() {
        match writer.write(rest) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => rest = &rest[n..],
            Err(e) if is_transient(&e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    std::thread::yield_now();
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    writer.flush()?;
    Ok(())
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn check_sizes(path: usize, payload: usize) -> Result<(), ProtocolError> {
    if path > MAX_PATH_SIZE {
        return Err(ProtocolError::PathTooLong {
            size: path,
            max: MAX_PATH_SIZE,
        });
    }
    if payload > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: payload,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

/// Fill `buf` from the start of a frame. Returns `false` on EOF before any
/// byte was read.
fn read_frame_start<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ProtocolError> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize, ProtocolError> {
    let mut len_buf = [0u8; 4];
    read_full(reader, &mut len_buf)?;
    Ok(u32::from_be_bytes(len_buf) as usize)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; len];
    read_full(reader, &mut buf)?;
    Ok(buf)
}

/// Like `read_exact`, but also retries `WouldBlock`.
fn read_full<R: Read>(reader: &mut R, mut buf: &mut [u8]) -> Result<(), ProtocolError> {
    while !buf.is_empty() {
        match reader.read(buf) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => buf = &mut buf[n..],
            Err(e) if is_transient(&e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    std::thread::yield_now();
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
