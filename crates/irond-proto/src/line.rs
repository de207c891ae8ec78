//! Inbound line framing.
//!
//! Bytes arrive from the socket in arbitrary chunks; [`LineBuffer`]
//! accumulates them and hands back complete lines. Lines terminate with
//! `\r\n`, with a bare `\n` accepted for leniency. A line may be at
//! most 512 bytes including its terminator; when that is exceeded
//! before a terminator arrives the buffer discards input up to and
//! including the next terminator and reports the overrun once.
//!
//! Length limits apply to the unterminated line-in-progress only.
//! Complete lines sitting in the buffer are never at risk; callers
//! drain them with [`next_line`](LineBuffer::next_line) after each
//! read.

use bytes::BytesMut;

/// Maximum line length in bytes, terminator included.
pub const MAX_LINE_LEN: usize = 512;

/// Hard cap on buffered unterminated input. The framer discards an
/// unterminated line as soon as it passes [`MAX_LINE_LEN`], so a caller
/// that drains after every read keeps the buffer well under this.
pub const MAX_INBUF_LEN: usize = 8 * 1024;

/// One extraction from the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// A complete line, terminator and trailing `\r` stripped.
    Line(String),
    /// An over-long line was discarded; emitted once recovery is
    /// complete (the terminator was seen and consumed).
    Oversize,
}

/// Accumulating line framer for one connection.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Scan cursor: no terminator exists before this index.
    next_index: usize,
    discarding: bool,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> LineBuffer {
        LineBuffer::default()
    }

    /// Append bytes read from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Extract the next complete line, if any.
    ///
    /// Empty lines and lines that are not valid UTF-8 are skipped
    /// silently.
    pub fn next_line(&mut self) -> Option<LineOutcome> {
        loop {
            let newline = self.buf[self.next_index..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| self.next_index + i);

            if self.discarding {
                match newline {
                    Some(i) => {
                        let _ = self.buf.split_to(i + 1);
                        self.next_index = 0;
                        self.discarding = false;
                        return Some(LineOutcome::Oversize);
                    }
                    None => {
                        self.buf.clear();
                        self.next_index = 0;
                        return None;
                    }
                }
            }

            match newline {
                Some(i) => {
                    let raw = self.buf.split_to(i + 1);
                    self.next_index = 0;
                    if raw.len() > MAX_LINE_LEN {
                        return Some(LineOutcome::Oversize);
                    }
                    let mut end = raw.len() - 1;
                    if end > 0 && raw[end - 1] == b'\r' {
                        end -= 1;
                    }
                    if end == 0 {
                        continue;
                    }
                    match std::str::from_utf8(&raw[..end]) {
                        Ok(s) => return Some(LineOutcome::Line(s.to_string())),
                        Err(_) => continue,
                    }
                }
                None => {
                    // No terminator anywhere: the whole buffer is one
                    // line-in-progress.
                    self.next_index = self.buf.len();
                    if self.buf.len() > MAX_LINE_LEN {
                        self.buf.clear();
                        self.next_index = 0;
                        self.discarding = true;
                    }
                    return None;
                }
            }
        }
    }
}
