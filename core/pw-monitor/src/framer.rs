//! Splits the `pw-dump -m` byte stream into whole snapshot documents.
//!
//! The producer gives no length prefix or delimiter. Each snapshot is a
//! pretty-printed JSON array followed by a newline, so a document boundary is
//! any newline after which the accumulated text ends in `]` and parses.
//! Nested arrays also close with `]` at end of line; those parse attempts fail
//! and accumulation simply continues.
//!
//! A `]` followed by a newline inside a string value would also trigger a
//! parse attempt. JSON strings cannot contain raw newlines, so that attempt
//! fails like any other incomplete buffer.

use serde_json::Value;
use std::io::{BufRead, ErrorKind, Read};
use tracing::debug;

use crate::error::FrameError;

/// Accumulates lines until they form a complete top-level array.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    max_bytes: Option<usize>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` leaves the buffer unbounded.
    pub fn with_limit(max_bytes: Option<usize>) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn remaining_capacity(&self) -> Option<usize> {
        self.max_bytes
            .map(|limit| limit.saturating_sub(self.buffer.len()))
    }

    /// Appends one line and returns the snapshot it completes, if any.
    ///
    /// `line` holds at most one newline, at its end. A line without a
    /// trailing newline (end of stream, or a capped read) is accumulated but
    /// never treated as a boundary.
    pub fn push_line(&mut self, line: &[u8]) -> Result<Option<Value>, FrameError> {
        self.buffer.extend_from_slice(line);

        if let Some(limit) = self.max_bytes {
            if self.buffer.len() > limit {
                self.buffer.clear();
                return Err(FrameError::Oversized { limit });
            }
        }

        if !line.ends_with(b"\n") {
            return Ok(None);
        }

        let candidate = trim_whitespace(&self.buffer);
        if !candidate.ends_with(b"]") {
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(candidate) {
            Ok(document) => {
                self.buffer.clear();
                Ok(Some(document))
            }
            Err(err) => {
                debug!(
                    error = %err,
                    buffered = self.buffer.len(),
                    "Snapshot not complete yet; continuing to accumulate"
                );
                Ok(None)
            }
        }
    }

    /// Pushes an arbitrary chunk of bytes, returning every snapshot it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Value>, FrameError> {
        let mut documents = Vec::new();
        for line in bytes.split_inclusive(|byte| *byte == b'\n') {
            if let Some(document) = self.push_line(line)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

/// Lazy sequence of snapshots read from a blocking reader.
///
/// Ends at end-of-stream. A read error or an oversized buffer is yielded once
/// and also ends the sequence. Build a new one per producer session.
pub struct SnapshotFrames<R> {
    reader: R,
    buffer: FrameBuffer,
    line: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> SnapshotFrames<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, None)
    }

    pub fn with_limit(reader: R, max_bytes: Option<usize>) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::with_limit(max_bytes),
            line: Vec::new(),
            finished: false,
        }
    }

    fn read_line(&mut self) -> std::io::Result<usize> {
        self.line.clear();
        match self.buffer.remaining_capacity() {
            // One byte past the cap so push_line sees the overflow.
            Some(remaining) => (&mut self.reader)
                .take((remaining as u64).saturating_add(1))
                .read_until(b'\n', &mut self.line),
            None => self.reader.read_until(b'\n', &mut self.line),
        }
    }
}

impl<R: BufRead> Iterator for SnapshotFrames<R> {
    type Item = Result<Value, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.read_line() {
                Ok(0) => {
                    self.finished = true;
                    if self.buffer.pending_len() > 0 {
                        debug!(
                            discarded = self.buffer.pending_len(),
                            "Snapshot feed closed with a partial document"
                        );
                    }
                    return None;
                }
                Ok(_) => match self.buffer.push_line(&self.line) {
                    Ok(Some(document)) => return Some(Ok(document)),
                    Ok(None) => continue,
                    Err(err) => {
                        self.finished = true;
                        return Some(Err(err));
                    }
                },
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(FrameError::Read(err)));
                }
            }
        }
    }
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |index| index + 1);
    &bytes[start..end]
}
