//! Bounded inbound buffer
//!
//! A single fixed-capacity buffer is reused for every inbound payload:
//! ```text
//! [ 0 .. len : valid payload ][ len .. capacity : stale / zero ]
//! ```
//!
//! Writes larger than the capacity are rejected before any byte is copied.

use bytes::Buf;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while filling the buffer
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("Payload too large: {len} bytes (capacity: {capacity})")]
    Overflow { len: usize, capacity: usize },

    #[error("Not enough data: need {needed} bytes, have {available}")]
    NotEnoughData { needed: usize, available: usize },
}

/// Fixed-capacity byte buffer holding the most recent payload
#[derive(Debug)]
pub struct InboundBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl InboundBuffer {
    /// Create a zeroed buffer of the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Logical length of the current payload
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy exactly `len` bytes from `src` into the buffer.
    ///
    /// A zero-length fill leaves the buffer untouched. On error neither the
    /// buffer nor `src` is modified.
    pub fn fill_from<B: Buf>(&mut self, src: &mut B, len: usize) -> Result<usize, BufferError> {
        if len > self.capacity() {
            return Err(BufferError::Overflow {
                len,
                capacity: self.capacity(),
            });
        }
        if len > src.remaining() {
            return Err(BufferError::NotEnoughData {
                needed: len,
                available: src.remaining(),
            });
        }
        if len == 0 {
            return Ok(0);
        }

        src.copy_to_slice(&mut self.data[..len]);
        self.len = len;
        Ok(len)
    }

    /// Valid bytes of the current payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len.min(self.capacity())]
    }

    /// Command view bounded by the logical length
    pub fn command(&self) -> CommandString<'_> {
        CommandString::new(self.as_bytes())
    }
}

/// Length-bounded text view over a received payload.
///
/// Never scans for a terminator: embedded NUL bytes are part of the view.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandString<'a> {
    bytes: &'a [u8],
}

impl<'a> CommandString<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Text form; invalid UTF-8 sequences are replaced
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

impl<'a> From<&'a str> for CommandString<'a> {
    fn from(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Debug for CommandString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandString({:?})", self.text())
    }
}

impl fmt::Display for CommandString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
