use core::fmt;

use bstr::ByteSlice;

/// Append-only store of the bytes received from a source so far.
///
/// Offsets are absolute from the start of the input. Bytes are never
/// rewritten; the only way back is [`RawBuffer::clear`], used when the source
/// was truncated or replaced underneath a tail-watch.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    bytes: Vec<u8>,
    complete: bool,
}

impl RawBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer holding all of `bytes`, already marked complete.
    #[must_use]
    pub fn complete_from(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            complete: true,
        }
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        debug_assert!(!self.complete || bytes.is_empty(), "append after EOF");
        self.bytes.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes in `start..end`, clamped to what has been received.
    #[must_use]
    pub fn range(&self, start: usize, end: usize) -> &[u8] {
        let end = end.min(self.bytes.len());
        &self.bytes[start.min(end)..end]
    }

    /// Whether the source has signalled end of input.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Drops all bytes. Only valid when the source is being re-read from
    /// offset zero.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.complete = false;
    }
}

impl fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("bytes", &self.bytes.as_bstr())
            .field("complete", &self.complete)
            .finish()
    }
}

impl From<&[u8]> for RawBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            complete: false,
        }
    }
}

impl From<&str> for RawBuffer {
    fn from(text: &str) -> Self {
        text.as_bytes().into()
    }
}
