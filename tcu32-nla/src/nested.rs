use std::ops::{Deref, DerefMut};

use bytes::{BufMut, BytesMut};

use crate::{NLA_HEADER_SIZE, NlaBuffer, Result};

/// An open container attribute.
///
/// Holds the buffer exclusively while the container's contents are written. [`Nested::finish`]
/// back-patches the header length. Dropping the guard without finishing it, on an early `?`
/// return or an unwind, truncates the buffer back to where the container started.
#[derive(Debug)]
pub struct Nested<'a> {
    buf: &'a mut NlaBuffer,
    start: usize,
    finished: bool,
}

impl<'a> Nested<'a> {
    pub(crate) fn open(buf: &'a mut NlaBuffer, kind: u16) -> Self {
        let start = buf.position();

        // Placeholder length, patched in `finish`.
        let inner: &mut BytesMut = buf.as_mut();
        inner.put_u16_ne(0);
        inner.put_u16_ne(kind);

        Self { buf, start, finished: false }
    }

    /// Position of the container header in the buffer.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of payload bytes written into the container so far.
    pub fn payload_len(&self) -> usize {
        self.buf.position() - self.start - NLA_HEADER_SIZE
    }

    /// Closes the container, returning its header position.
    pub fn finish(mut self) -> Result<usize> {
        self.buf.back_patch_length(self.start)?;
        self.finished = true;
        Ok(self.start)
    }
}

impl Deref for Nested<'_> {
    type Target = NlaBuffer;

    fn deref(&self) -> &Self::Target {
        self.buf
    }
}

impl DerefMut for Nested<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf
    }
}

impl Drop for Nested<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::trace!(start = self.start, "discarding unfinished nested attribute");
            self.buf.truncate(self.start);
        }
    }
}
