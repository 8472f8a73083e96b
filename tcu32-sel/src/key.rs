use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Size of a `tc_u32_key` record on the wire.
pub const KEY_RECORD_LEN: usize = 16;

/// A 32-bit match word: the classifier matches packets where the big-endian word at `offset`
/// equals `value` under `mask`.
///
/// From `<linux/pkt_cls.h>`:
///
/// ```c
/// struct tc_u32_key {
///     __be32 mask;
///     __be32 val;
///     int    off;
///     int    offmask;
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub mask: u32,
    pub value: u32,
    pub offset: i32,
    /// Always zero for keys built from key specifications.
    pub offset_mask: i32,
}

impl CanonicalKey {
    pub const fn new(mask: u32, value: u32, offset: i32) -> Self {
        Self { mask, value, offset, offset_mask: 0 }
    }

    /// Writes the 16-byte record: mask and value in network byte order, offsets in native
    /// byte order.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32(self.mask);
        dst.put_u32(self.value);
        dst.put_i32_ne(self.offset);
        dst.put_i32_ne(self.offset_mask);
    }

    /// Reads one 16-byte record.
    pub fn decode<B: Buf>(src: &mut B) -> Result<Self> {
        if src.remaining() < KEY_RECORD_LEN {
            return Err(Error::Truncated { needed: KEY_RECORD_LEN, remaining: src.remaining() });
        }

        Ok(Self {
            mask: src.get_u32(),
            value: src.get_u32(),
            offset: src.get_i32_ne(),
            offset_mask: src.get_i32_ne(),
        })
    }
}

/// Formats the key the way `tc filter show` does, e.g. `00060000/00ff0000 + 8`.
impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}/{:08x} + {}", self.value, self.mask, self.offset)?;
        if self.offset_mask != 0 {
            write!(f, " at nexthdr+{}", self.offset_mask)?;
        }
        Ok(())
    }
}
