//! Netlink attribute (NLA) encoding and decoding.
//!
//! Netlink uses a TLV (Type-Length-Value) format for attributes. Attributes can nest: the value
//! of a container attribute is itself a sequence of attributes.
//!
//! # NLA Header Format
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Length (2 bytes) │  Type (2 bytes)     │  <- NLA header (4 bytes)
//! ├─────────────────────────────────────────┤
//! │  Value (variable length, padded to 4)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The length covers the header and the value, but not the trailing padding. Both header fields
//! are in native byte order.
//!
//! Reference: <linux/netlink.h>

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

mod nested;
pub use nested::Nested;

/// Size of the NLA header (length + type).
pub const NLA_HEADER_SIZE: usize = 4;

/// Attributes are aligned to 4 bytes.
pub const NLA_ALIGNTO: usize = 4;

/// Set on the type of attributes that carry nested attributes.
pub const NLA_F_NESTED: u16 = 1 << 15;

/// Set on the type of attributes whose payload is in network byte order.
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;

/// Mask of the type bits, without the flags above.
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Round `len` up to the attribute alignment.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Errors writing or reading attributes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Fewer than [`NLA_HEADER_SIZE`] bytes were left.
    #[error("attribute header truncated: {remaining} bytes left")]
    TruncatedHeader { remaining: usize },
    /// The header length is shorter than the header or runs past the buffer.
    #[error("attribute length {len} is invalid with {remaining} bytes left")]
    InvalidLength { len: usize, remaining: usize },
    /// The attribute does not fit in the 16-bit length field.
    #[error("attribute of {len} bytes exceeds the maximum length of {}", u16::MAX)]
    TooLarge { len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A growable attribute buffer with a write cursor.
///
/// The cursor is always the end of the buffer; attributes are appended and container headers are
/// back-patched once their contents have been written.
#[derive(Debug, Default, Clone)]
pub struct NlaBuffer {
    buf: BytesMut,
}

impl NlaBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    /// Returns the current write position.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Appends raw bytes at the cursor.
    #[inline]
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Appends a complete attribute (header + value + padding).
    pub fn put_attr(&mut self, kind: u16, value: &[u8]) -> Result<()> {
        let nla_len = NLA_HEADER_SIZE + value.len();
        let len = u16::try_from(nla_len).map_err(|_| Error::TooLarge { len: nla_len })?;

        self.buf.reserve(nla_align(nla_len));
        self.buf.put_u16_ne(len);
        self.buf.put_u16_ne(kind);
        self.buf.put_slice(value);
        self.pad();

        Ok(())
    }

    /// Appends a `u32` attribute in native byte order.
    pub fn put_u32_attr(&mut self, kind: u16, value: u32) -> Result<()> {
        self.put_attr(kind, &value.to_ne_bytes())
    }

    /// Opens a container attribute of the given type.
    ///
    /// The returned guard holds the buffer exclusively until it is finished or dropped. See
    /// [`Nested`].
    pub fn nested(&mut self, kind: u16) -> Nested<'_> {
        Nested::open(self, kind)
    }

    /// Writes a container attribute whose contents are produced by `f`.
    ///
    /// If `f` fails, everything written since the container header (the header included) is
    /// discarded and the error is returned.
    pub fn encode_nested<F, E>(&mut self, kind: u16, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut NlaBuffer) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let mut nested = self.nested(kind);
        f(&mut *nested)?;
        nested.finish()?;
        Ok(())
    }

    /// Patches the length field of the attribute header at `start` to cover everything written
    /// since, then pads the buffer to the attribute alignment.
    pub fn back_patch_length(&mut self, start: usize) -> Result<()> {
        let nla_len = self.position() - start;
        let len = u16::try_from(nla_len).map_err(|_| Error::TooLarge { len: nla_len })?;

        self.buf[start..start + 2].copy_from_slice(&len.to_ne_bytes());
        self.pad();

        Ok(())
    }

    /// Discards everything written after `position`.
    pub fn truncate(&mut self, position: usize) {
        self.buf.truncate(position);
    }

    fn pad(&mut self) {
        let padded = nla_align(self.buf.len());
        self.buf.resize(padded, 0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

impl AsMut<BytesMut> for NlaBuffer {
    fn as_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

/// A single decoded attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nla {
    /// The attribute type, with the nested and byte-order flags masked off.
    pub kind: u16,
    /// The attribute value, without header or padding.
    pub value: Bytes,
}

impl Nla {
    /// Creates an attribute of type `kind`.
    pub fn new(kind: u16, value: impl Into<Bytes>) -> Self {
        Self { kind, value: value.into() }
    }

    /// Encodes this attribute into `buf`.
    pub fn encode(&self, buf: &mut NlaBuffer) -> Result<()> {
        buf.put_attr(self.kind, &self.value)
    }
}

/// Pops one attribute off the front of `src`, consuming its padding.
pub fn decode_nested(src: &mut Bytes) -> Result<Nla> {
    if src.remaining() < NLA_HEADER_SIZE {
        return Err(Error::TruncatedHeader { remaining: src.remaining() });
    }

    let len = u16::from_ne_bytes([src[0], src[1]]) as usize;
    let kind = u16::from_ne_bytes([src[2], src[3]]) & NLA_TYPE_MASK;

    if len < NLA_HEADER_SIZE || len > src.remaining() {
        return Err(Error::InvalidLength { len, remaining: src.remaining() });
    }

    let mut attr = src.split_to(len);
    attr.advance(NLA_HEADER_SIZE);

    // The last attribute in a buffer may come without its padding.
    let padding = nla_align(len) - len;
    src.advance(padding.min(src.remaining()));

    Ok(Nla { kind, value: attr })
}

/// Iterator over the attributes of a buffer.
///
/// Yields an error once and then stops if the buffer is malformed.
#[derive(Debug, Clone)]
pub struct NlaIter {
    buf: Bytes,
    failed: bool,
}

impl NlaIter {
    /// Iterates over the attributes in `buf`.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into(), failed: false }
    }
}

impl Iterator for NlaIter {
    type Item = Result<Nla>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }

        let nla = decode_nested(&mut self.buf);
        self.failed = nla.is_err();
        Some(nla)
    }
}
