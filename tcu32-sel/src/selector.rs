use bytes::{Buf, BufMut, BytesMut};
use tcu32_nla::NlaBuffer;

use crate::{
    canonical::canonicalize,
    error::{Error, Result},
    key::{CanonicalKey, KEY_RECORD_LEN},
    spec::ParsedKey,
    table::ByteMaskTable,
};

/// Size of the `tc_u32_sel` header, without keys.
pub const SELECTOR_HEADER_LEN: usize = 16;

/// Marks a u32 filter as terminal - required for the filter to return a classification result.
pub const TC_U32_TERMINAL: u8 = 1;

/// Maximum number of keys, bounded by the 1-byte `nkeys` field.
pub const MAX_KEYS: usize = u8::MAX as usize;

/// The kernel's `tc_u32_sel` structure and its keys.
///
/// From `<linux/pkt_cls.h>`:
///
/// ```c
/// struct tc_u32_sel {
///     unsigned char      flags;
///     unsigned char      offshift;
///     unsigned char      nkeys;
///
///     __be16             offmask;
///     __u16              off;
///     short              offoff;
///
///     short              hoff;
///     __be32             hmask;
///     struct tc_u32_key  keys[];
/// };
/// ```
///
/// `off`, `offoff` and `hoff` are written little-endian, the byte order of every host tc runs
/// on in practice. `nkeys` is not stored; it is always the length of [`SelectorRecord::keys`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorRecord {
    /// Selector flags. Selectors built from key specifications are [`TC_U32_TERMINAL`].
    pub flags: u8,
    /// Offset shift (usually 0).
    pub off_shift: u8,
    /// Offset mask (usually 0).
    pub off_mask: u16,
    /// Fixed offset (usually 0).
    pub off: u16,
    /// Offset of the variable offset field (usually 0).
    pub off_off: i16,
    /// Hash table offset (usually 0).
    pub h_off: i16,
    /// Hash mask (usually 0).
    pub h_mask: u32,
    keys: Vec<CanonicalKey>,
}

impl SelectorRecord {
    /// Creates a selector with the given keys and all header fields zero.
    pub fn new(keys: Vec<CanonicalKey>) -> Self {
        Self { keys, ..Default::default() }
    }

    /// Builds a terminal selector from key specifications such as `0x0006/0x00ff+8`.
    ///
    /// Specifications with both value and mask zero are kept as literal keys, in the order given,
    /// ahead of the keys compiled from all other specifications.
    ///
    /// # Errors
    /// - [`Error::InvalidKeySpec`] if any specification is malformed
    /// - [`Error::OffsetOutOfRange`] if a matched byte falls outside the first 256 bytes
    /// - [`Error::EmptyKeySet`] if no keys result
    /// - [`Error::TooManyKeys`] if more than [`MAX_KEYS`] keys result
    pub fn from_specs<I, S>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = compile_keys(specs)?;
        Ok(Self { flags: TC_U32_TERMINAL, keys, ..Default::default() })
    }

    /// Set the selector flags.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Set the shift applied to the variable offset word.
    pub fn with_off_shift(mut self, off_shift: u8) -> Self {
        self.off_shift = off_shift;
        self
    }

    /// Set the mask applied to the variable offset word.
    pub fn with_off_mask(mut self, off_mask: u16) -> Self {
        self.off_mask = off_mask;
        self
    }

    /// Set the fixed offset added to the next header.
    pub fn with_off(mut self, off: u16) -> Self {
        self.off = off;
        self
    }

    /// Set where the variable offset word is read from.
    pub fn with_off_off(mut self, off_off: i16) -> Self {
        self.off_off = off_off;
        self
    }

    /// Set where the hash key word is read from.
    pub fn with_h_off(mut self, h_off: i16) -> Self {
        self.h_off = h_off;
        self
    }

    /// Set the mask applied to the hash key word.
    pub fn with_h_mask(mut self, h_mask: u32) -> Self {
        self.h_mask = h_mask;
        self
    }

    /// The match keys, in wire order.
    #[inline]
    pub fn keys(&self) -> &[CanonicalKey] {
        &self.keys
    }

    #[inline]
    pub fn keys_mut(&mut self) -> &mut Vec<CanonicalKey> {
        &mut self.keys
    }

    #[inline]
    pub fn into_keys(self) -> Vec<CanonicalKey> {
        self.keys
    }

    /// Number of keys, as written to the `nkeys` header field.
    #[inline]
    pub fn nkeys(&self) -> usize {
        self.keys.len()
    }

    /// Length of the encoded selector in bytes.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        SELECTOR_HEADER_LEN + self.keys.len() * KEY_RECORD_LEN
    }

    /// Writes the header followed by every key.
    ///
    /// Nothing is written if the key list is empty or too long.
    pub fn encode<B: BufMut>(&self, dst: &mut B) -> Result<()> {
        let nkeys = self.checked_nkeys()?;

        dst.put_u8(self.flags);
        dst.put_u8(self.off_shift);
        dst.put_u8(nkeys);
        dst.put_u8(0); // padding
        dst.put_u16(self.off_mask);
        dst.put_u16_le(self.off);
        dst.put_i16_le(self.off_off);
        dst.put_i16_le(self.h_off);
        dst.put_u32(self.h_mask);

        for key in &self.keys {
            key.encode(&mut *dst);
        }

        Ok(())
    }

    /// Writes the selector as an attribute of type `kind`, back-patching the attribute length
    /// once all keys are written. On error the buffer is left as it was.
    pub fn encode_attr(&self, buf: &mut NlaBuffer, kind: u16) -> Result<()> {
        let mut nested = buf.nested(kind);
        self.encode::<BytesMut>(nested.as_mut())?;
        let start = nested.finish()?;

        tracing::debug!(start, nkeys = self.keys.len(), flags = self.flags, "encoded selector");

        Ok(())
    }

    /// Reads a header and then exactly `nkeys` key records.
    pub fn decode<B: Buf>(src: &mut B) -> Result<Self> {
        if src.remaining() < SELECTOR_HEADER_LEN {
            return Err(Error::Truncated {
                needed: SELECTOR_HEADER_LEN,
                remaining: src.remaining(),
            });
        }

        let flags = src.get_u8();
        let off_shift = src.get_u8();
        let nkeys = src.get_u8() as usize;
        src.advance(1); // padding
        let off_mask = src.get_u16();
        let off = src.get_u16_le();
        let off_off = src.get_i16_le();
        let h_off = src.get_i16_le();
        let h_mask = src.get_u32();

        let needed = nkeys * KEY_RECORD_LEN;
        if src.remaining() < needed {
            return Err(Error::Truncated { needed, remaining: src.remaining() });
        }

        let keys =
            (0..nkeys).map(|_| CanonicalKey::decode(&mut *src)).collect::<Result<Vec<_>>>()?;

        tracing::debug!(nkeys, flags, "decoded u32 selector");

        Ok(Self { flags, off_shift, off_mask, off, off_off, h_off, h_mask, keys })
    }

    /// Decodes a selector from an attribute value.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::decode(&mut bytes)
    }

    fn checked_nkeys(&self) -> Result<u8> {
        match self.keys.len() {
            0 => Err(Error::EmptyKeySet),
            n => u8::try_from(n).map_err(|_| Error::TooManyKeys(n)),
        }
    }
}

/// Compiles key specifications into match words.
///
/// All-zero specifications come first, as literal keys in the order given; the remaining
/// specifications are projected into a [`ByteMaskTable`] and regrouped by [`canonicalize`].
pub fn compile_keys<I, S>(specs: I) -> Result<Vec<CanonicalKey>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keys = Vec::new();
    let mut table = ByteMaskTable::new();

    for spec in specs {
        let parsed = ParsedKey::parse(spec.as_ref())?;
        if parsed.is_reservation() {
            keys.push(CanonicalKey::new(0, 0, parsed.offset));
        }
        table.project(&parsed)?;
    }

    keys.extend(canonicalize(&table));

    match keys.len() {
        0 => Err(Error::EmptyKeySet),
        n if n > MAX_KEYS => Err(Error::TooManyKeys(n)),
        n => {
            tracing::debug!(nkeys = n, "compiled match keys");
            Ok(keys)
        }
    }
}
