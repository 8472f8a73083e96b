//! Key specification parsing.
//!
//! A key specification has the form `VALUE[/MASK][+OFFSET][@NEXTHDR]`, e.g. `0x0006/0x00ff+8`.
//! Numbers accept decimal and `0x`/`0o`/`0b` prefixed literals. The `@NEXTHDR` suffix is
//! accepted and ignored.

use std::str::FromStr;

use crate::error::{Error, KeyField, Result};

/// A parsed key specification: match `value` under `mask` at byte `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedKey {
    /// Value to compare the masked packet bits against.
    pub value: u32,
    /// Bits of the 32-bit word that take part in the match.
    pub mask: u32,
    /// Byte offset of the mask, with leading `00` bytes of a hex mask already folded in.
    pub offset: i32,
}

impl ParsedKey {
    /// Parses a `VALUE[/MASK][+OFFSET][@NEXTHDR]` key specification.
    ///
    /// # Errors
    /// - [`Error::InvalidKeySpec`] if a field is not an integer literal, or value and mask do not
    ///   fit in 32 bits
    /// - [`Error::OffsetOutOfRange`] if the offset, after folding in the mask's leading zero
    ///   bytes, does not fit in 32 bits
    pub fn parse(spec: &str) -> Result<Self> {
        let (key, _next_header) = cut_field(spec, '@');
        let (key, offset) = cut_field(key, '+');
        let (key, mask) = cut_field(key, '/');

        let offset = parse_int(offset).ok_or_else(|| Error::invalid(spec, KeyField::Offset))?;

        // `/0x00ff+8` is the same match as `/0xff+9`.
        let (mask, skipped) = strip_zero_bytes(mask);
        let offset = offset
            .checked_add(i64::from(skipped))
            .ok_or(Error::OffsetOutOfRange(offset))?;
        let offset = i32::try_from(offset).map_err(|_| Error::OffsetOutOfRange(offset))?;

        let mask = parse_u32(&mask).ok_or_else(|| Error::invalid(spec, KeyField::Mask))?;
        let value = parse_u32(key).ok_or_else(|| Error::invalid(spec, KeyField::Value))?;

        Ok(Self { value, mask, offset })
    }

    /// An all-zero key matches nothing and only reserves its offset. It is emitted verbatim
    /// instead of going through the byte table.
    #[inline]
    pub fn is_reservation(&self) -> bool {
        self.mask == 0 && self.value == 0
    }
}

impl FromStr for ParsedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Splits `key` at the first `separator`, returning the part before it and the field after it.
/// The field defaults to `"0"`. A separator at the very start of `key` does not count.
fn cut_field(key: &str, separator: char) -> (&str, &str) {
    match key.find(separator) {
        Some(pos) if pos > 0 => (&key[..pos], &key[pos + separator.len_utf8()..]),
        _ => (key, "0"),
    }
}

/// Strips leading `00` byte pairs off a hex mask, returning the remaining mask and the number of
/// bytes stripped. Masks without a nonzero digit are left alone.
fn strip_zero_bytes(mask: &str) -> (String, i32) {
    let Some(digits) = mask.strip_prefix("0x").or_else(|| mask.strip_prefix("0X")) else {
        return (mask.to_owned(), 0);
    };

    if digits.bytes().all(|b| b == b'0') {
        return (mask.to_owned(), 0);
    }

    let mut digits = digits;
    let mut skipped = 0;
    while let Some(rest) = digits.strip_prefix("00") {
        digits = rest;
        skipped += 1;
    }

    (format!("0x{digits}"), skipped)
}

fn parse_u32(literal: &str) -> Option<u32> {
    parse_int(literal).and_then(|n| u32::try_from(n).ok())
}

/// Parses an integer literal with an optional sign and radix prefix.
fn parse_int(literal: &str) -> Option<i64> {
    let literal = literal.trim();
    let (negative, unsigned) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };

    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        Some("0o" | "0O") => (8, &unsigned[2..]),
        Some("0b" | "0B") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };

    // `from_str_radix` would accept a second sign.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    // `007` is ambiguous between octal and decimal; only all-zero runs are allowed.
    if radix == 10 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0') {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
