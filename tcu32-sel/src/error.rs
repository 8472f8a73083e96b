use thiserror::Error;

/// Which part of a key specification failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    /// The leading value literal.
    Value,
    /// The literal after `/`.
    Mask,
    /// The literal after `+`.
    Offset,
}

impl std::fmt::Display for KeyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => f.write_str("value"),
            Self::Mask => f.write_str("mask"),
            Self::Offset => f.write_str("offset"),
        }
    }
}

/// Errors compiling key specifications or encoding and decoding selectors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A field of a key specification is not a valid integer literal.
    #[error("invalid {field} in key specification {spec:?}")]
    InvalidKeySpec { spec: String, field: KeyField },
    /// No match keys resulted from the key specifications.
    #[error("selector has no match keys")]
    EmptyKeySet,
    /// A matched byte lies outside the first 256 bytes of the packet.
    #[error("byte offset {0} is outside the 256-byte match window")]
    OffsetOutOfRange(i64),
    /// More keys than the one-byte `nkeys` field can count.
    #[error("{0} match keys do not fit in a selector (max 255)")]
    TooManyKeys(usize),
    /// The input ended before the header or the declared keys.
    #[error("truncated selector: need {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },
    /// Writing the enclosing attribute failed.
    #[error(transparent)]
    Nla(#[from] tcu32_nla::Error),
}

impl Error {
    pub(crate) fn invalid(spec: &str, field: KeyField) -> Self {
        Self::InvalidKeySpec { spec: spec.to_owned(), field }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
