//! Linux `u32` traffic classifier filters.
//!
//! A u32 filter is described by its `TCA_OPTIONS` attribute, which carries the target class,
//! an optional policer or action, and a selector: the list of 32-bit match words the kernel
//! compares against packet contents.
//!
//! ```text
//! TCA_OPTIONS
//! ├── TCA_U32_POLICE | TCA_U32_ACT   (optional, opaque)
//! ├── TCA_U32_CLASSID                (u32)
//! └── TCA_U32_SEL                    (tc_u32_sel + nkeys * tc_u32_key)
//! ```
//!
//! Match keys are written as `value/mask+offset` strings and compiled by [`tcu32_sel`].

pub mod filter;
pub mod handle;
pub mod options;

pub use filter::U32FilterRequest;
pub use handle::FilterRequestInner;
pub use options::{U32Mark, U32Option, U32Options, U32Pcnt};

pub use tcu32_nla::{Nla, NlaBuffer};
pub use tcu32_sel::{CanonicalKey, SelectorRecord};

/// Errors building or reading u32 filter options.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Compiling, encoding or decoding the selector failed.
    #[error(transparent)]
    Selector(#[from] tcu32_sel::Error),
    /// Writing or reading an attribute failed.
    #[error(transparent)]
    Nla(#[from] tcu32_nla::Error),
    /// An attribute has an unexpected length or contents.
    #[error("invalid {attr} attribute: {reason}")]
    InvalidAttribute { attr: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
