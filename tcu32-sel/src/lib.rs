//! Match keys for the Linux u32 traffic control classifier.
//!
//! The u32 classifier matches packets against 32-bit words: "the big-endian word at byte offset
//! `off` must equal `val` under `mask`". Users rarely think in aligned words though; they think
//! in byte ranges such as "byte 9 is 6" or "bytes 2-3 under 0xffc0". This crate compiles such
//! key specifications into the words the kernel consumes, and reads them back.
//!
//! ```text
//!   "0x0006/0x00ff+8"  ─┐
//!   "0x0000/0xffc0+2"  ─┼─ parse ─► byte table ─► 4-byte windows ─► tc_u32_sel + tc_u32_key[]
//!   "0x5/0xf+0"        ─┤  (256 slots)
//!   "0x10/0xff+33"     ─┘
//!
//!   => 00060000/00ff0000 + 8
//!      05000000/0f00ffc0 + 0
//!      00100000/00ff0000 + 32
//! ```
//!
//! Only the first 256 bytes of a packet can be matched this way.

mod canonical;
mod error;
mod key;
mod selector;
mod spec;
mod table;

pub use canonical::canonicalize;
pub use error::{Error, KeyField, Result};
pub use key::{CanonicalKey, KEY_RECORD_LEN};
pub use selector::{MAX_KEYS, SELECTOR_HEADER_LEN, SelectorRecord, TC_U32_TERMINAL, compile_keys};
pub use spec::ParsedKey;
pub use table::{ByteMaskTable, Slot, TABLE_SIZE, WINDOW_SIZE};
