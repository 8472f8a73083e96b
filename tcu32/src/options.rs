//! The u32 classifier's `TCA_OPTIONS` attributes.

use bytes::{Buf, Bytes};
use tcu32_nla::{Nla, NlaBuffer, NlaIter};
use tcu32_sel::SelectorRecord;

use crate::{Error, Result};

// U32 filter TCA_OPTIONS sub-attributes (from linux/pkt_cls.h)
pub const TCA_U32_UNSPEC: u16 = 0;
/// Class ID attribute type.
pub const TCA_U32_CLASSID: u16 = 1;
pub const TCA_U32_HASH: u16 = 2;
pub const TCA_U32_LINK: u16 = 3;
pub const TCA_U32_DIVISOR: u16 = 4;
/// Selector attribute type.
pub const TCA_U32_SEL: u16 = 5;
pub const TCA_U32_POLICE: u16 = 6;
pub const TCA_U32_ACT: u16 = 7;
pub const TCA_U32_INDEV: u16 = 8;
pub const TCA_U32_PCNT: u16 = 9;
pub const TCA_U32_MARK: u16 = 10;

/// The kernel's `tc_u32_mark` structure: match on the packet mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct U32Mark {
    /// Mark value to compare against.
    pub val: u32,
    /// Bits of the mark that take part in the match.
    pub mask: u32,
    /// Number of packets that matched (read-only, reported by the kernel).
    pub success: u32,
}

impl U32Mark {
    const LEN: usize = 12;

    fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..4].copy_from_slice(&self.val.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.mask.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.success.to_ne_bytes());
        buf
    }

    fn decode(mut value: &[u8]) -> Result<Self> {
        expect_len("mark", value, Self::LEN)?;
        Ok(Self { val: value.get_u32_ne(), mask: value.get_u32_ne(), success: value.get_u32_ne() })
    }
}

/// The kernel's `tc_u32_pcnt` structure: hit counters, reported when the kernel is built with
/// `CONFIG_CLS_U32_PERF`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct U32Pcnt {
    /// Packets that reached the filter.
    pub rcnt: u64,
    /// Packets that matched the filter.
    pub rhit: u64,
    /// Per-key success counters.
    pub kcnts: Vec<u64>,
}

impl U32Pcnt {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + 8 * self.kcnts.len());
        buf.extend_from_slice(&self.rcnt.to_ne_bytes());
        buf.extend_from_slice(&self.rhit.to_ne_bytes());
        for kcnt in &self.kcnts {
            buf.extend_from_slice(&kcnt.to_ne_bytes());
        }
        buf
    }

    fn decode(mut value: &[u8]) -> Result<Self> {
        if value.len() < 16 || value.len() % 8 != 0 {
            return Err(Error::InvalidAttribute {
                attr: "pcnt",
                reason: format!("unexpected length {}", value.len()),
            });
        }

        let rcnt = value.get_u64_ne();
        let rhit = value.get_u64_ne();
        let mut kcnts = Vec::with_capacity(value.len() / 8);
        while value.has_remaining() {
            kcnts.push(value.get_u64_ne());
        }

        Ok(Self { rcnt, rhit, kcnts })
    }
}

/// A single u32 classifier option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum U32Option {
    /// Class that matching packets are sent to (`flowid`).
    ClassId(u32),
    /// Hash table and bucket this filter lives in.
    Hash(u32),
    /// Hash table to continue matching in.
    Link(u32),
    /// Number of buckets of a hash table.
    Divisor(u32),
    /// Match keys and selector header.
    Selector(SelectorRecord),
    /// Policer attributes, encoded by the caller.
    Police(Bytes),
    /// Action attributes, encoded by the caller.
    Action(Bytes),
    /// Only match packets received on this interface.
    InDev(String),
    /// Hit counters.
    Pcnt(U32Pcnt),
    /// Packet mark match.
    Mark(U32Mark),
    /// An attribute this crate does not interpret.
    Other(Nla),
}

impl U32Option {
    /// The `TCA_U32_*` attribute type of this option.
    pub fn kind(&self) -> u16 {
        match self {
            Self::ClassId(_) => TCA_U32_CLASSID,
            Self::Hash(_) => TCA_U32_HASH,
            Self::Link(_) => TCA_U32_LINK,
            Self::Divisor(_) => TCA_U32_DIVISOR,
            Self::Selector(_) => TCA_U32_SEL,
            Self::Police(_) => TCA_U32_POLICE,
            Self::Action(_) => TCA_U32_ACT,
            Self::InDev(_) => TCA_U32_INDEV,
            Self::Pcnt(_) => TCA_U32_PCNT,
            Self::Mark(_) => TCA_U32_MARK,
            Self::Other(nla) => nla.kind,
        }
    }

    /// Writes this option as a single attribute.
    pub fn encode(&self, buf: &mut NlaBuffer) -> Result<()> {
        let kind = self.kind();
        match self {
            Self::ClassId(v) | Self::Hash(v) | Self::Link(v) | Self::Divisor(v) => {
                buf.put_u32_attr(kind, *v)?
            }
            Self::Selector(sel) => sel.encode_attr(buf, kind)?,
            Self::Police(attrs) | Self::Action(attrs) => buf.put_attr(kind, attrs)?,
            Self::InDev(name) => {
                let mut value = Vec::with_capacity(name.len() + 1);
                value.extend_from_slice(name.as_bytes());
                value.push(0);
                buf.put_attr(kind, &value)?
            }
            Self::Pcnt(pcnt) => buf.put_attr(kind, &pcnt.to_bytes())?,
            Self::Mark(mark) => buf.put_attr(kind, &mark.to_bytes())?,
            Self::Other(nla) => nla.encode(buf)?,
        }

        Ok(())
    }

    /// Interprets a decoded attribute. Unknown types are kept as [`U32Option::Other`].
    pub fn decode(nla: Nla) -> Result<Self> {
        let value = nla.value.as_ref();
        let option = match nla.kind {
            TCA_U32_CLASSID => Self::ClassId(read_u32("classid", value)?),
            TCA_U32_HASH => Self::Hash(read_u32("hash", value)?),
            TCA_U32_LINK => Self::Link(read_u32("link", value)?),
            TCA_U32_DIVISOR => Self::Divisor(read_u32("divisor", value)?),
            TCA_U32_SEL => Self::Selector(SelectorRecord::from_bytes(value)?),
            TCA_U32_POLICE => Self::Police(nla.value),
            TCA_U32_ACT => Self::Action(nla.value),
            TCA_U32_INDEV => {
                let name = value.split(|b| *b == 0).next().unwrap_or_default();
                Self::InDev(String::from_utf8_lossy(name).into_owned())
            }
            TCA_U32_PCNT => Self::Pcnt(U32Pcnt::decode(value)?),
            TCA_U32_MARK => Self::Mark(U32Mark::decode(value)?),
            _ => Self::Other(nla),
        };

        Ok(option)
    }
}

/// The contents of a u32 filter's `TCA_OPTIONS` attribute, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct U32Options(pub Vec<U32Option>);

impl U32Options {
    /// Creates an empty option list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an option. Options are written in the order pushed.
    pub fn push(&mut self, option: U32Option) {
        self.0.push(option);
    }

    /// Iterates over the options in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &U32Option> {
        self.0.iter()
    }

    /// Writes every option as an attribute. On error, the options written so far are left in
    /// `buf`; wrap the call in [`NlaBuffer::encode_nested`] to discard them.
    pub fn encode(&self, buf: &mut NlaBuffer) -> Result<()> {
        self.0.iter().try_for_each(|option| option.encode(buf))
    }

    /// Decodes the payload of a `TCA_OPTIONS` attribute.
    pub fn decode(payload: impl Into<Bytes>) -> Result<Self> {
        let options = NlaIter::new(payload)
            .map(|nla| U32Option::decode(nla?))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(count = options.len(), "decoded u32 options");

        Ok(Self(options))
    }

    /// The target class, if present.
    pub fn class_id(&self) -> Option<u32> {
        self.iter().find_map(|option| match option {
            U32Option::ClassId(class_id) => Some(*class_id),
            _ => None,
        })
    }

    /// The selector, if present.
    pub fn selector(&self) -> Option<&SelectorRecord> {
        self.iter().find_map(|option| match option {
            U32Option::Selector(sel) => Some(sel),
            _ => None,
        })
    }
}

impl FromIterator<U32Option> for U32Options {
    fn from_iter<T: IntoIterator<Item = U32Option>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn read_u32(attr: &'static str, value: &[u8]) -> Result<u32> {
    expect_len(attr, value, 4)?;
    Ok(u32::from_ne_bytes([value[0], value[1], value[2], value[3]]))
}

fn expect_len(attr: &'static str, value: &[u8], len: usize) -> Result<()> {
    if value.len() < len {
        return Err(Error::InvalidAttribute {
            attr,
            reason: format!("expected {len} bytes, got {}", value.len()),
        });
    }
    Ok(())
}
