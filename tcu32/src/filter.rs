//! u32 filter requests.
//!
//! A u32 filter matches packets against a list of `value/mask+offset` key specs, and sends
//! matching packets to a target class.

use bytes::Bytes;
use rtnetlink::packet_core::{
    DefaultNla, NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkMessage,
};
use rtnetlink::packet_route::{
    RouteNetlinkMessage,
    tc::{TcAttribute, TcMessage},
};
use tcu32_nla::NlaBuffer;
use tcu32_sel::SelectorRecord;

use crate::handle::{FilterRequestInner, u32_handle_parts};
use crate::options::{U32Option, U32Options};
use crate::Result;

/// `TCA_OPTIONS` attribute type (from linux/rtnetlink.h).
pub const TCA_OPTIONS: u16 = 2;

/// EtherType for matching all protocols supported by Ethernet.
pub const ETH_P_ALL: u16 = 0x0003;

/// EtherType for IPv4 packets.
pub const ETH_P_IP: u16 = 0x0800;

/// Builder for creating a u32 filter.
///
/// # Example
///
/// ```
/// use tcu32::filter::{ETH_P_IP, U32FilterRequest};
/// use tcu32::handle::FilterRequestInner;
/// use rtnetlink::packet_route::tc::TcHandle;
///
/// let if_index = 1; // Network interface index
/// // Send TCP traffic to 10.0.0.2 into class 1:12
/// let request = U32FilterRequest::new(
///     FilterRequestInner::new(if_index).with_parent(TcHandle::from(0x0001_0000)),
///     0x0001_000C,
///     ["0x0006/0x00ff+8", "0x0a000002/0xffffffff+16"],
/// )
/// .with_protocol(ETH_P_IP)
/// .build()
/// .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct U32FilterRequest {
    /// Interface, parent and u32 handle of the filter.
    pub inner: FilterRequestInner,
    /// The class ID to route matching traffic to.
    pub class_id: u32,
    /// Filter priority (lower number = checked first). Zero lets the kernel pick one.
    pub priority: u16,
    /// EtherType the filter applies to, in host byte order.
    pub protocol: u16,
    /// Key specs, in `value/mask+offset` form. A spec whose value and mask are both zero is a
    /// reservation: it is sent as a literal empty key at its offset.
    pub keys: Vec<String>,
    /// Encoded policer attributes. Takes precedence over `action`.
    pub police: Option<Bytes>,
    /// Encoded action attributes.
    pub action: Option<Bytes>,
}

impl U32FilterRequest {
    /// Create a new u32 filter matching on `keys`, with priority 0 and protocol `ETH_P_ALL`.
    pub fn new<I, S>(inner: FilterRequestInner, class_id: u32, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            class_id,
            priority: 0,
            protocol: ETH_P_ALL,
            keys: keys.into_iter().map(Into::into).collect(),
            police: None,
            action: None,
        }
    }

    /// Set the class ID to route matching traffic to.
    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Set the filter priority.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Set the EtherType the filter applies to.
    pub fn with_protocol(mut self, protocol: u16) -> Self {
        self.protocol = protocol;
        self
    }

    /// Add a key spec.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Attach policer attributes. When set, any action is not sent.
    pub fn with_police(mut self, police: impl Into<Bytes>) -> Self {
        self.police = Some(police.into());
        self
    }

    /// Attach action attributes. Ignored when a policer is set.
    pub fn with_action(mut self, action: impl Into<Bytes>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// The tc header `info` field: priority in the upper 16 bits, protocol in network byte
    /// order in the lower 16.
    pub fn info(&self) -> u32 {
        ((self.priority as u32) << 16) | (self.protocol.to_be() as u32)
    }

    /// Assemble the filter options: policer or action, then class ID, then selector, then the
    /// hash table and bucket when the filter has an explicit handle.
    pub fn options(&self) -> Result<U32Options> {
        let mut options = U32Options::new();

        if let Some(police) = &self.police {
            options.push(U32Option::Police(police.clone()));
        } else if let Some(action) = &self.action {
            options.push(U32Option::Action(action.clone()));
        }

        options.push(U32Option::ClassId(self.class_id));
        options.push(U32Option::Selector(SelectorRecord::from_specs(&self.keys)?));

        if let Some(hash) = self.inner.hash() {
            options.push(U32Option::Hash(hash));
        }

        Ok(options)
    }

    /// Build the netlink message to create this u32 filter.
    pub fn build(&self) -> Result<NetlinkMessage<RouteNetlinkMessage>> {
        let options = self.options()?;

        let mut buf = NlaBuffer::new();
        options.encode(&mut buf)?;

        let mut tc_msg = TcMessage::with_index(self.inner.interface_index);
        tc_msg.header.parent = self.inner.parent;
        tc_msg.header.handle = self.inner.tc_handle();
        tc_msg.header.info = self.info();

        tc_msg.attributes.push(TcAttribute::Kind("u32".to_string()));
        let nla = DefaultNla::new(TCA_OPTIONS, buf.into_inner().to_vec());
        tc_msg.attributes.push(TcAttribute::Other(nla));

        let (table, bucket, node) = u32_handle_parts(self.inner.handle);
        tracing::debug!(
            ifindex = self.inner.interface_index,
            handle = format_args!("{table:x}:{bucket:x}:{node:x}"),
            class_id = format_args!("{:#010x}", self.class_id),
            priority = self.priority,
            keys = self.keys.len(),
            "built u32 filter request"
        );

        let mut nl_req = NetlinkMessage::from(RouteNetlinkMessage::NewTrafficFilter(tc_msg));
        nl_req.header.flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;

        Ok(nl_req)
    }
}
