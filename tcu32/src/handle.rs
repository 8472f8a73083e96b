//! Addressing of u32 filters.
//!
//! A filter hangs off a parent qdisc or class (a major:minor `TcHandle`). Its own handle is a
//! u32 handle, split into hash table (12 bits), bucket (8 bits) and node (12 bits), written
//! `table:bucket:node` by tc. Table `0x800` is the root table every u32 classifier starts with.

use rtnetlink::packet_route::tc::TcHandle;

/// The u32 root hash table.
pub const ROOT_TABLE: u32 = 0x800;

/// Where a u32 filter is attached and where it lives in the u32 hash tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterRequestInner {
    /// The network interface index (from `if_nametoindex`).
    pub interface_index: i32,
    /// The qdisc or class the filter attaches to.
    pub parent: TcHandle,
    /// The filter's u32 handle. Zero lets the kernel place it in the root table.
    pub handle: u32,
}

impl FilterRequestInner {
    /// Create a new request for the given interface, attached to the root qdisc, with the
    /// filter's position left to the kernel.
    pub fn new(index: i32) -> Self {
        Self { interface_index: index, parent: TcHandle::ROOT, handle: 0 }
    }

    /// Set the parent handle.
    pub fn with_parent(mut self, parent: TcHandle) -> Self {
        self.parent = parent;
        self
    }

    /// Place the filter at `node` of `bucket` in hash table `table`. A zero node lets the kernel
    /// pick a free one in that bucket.
    pub fn with_node(mut self, table: u32, bucket: u32, node: u32) -> Self {
        self.handle = u32_handle(table, bucket, node);
        self
    }

    /// The hash table and bucket the filter is inserted into, as sent in `TCA_U32_HASH`.
    /// `None` when the handle is left to the kernel.
    pub fn hash(&self) -> Option<u32> {
        let (table, bucket, _) = u32_handle_parts(self.handle);
        (self.handle != 0).then(|| u32_handle(table, bucket, 0))
    }

    /// The handle as carried in the tc message header.
    pub fn tc_handle(&self) -> TcHandle {
        TcHandle::from(self.handle)
    }
}

/// Compose a u32 filter handle from its hash table, bucket and node parts. Out of range parts
/// are truncated to their field width.
///
/// # Example
///
/// ```
/// use tcu32::handle::u32_handle;
/// assert_eq!(u32_handle(0x800, 0, 0x800), 0x8000_0800); // 800::800
/// ```
pub fn u32_handle(table: u32, bucket: u32, node: u32) -> u32 {
    ((table & 0xfff) << 20) | ((bucket & 0xff) << 12) | (node & 0xfff)
}

/// Split a u32 filter handle into its hash table, bucket and node parts.
pub fn u32_handle_parts(handle: u32) -> (u32, u32, u32) {
    (handle >> 20, (handle >> 12) & 0xff, handle & 0xfff)
}
