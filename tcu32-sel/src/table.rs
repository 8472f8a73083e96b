use crate::{
    error::{Error, Result},
    spec::ParsedKey,
};

/// Number of bytes addressable by a selector built from key specifications.
pub const TABLE_SIZE: usize = 256;

/// Width of a match word in bytes.
pub const WINDOW_SIZE: usize = 4;

const WINDOWS: usize = TABLE_SIZE / WINDOW_SIZE;

/// One byte of the match window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Masked value byte.
    pub value: u8,
    /// Mask byte. Zero means the slot is unused.
    pub mask: u8,
}

impl Slot {
    #[inline]
    pub fn is_set(&self) -> bool {
        self.mask != 0
    }
}

/// Per-byte scratch table that parsed keys are projected into before being regrouped into
/// 32-bit match words.
///
/// Writes to the same slot overwrite each other; mask bits are never merged within a slot.
#[derive(Debug, Clone)]
pub struct ByteMaskTable {
    slots: [Slot; TABLE_SIZE],
    /// For each 4-byte window, the sequence number of the first projection that wrote to it.
    first_touch: [Option<usize>; WINDOWS],
    projected: usize,
}

impl Default for ByteMaskTable {
    fn default() -> Self {
        Self { slots: [Slot::default(); TABLE_SIZE], first_touch: [None; WINDOWS], projected: 0 }
    }
}

impl ByteMaskTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects the nonzero mask bytes of `key` into consecutive slots starting at its offset,
    /// most significant byte first. Zero mask bytes are skipped and take no slot, so
    /// `0xff00ff/0xff00ff+0` lands in slots 0 and 1.
    ///
    /// Nothing is written if any byte would fall outside the table.
    pub fn project(&mut self, key: &ParsedKey) -> Result<()> {
        let seq = self.projected;
        self.projected += 1;

        let mask_bytes = key.mask.to_be_bytes();
        let width = mask_bytes.iter().filter(|b| **b != 0).count() as i64;
        if width == 0 {
            return Ok(());
        }

        let first = i64::from(key.offset);
        let last = first + width - 1;
        if first < 0 {
            return Err(Error::OffsetOutOfRange(first));
        }
        if last >= TABLE_SIZE as i64 {
            return Err(Error::OffsetOutOfRange(last));
        }

        let mut index = first as usize;
        for (i, mask) in mask_bytes.into_iter().enumerate() {
            if mask == 0 {
                continue;
            }

            let shift = 24 - 8 * i;
            let value = ((key.value & (u32::from(mask) << shift)) >> shift) as u8;

            self.slots[index] = Slot { value, mask };
            self.first_touch[index / WINDOW_SIZE].get_or_insert(seq);
            index += 1;
        }

        tracing::trace!(
            value = format_args!("{:#x}", key.value),
            mask = format_args!("{:#x}", key.mask),
            first,
            last,
            "projected key"
        );

        Ok(())
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Option<Slot> {
        self.slots.get(index).copied()
    }

    #[inline]
    pub fn slots(&self) -> &[Slot; TABLE_SIZE] {
        &self.slots
    }

    /// Returns the sequence number of the first projection that touched the 4-byte window
    /// `window`, if any did.
    #[inline]
    pub fn first_touch(&self, window: usize) -> Option<usize> {
        self.first_touch.get(window).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_set())
    }
}
