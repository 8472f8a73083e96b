//! Regrouping of the byte table into 32-bit match words.
//!
//! The table is cut into 4-byte aligned windows. Every window holding at least one set byte
//! becomes one [`CanonicalKey`] whose offset is the window start. Unset bytes inside a window are
//! carried along as zero mask bits rather than splitting the window.
//!
//! Keys are ordered by the first key specification that wrote into their window, so
//! `["0x0006/0x00ff+8", "0x5/0xf+0"]` yields the key at offset 8 before the key at offset 0.

use crate::{
    key::CanonicalKey,
    table::{ByteMaskTable, TABLE_SIZE, WINDOW_SIZE},
};

/// Returns the match words covering every set byte of `table`.
pub fn canonicalize(table: &ByteMaskTable) -> Vec<CanonicalKey> {
    let mut keys = Vec::new();
    let mut open: Option<CanonicalKey> = None;
    let mut shift = 0u32;

    for (index, slot) in table.slots().iter().enumerate() {
        if slot.is_set() && open.is_none() {
            let position = index % WINDOW_SIZE;
            open = Some(CanonicalKey::new(0, 0, (index - position) as i32));
            shift = 24 - 8 * position as u32;
        }

        let Some(key) = open.as_mut() else {
            continue;
        };

        key.mask |= u32::from(slot.mask) << shift;
        key.value |= u32::from(slot.value) << shift;

        if shift == 0 || index == TABLE_SIZE - 1 {
            tracing::trace!(%key, "closed match word");
            keys.extend(open.take());
        } else {
            shift -= 8;
        }
    }

    // Stable, so windows first touched by the same projection stay in offset order.
    keys.sort_by_key(|key| table.first_touch(key.offset as usize / WINDOW_SIZE));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ParsedKey;

    fn table_of(specs: &[&str]) -> ByteMaskTable {
        let mut table = ByteMaskTable::new();
        for spec in specs {
            table.project(&ParsedKey::parse(spec).unwrap()).unwrap();
        }
        table
    }

    #[test]
    fn empty_table_yields_no_keys() {
        assert!(canonicalize(&ByteMaskTable::new()).is_empty());
    }

    #[test]
    fn reference_key_set() {
        let table = table_of(&["0x0006/0x00ff+8", "0x0000/0xffc0+2", "0x5/0xf+0", "0x10/0xff+33"]);

        assert_eq!(
            canonicalize(&table),
            vec![
                CanonicalKey::new(0x00ff_0000, 0x0006_0000, 8),
                CanonicalKey::new(0x0f00_ffc0, 0x0500_0000, 0),
                CanonicalKey::new(0x00ff_0000, 0x0010_0000, 32),
            ]
        );
    }

    #[test]
    fn full_word_spanning_two_windows() {
        let table = table_of(&["0xc0a80001/0xffffffff+14"]);

        assert_eq!(
            canonicalize(&table),
            vec![
                CanonicalKey::new(0x0000_ffff, 0x0000_c0a8, 12),
                CanonicalKey::new(0xffff_0000, 0x0001_0000, 16),
            ]
        );
    }

    #[test]
    fn overlapping_specs_share_a_window() {
        // The second spec overwrites byte 1 and adds byte 2.
        let table = table_of(&["0x1122/0xffff+0", "0x3344/0xffff+1"]);

        assert_eq!(canonicalize(&table), vec![CanonicalKey::new(0xffff_ff00, 0x1133_4400, 0)]);
    }

    #[test]
    fn ascending_specs_come_out_in_offset_order() {
        let table = table_of(&["0x1/0xff+0", "0x2/0xff+4", "0x3/0xff+255"]);

        assert_eq!(
            canonicalize(&table),
            vec![
                CanonicalKey::new(0xff00_0000, 0x0100_0000, 0),
                CanonicalKey::new(0xff00_0000, 0x0200_0000, 4),
                CanonicalKey::new(0x0000_00ff, 0x0000_0003, 252),
            ]
        );
    }

    #[test]
    fn one_spec_touching_several_windows_keeps_offset_order() {
        let table = table_of(&["0xaa/0xff+40", "0x01020304/0xffffffff+2"]);

        assert_eq!(
            canonicalize(&table),
            vec![
                CanonicalKey::new(0xff00_0000, 0xaa00_0000, 40),
                CanonicalKey::new(0x0000_ffff, 0x0000_0102, 0),
                CanonicalKey::new(0xffff_0000, 0x0304_0000, 4),
            ]
        );
    }
}
