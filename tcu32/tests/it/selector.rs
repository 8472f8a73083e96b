use std::collections::BTreeMap;

use rand::Rng;
use tcu32::{CanonicalKey, SelectorRecord};
use tcu32_sel::{Error, ParsedKey, TABLE_SIZE};

/// Whether every key matches the packet, the way the kernel evaluates a selector.
fn packet_matches(packet: &[u8], keys: &[CanonicalKey]) -> bool {
    keys.iter().all(|key| {
        let off = key.offset as usize;
        let word = u32::from_be_bytes(packet[off..off + 4].try_into().unwrap());
        word & key.mask == key.value & key.mask
    })
}

/// Byte positions a key spec constrains, as `index -> (value, mask)`. Later specs win.
fn constrained_bytes(specs: &[String]) -> BTreeMap<usize, (u8, u8)> {
    let mut bytes = BTreeMap::new();
    for spec in specs {
        let key = ParsedKey::parse(spec).unwrap();
        let mut index = key.offset as usize;
        for (mask, value) in key.mask.to_be_bytes().into_iter().zip(key.value.to_be_bytes()) {
            if mask != 0 {
                bytes.insert(index, (value & mask, mask));
                index += 1;
            }
        }
    }
    bytes
}

fn random_spec(rng: &mut impl Rng) -> String {
    let mut mask: u32 = rng.gen();
    if mask == 0 {
        mask = 0xff;
    }
    let value: u32 = rng.gen();
    let offset: u16 = rng.gen_range(0..200);

    // Zero-padded masks exercise the leading `00` folding.
    if rng.gen_bool(0.5) {
        format!("{value:#x}/{mask:#010x}+{offset}")
    } else {
        format!("{value:#x}/{mask:#x}+{offset}")
    }
}

#[test]
fn reference_specs_compile_to_three_keys() {
    let _ = tracing_subscriber::fmt::try_init();

    let sel = SelectorRecord::from_specs([
        "0x0006/0x00ff+8",
        "0x0000/0xffc0+2",
        "0x5/0xf+0",
        "0x10/0xff+33",
    ])
    .unwrap();

    assert_eq!(
        sel.keys(),
        &[
            CanonicalKey::new(0x00ff_0000, 0x0006_0000, 8),
            CanonicalKey::new(0x0f00_ffc0, 0x0500_0000, 0),
            CanonicalKey::new(0x00ff_0000, 0x0010_0000, 32),
        ]
    );
}

#[test]
fn compiled_keys_match_the_constrained_bytes() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let n = rng.gen_range(1..8);
        let specs: Vec<String> = (0..n).map(|_| random_spec(&mut rng)).collect();

        let sel = SelectorRecord::from_specs(&specs).unwrap();
        let mut wire = Vec::new();
        sel.encode(&mut wire).unwrap();
        let keys = SelectorRecord::from_bytes(&wire).unwrap().into_keys();

        let constrained = constrained_bytes(&specs);

        let mut packet = [0u8; TABLE_SIZE];
        rng.fill(&mut packet[..]);
        for (&index, &(value, mask)) in &constrained {
            packet[index] = (packet[index] & !mask) | value;
        }
        assert!(packet_matches(&packet, &keys), "{specs:?} -> {keys:?}");

        // The keys cover exactly the constrained bits.
        let mut covered = BTreeMap::new();
        for key in &keys {
            for (i, (mask, value)) in
                key.mask.to_be_bytes().into_iter().zip(key.value.to_be_bytes()).enumerate()
            {
                if mask != 0 {
                    covered.insert(key.offset as usize + i, (value & mask, mask));
                }
            }
        }
        assert_eq!(covered, constrained, "{specs:?}");

        // Flipping any constrained bit breaks the match.
        let (&index, &(_, mask)) = constrained.iter().next().unwrap();
        packet[index] ^= 1 << mask.trailing_zeros();
        assert!(!packet_matches(&packet, &keys), "{specs:?} -> {keys:?}");
    }
}

#[test]
fn header_counts_the_written_keys() {
    for specs in [
        vec!["0x1/0xff+0"],
        vec!["0x1/0xff+0", "0x2/0xff+4", "0x0/0x0+12"],
        vec!["0xdeadbeef/0xffffffff+0", "0x1/0xff+3", "0x2/0xff+64", "0x3/0xff+128"],
    ] {
        let sel = SelectorRecord::from_specs(&specs).unwrap();
        let mut wire = Vec::new();
        sel.encode(&mut wire).unwrap();

        assert_eq!(wire[2] as usize, sel.keys().len());
        assert_eq!(wire.len(), 16 + 16 * sel.keys().len());
    }
}

#[test]
fn reservations_stay_literal() {
    let sel = SelectorRecord::from_specs(["0x1/0xff+12", "0x0/0x0+12", "0x2/0xff+13"]).unwrap();

    assert_eq!(
        sel.keys(),
        &[CanonicalKey::new(0, 0, 12), CanonicalKey::new(0xffff_0000, 0x0102_0000, 12)]
    );
}

#[test]
fn overlapping_specs_take_the_last_write() {
    let sel = SelectorRecord::from_specs(["0x11223344/0xffffffff+4", "0xaa/0xff+5"]).unwrap();
    assert_eq!(sel.keys(), &[CanonicalKey::new(0xffff_ffff, 0x11aa_3344, 4)]);
}

#[test]
fn invalid_input_is_rejected() {
    assert_eq!(SelectorRecord::from_specs(Vec::<&str>::new()).unwrap_err(), Error::EmptyKeySet);

    assert!(matches!(
        SelectorRecord::from_specs(["notanumber/0xff+0"]),
        Err(Error::InvalidKeySpec { .. })
    ));

    assert!(matches!(
        SelectorRecord::from_specs(["0x1/0xff+256"]),
        Err(Error::OffsetOutOfRange(256))
    ));
}

#[test]
fn truncated_selector_fails_the_same_way_every_time() {
    let sel = SelectorRecord::from_specs(["0x1/0xff+0", "0x2/0xff+8"]).unwrap();
    let mut wire = Vec::new();
    sel.encode(&mut wire).unwrap();

    // Claim more keys than are present.
    wire[2] = 9;

    let first = SelectorRecord::from_bytes(&wire).unwrap_err();
    let second = SelectorRecord::from_bytes(&wire).unwrap_err();
    assert_eq!(first, Error::Truncated { needed: 9 * 16, remaining: 2 * 16 });
    assert_eq!(first, second);
}
