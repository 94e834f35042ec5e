//! Integration tests across the TVM modules

use crate::tvm::*;
use std::collections::BTreeMap;

/// Helper function to create a leaf cell holding a single 32-bit value
fn leaf(value: u32) -> ArcCell {
    let mut builder = CellBuilder::new();
    builder.store_u32(value).unwrap();
    builder.build().unwrap()
}

fn key3(value: u64) -> BitString {
    uint_key(value, 3).unwrap()
}

/// A cell with exactly 1023 bits and 4 references is the largest valid one
#[test]
fn test_cell_capacity_boundary() {
    let mut builder = CellBuilder::new();
    builder.store_zeros(MAX_CELL_BITS).unwrap();
    for i in 0..MAX_CELL_REFS {
        builder.store_ref(leaf(i as u32)).unwrap();
    }
    assert_eq!(builder.available_bits(), 0);
    assert_eq!(builder.available_refs(), 0);

    let mut overfull = builder.clone();
    assert!(matches!(
        overfull.store_bit(false),
        Err(CellError::Overflow { bits: 1024, refs: 4 })
    ));
    let mut overfull = builder.clone();
    assert!(matches!(
        overfull.store_ref(Cell::empty()),
        Err(CellError::Overflow { bits: 1023, refs: 5 })
    ));

    let cell = builder.build().unwrap();
    assert_eq!(cell.bit_len(), 1023);
    assert_eq!(cell.reference_count(), 4);

    let decoded = deserialize_boc(&serialize_boc(&cell, true).unwrap()).unwrap();
    assert_eq!(decoded.repr_hash(), cell.repr_hash());
    assert_eq!(decoded.bit_len(), 1023);
}

/// Cells bypassing the builder are still bounded
#[test]
fn test_cell_new_rejects_oversized() {
    let bits = BitString::from_raw(vec![0u8; 128], 1024).unwrap();
    assert!(matches!(
        Cell::new(bits, Vec::new(), false),
        Err(CellError::Overflow { .. })
    ));

    let refs = (0..5).map(|_| Cell::empty()).collect();
    assert!(matches!(
        Cell::new(BitString::new(), refs, false),
        Err(CellError::Overflow { .. })
    ));
}

/// Zero coins take a single zero nibble
#[test]
fn test_zero_coins() {
    let mut builder = CellBuilder::new();
    builder.store_coins(0).unwrap();
    assert_eq!(builder.bit_len(), 4);

    let cell = builder.build().unwrap();
    assert_eq!(cell.data(), &[0x00]);
    let mut slice = cell.as_slice();
    assert_eq!(slice.load_coins().unwrap(), 0);
    slice.end_parse().unwrap();
}

/// Dictionary keys 000, 001 and 111 survive a BoC roundtrip
#[test]
fn test_dictionary_through_boc() {
    let leaves = [(0b000, leaf(10)), (0b001, leaf(20)), (0b111, leaf(30))];

    let mut dict = Dict::new(3);
    for (key, value) in &leaves {
        dict.set_ref(&key3(*key), value.clone()).unwrap();
    }

    let mut builder = CellBuilder::new();
    builder.store_byte(0x5A).unwrap();
    dict.store(&mut builder).unwrap();
    let container = builder.build().unwrap();

    let boc = serialize_boc(&container, true).unwrap();
    let decoded = deserialize_boc(&boc).unwrap();
    assert_eq!(decoded.repr_hash(), container.repr_hash());

    let mut slice = decoded.as_slice();
    assert_eq!(slice.load_u8().unwrap(), 0x5A);
    let restored = Dict::load(&mut slice, 3).unwrap();
    slice.end_parse().unwrap();

    for (key, value) in &leaves {
        let found = restored.get_ref(&key3(*key)).unwrap().unwrap();
        assert_eq!(found.repr_hash(), value.repr_hash());
    }
    assert!(restored.get_ref(&key3(0b010)).unwrap().is_none());

    let keys: Vec<u64> = restored
        .iter()
        .map(|entry| entry.unwrap().0.read_uint(0, 3).unwrap())
        .collect();
    assert_eq!(keys, vec![0b000, 0b001, 0b111]);
}

/// Iteration yields exactly the inserted entries in key order, and the
/// incremental and bulk builds agree on the root hash
#[test]
fn test_dictionary_roundtrip_many_keys() {
    let mut expected = BTreeMap::new();
    let mut dict = Dict::new(16);
    for i in 0..200u64 {
        let key = (i * 7919) % 65536;
        let mut value = CellBuilder::new();
        value.store_u64(i).unwrap();
        let value = value.to_slice().unwrap();
        dict.set_uint(key, &value).unwrap();
        expected.insert(key, i);
    }

    let entries: Vec<(u64, u64)> = dict
        .iter()
        .map(|entry| {
            let (key, mut value) = entry.unwrap();
            (key.read_uint(0, 16).unwrap(), value.load_u64().unwrap())
        })
        .collect();
    let expected_entries: Vec<(u64, u64)> = expected.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(entries, expected_entries);

    let bulk = Dict::from_entries(
        16,
        expected.iter().map(|(key, value)| {
            let mut builder = CellBuilder::new();
            builder.store_u64(*value).unwrap();
            (uint_key(*key, 16).unwrap(), builder.to_slice().unwrap())
        }),
    )
    .unwrap();
    assert_eq!(bulk.root().unwrap().repr_hash(), dict.root().unwrap().repr_hash());

    // iteration restarts from the beginning
    assert_eq!(dict.iter().count(), 200);
    assert_eq!(dict.iter().count(), 200);
}

/// An empty HashmapE is a single zero bit
#[test]
fn test_empty_hashmap_e() {
    let dict = Dict::new(32);
    let mut builder = CellBuilder::new();
    dict.store(&mut builder).unwrap();
    assert_eq!(builder.bit_len(), 1);
    assert_eq!(builder.ref_count(), 0);

    let cell = builder.build().unwrap();
    let decoded = deserialize_boc(&serialize_boc(&cell, false).unwrap()).unwrap();
    let mut slice = decoded.as_slice();
    let restored = Dict::load(&mut slice, 32).unwrap();
    assert!(restored.is_empty());
    slice.end_parse().unwrap();
}

/// Truncated buffers never decode
#[test]
fn test_truncated_boc_is_rejected() {
    let mut dict = Dict::new(8);
    for key in [1u64, 2, 200] {
        dict.set_ref(&uint_key(key, 8).unwrap(), leaf(key as u32))
            .unwrap();
    }
    let mut builder = CellBuilder::new();
    dict.store(&mut builder).unwrap();
    let boc = serialize_boc(&builder.build().unwrap(), true).unwrap();

    for len in 0..boc.len() {
        assert!(
            matches!(deserialize_boc(&boc[..len]), Err(CellError::MalformedBoc(_))),
            "prefix of {len} bytes decoded"
        );
    }
}

/// Corrupting a payload byte breaks the checksum
#[test]
fn test_corrupted_payload_is_rejected() {
    let mut builder = CellBuilder::new();
    builder.store_u64(0x0123_4567_89AB_CDEF).unwrap();
    builder.store_ref(leaf(7)).unwrap();
    let mut boc = serialize_boc(&builder.build().unwrap(), true).unwrap();

    let payload_byte = boc.len() - 6;
    boc[payload_byte] ^= 0x01;
    assert!(matches!(
        deserialize_boc(&boc),
        Err(CellError::MalformedBoc(BocError::ChecksumMismatch { .. }))
    ));
}

/// Building the same value twice yields identical hashes and bytes
#[test]
fn test_hash_determinism() {
    let build = || {
        let shared = leaf(42);
        let mut builder = CellBuilder::new();
        builder.store_coins(1_000_000_000).unwrap();
        builder.store_ref(shared.clone()).unwrap();
        builder.store_ref(shared).unwrap();
        builder.build().unwrap()
    };

    let first = build();
    let second = build();
    assert_eq!(first.repr_hash(), second.repr_hash());
    assert_eq!(first, second);
    assert_eq!(
        serialize_boc(&first, true).unwrap(),
        serialize_boc(&second, true).unwrap()
    );
}

/// Shared children are stored once
#[test]
fn test_boc_deduplicates_shared_cells() {
    let shared = leaf(1);
    let mut builder = CellBuilder::new();
    builder.store_ref(shared.clone()).unwrap();
    builder.store_ref(shared).unwrap();
    let root = builder.build().unwrap();

    let boc = serialize_boc(&root, false).unwrap();
    // header magic, flags, offset size, then the cell count
    assert_eq!(boc[6], 2);

    let decoded = deserialize_boc(&boc).unwrap();
    assert_eq!(decoded.repr_hash(), root.repr_hash());
    assert_eq!(
        decoded.references()[0].repr_hash(),
        decoded.references()[1].repr_hash()
    );
}

/// Text encodings wrap the binary form
#[test]
fn test_boc_text_forms() {
    let cell = leaf(0xDEADBEEF);
    let b64 = boc_to_base64(&cell, true).unwrap();
    assert_eq!(base64_to_boc(&b64).unwrap().repr_hash(), cell.repr_hash());

    let hex = boc_to_hex(&cell, false).unwrap();
    assert_eq!(hex_to_boc(&hex).unwrap().repr_hash(), cell.repr_hash());
    assert!(hex_to_boc("zz").is_err());
}

/// A slice over a deserialized tree reads back what was written
#[test]
fn test_builder_slice_through_boc() {
    let addr = Address::new(-1, [0x11; 32]);
    let mut builder = CellBuilder::new();
    builder.store_int(-5, 8).unwrap();
    builder.store_address(Some(&addr)).unwrap();
    builder.store_coins(12_345).unwrap();
    builder.store_maybe_ref(None).unwrap();
    let cell = builder.build().unwrap();

    let decoded = deserialize_boc(&serialize_boc(&cell, true).unwrap()).unwrap();
    let mut slice = decoded.as_slice();
    assert_eq!(slice.load_int(8).unwrap(), -5);
    assert_eq!(slice.load_address().unwrap(), Some(addr));
    assert_eq!(slice.load_coins().unwrap(), 12_345);
    assert!(slice.load_maybe_ref().unwrap().is_none());
    slice.end_parse().unwrap();
}

/// A merkle proof survives serialization and still commits to the root
#[test]
fn test_merkle_proof_through_boc() {
    let mut builder = CellBuilder::new();
    builder.store_ref(leaf(1)).unwrap();
    builder.store_ref(leaf(2)).unwrap();
    let root = builder.build().unwrap();

    let keep = [root.references()[1].repr_hash()].into_iter().collect();
    let proof = merkle_proof(&root, &keep).unwrap();
    let decoded = deserialize_boc(&serialize_boc(&proof, true).unwrap()).unwrap();

    assert_eq!(decoded.cell_type(), CellType::MerkleProof);
    assert_eq!(merkle_proof_root_hash(&decoded).unwrap(), root.repr_hash());
    let partial = &decoded.references()[0];
    assert_eq!(partial.references()[0].cell_type(), CellType::PrunedBranch);
    assert_eq!(partial.references()[1].repr_hash(), root.references()[1].repr_hash());
}

fn reserialize(hex: &str) -> String {
    let bytes = hex::decode(hex).unwrap();
    let has_index = bytes[4] & 0x80 != 0;
    let roots = deserialize_boc_multi(&bytes).unwrap();
    let options = BocOptions {
        has_index,
        has_crc32c: bytes[4] & 0x40 != 0,
        has_cache_bits: false,
    };
    hex::encode(serialize_boc_ext(&roots, &options).unwrap())
}

/// Known buffers from other implementations come back byte for byte
#[test]
fn test_reference_bocs_are_byte_exact() {
    let vectors = [
        "b5ee9c7241010301000c0002020d020101020c02000155921e09df",
        "b5ee9c72c1010301000c0005090c02020d020101020c02000155b647f116",
        "b5ee9c7241010201000700010155010002113256999a",
        "b5ee9c72410106010040000402000102030401015505003f0000000000000000000000000000000000000000000000000000000000000093000b400000000008000b8000000000200002115085e80e",
        "b5ee9c724101050100450002078000002001020109800000000203000b400000000008010b8000000000200400438004b1ca92c714d3015cba78ec7055fa7e9e65c68905b5f86ea3c66b0b1391bc01b00e6fe71e",
    ];
    for hex in vectors {
        assert_eq!(reserialize(hex), hex);
    }
}

/// A child first reached on a shallow level still lands after every parent
#[test]
fn test_boc_order_moves_late_parents_forward() {
    // same cells as the last reference buffer, laid out depth-first
    let depth_first = "b5ee9c72410105010045000207800000200201000b4000000000080109800000000203010b8000000000200400438004b1ca92c714d3015cba78ec7055fa7e9e65c68905b5f86ea3c66b0b1391bc01b0b8a46275";
    assert_eq!(
        reserialize(depth_first),
        "b5ee9c724101050100450002078000002001020109800000000203000b400000000008010b8000000000200400438004b1ca92c714d3015cba78ec7055fa7e9e65c68905b5f86ea3c66b0b1391bc01b00e6fe71e"
    );
}
