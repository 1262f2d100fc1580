use bytes::Bytes;
use wiretree_proto::wire::{
    decode_tag, decode_varint, decode_zigzag32, decode_zigzag64, encode_tag, encode_varint,
    encode_zigzag32, encode_zigzag64, WireType,
};

fn varint(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    encode_varint(value, &mut out);
    out
}

#[test]
fn varint_known_vectors() {
    assert_eq!(varint(0), vec![0x00]);
    assert_eq!(varint(1), vec![0x01]);
    assert_eq!(varint(127), vec![0x7F]);
    assert_eq!(varint(128), vec![0x80, 0x01]);
    assert_eq!(varint(300), vec![0xAC, 0x02]);
}

#[test]
fn varint_single_byte_below_128() {
    for n in 0..128u64 {
        assert_eq!(varint(n).len(), 1, "n = {n}");
    }
}

#[test]
fn varint_round_trips_across_the_range() {
    for n in [
        0u64,
        1,
        127,
        128,
        300,
        16_383,
        16_384,
        u64::from(u32::MAX),
        u64::MAX - 1,
        u64::MAX,
    ] {
        let mut buf = Bytes::from(varint(n));
        let decoded = decode_varint(&mut buf).expect("decode should succeed");
        assert_eq!(decoded, n);
        assert!(!bytes::Buf::has_remaining(&buf));
    }
}

#[test]
fn varint_rejects_truncation() {
    // Continuation bit set with nothing after it.
    let mut buf = Bytes::from_static(&[0x80]);
    let err = decode_varint(&mut buf).expect_err("should fail");
    assert!(err.to_string().contains("truncated varint"));
}

#[test]
fn varint_rejects_eleven_bytes() {
    let mut buf = Bytes::from(vec![0x80u8; 11]);
    let err = decode_varint(&mut buf).expect_err("should fail");
    assert!(err.to_string().contains("exceeds 10 bytes"));
}

#[test]
fn zigzag_known_vectors() {
    assert_eq!(encode_zigzag32(0), 0);
    assert_eq!(encode_zigzag32(-1), 1);
    assert_eq!(encode_zigzag32(1), 2);
    assert_eq!(encode_zigzag32(-2), 3);
    assert_eq!(encode_zigzag64(-1), 1);
    assert_eq!(encode_zigzag64(1), 2);
}

#[test]
fn zigzag_round_trips() {
    for n in [0i64, 1, -1, 2, -2, i64::MIN, i64::MAX, 123_456_789, -987_654_321] {
        assert_eq!(decode_zigzag64(encode_zigzag64(n)), n);
    }
    for n in [0i32, 1, -1, i32::MIN, i32::MAX] {
        assert_eq!(decode_zigzag32(encode_zigzag32(n)), n);
    }
}

/// `(field_number << 3) | wire_type`, then varint-encoded.
#[test]
fn tag_encoding_matches_reference_bytes() {
    let mut out = Vec::new();
    encode_tag(150, WireType::Varint, &mut out);
    assert_eq!(out, vec![0xB0, 0x09]);

    // Field 1, varint: single byte 0x08.
    let mut out = Vec::new();
    encode_tag(1, WireType::Varint, &mut out);
    assert_eq!(out, vec![0x08]);

    // Field 1, length-delimited: 0x0A.
    let mut out = Vec::new();
    encode_tag(1, WireType::Len, &mut out);
    assert_eq!(out, vec![0x0A]);
}

#[test]
fn tag_decoding_splits_number_and_type() {
    let mut buf = Bytes::from_static(&[0x08]);
    let (number, wire_type) = decode_tag(&mut buf).expect("decode should succeed");
    assert_eq!(number, 1);
    assert_eq!(wire_type, WireType::Varint);
}

#[test]
fn tag_rejects_group_wire_types() {
    // (1 << 3) | 3 = start-group, unsupported.
    let mut buf = Bytes::from_static(&[0x0B]);
    let err = decode_tag(&mut buf).expect_err("should fail");
    assert!(err.to_string().contains("unsupported wire type 3"));
}
