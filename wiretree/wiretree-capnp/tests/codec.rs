use wiretree_capnp::{parse_capnp_schema, CapnpBinaryParser, CapnpBinarySerializer, CapnpSchema};
use wiretree_core::{Message, Value};

fn roundtrip(schema: &CapnpSchema, value: &Value, root: &str) -> Value {
    let bytes = CapnpBinarySerializer::new(schema)
        .serialize(value, root)
        .expect("serialize should succeed");
    CapnpBinaryParser::new(schema)
        .parse(&bytes, root)
        .expect("parse should succeed")
}

fn msg(fields: Vec<(&str, Value)>) -> Value {
    let mut m = Message::new();
    for (name, value) in fields {
        m.push(name, value);
    }
    Value::Message(m)
}

#[test]
fn primitive_struct_round_trips_with_exact_framing() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct TestStruct { value @0 :UInt32; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("value", Value::uint(42))]);
    let bytes = CapnpBinarySerializer::new(&schema)
        .serialize(&input, "TestStruct")
        .expect("serialize should succeed");

    // Header (8) + root pointer (8) + one data word (8).
    assert_eq!(bytes.len(), 24);
    assert!(bytes.len() >= 16);
    // Segment count - 1 = 0, segment size = 2 words.
    assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
    assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
    // Root: struct pointer, offset 0, one data word.
    assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 1, 0, 0, 0]);
    // Data word holds 42u32 little-endian.
    assert_eq!(&bytes[16..24], &[42, 0, 0, 0, 0, 0, 0, 0]);

    assert_eq!(
        CapnpBinaryParser::new(&schema)
            .parse(&bytes, "TestStruct")
            .expect("parse should succeed"),
        input
    );
}

#[test]
fn sub_word_fields_pack_and_sign_extend() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Packed { flag @0 :Bool; tiny @1 :Int8; small @2 :Int16; wide @3 :Int64; }",
    )
    .expect("schema should parse");

    let input = msg(vec![
        ("flag", Value::bool(true)),
        ("tiny", Value::int(-5)),
        ("small", Value::int(-300)),
        ("wide", Value::int(i64::MIN)),
    ]);
    assert_eq!(roundtrip(&schema, &input, "Packed"), input);
}

#[test]
fn floats_are_bit_casts() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct F { a @0 :Float32; b @1 :Float64; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("a", Value::float(1.5)), ("b", Value::float(-2.25))]);
    assert_eq!(roundtrip(&schema, &input, "F"), input);
}

#[test]
fn text_fields_round_trip_and_strip_the_null() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Person { name @0 :Text; age @1 :UInt8; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("name", Value::str("Alice")), ("age", Value::uint(30))]);
    let bytes = CapnpBinarySerializer::new(&schema)
        .serialize(&input, "Person")
        .expect("serialize should succeed");

    // "Alice" + null terminator appears in the payload.
    let payload = &bytes[8..];
    assert!(payload.windows(6).any(|w| w == b"Alice\0"));
    assert_eq!(
        CapnpBinaryParser::new(&schema)
            .parse(&bytes, "Person")
            .expect("parse should succeed"),
        input
    );
}

#[test]
fn data_fields_keep_raw_bytes() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Blob { payload @0 :Data; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("payload", Value::bytes(vec![0, 1, 254, 255]))]);
    assert_eq!(roundtrip(&schema, &input, "Blob"), input);
}

#[test]
fn primitive_list_round_trips() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Container { numbers @0 :List(UInt32); }",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "numbers",
        Value::List(vec![
            Value::uint(1),
            Value::uint(2),
            Value::uint(3),
            Value::uint(4),
            Value::uint(5),
        ]),
    )]);
    assert_eq!(roundtrip(&schema, &input, "Container"), input);
}

#[test]
fn empty_list_encodes_as_null_pointer_and_reads_back_empty() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Container { numbers @0 :List(UInt32); }",
    )
    .expect("schema should parse");

    let input = msg(vec![("numbers", Value::List(vec![]))]);
    let bytes = CapnpBinarySerializer::new(&schema)
        .serialize(&input, "Container")
        .expect("serialize should succeed");

    // Header + root pointer + one pointer word, which stays null.
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[16..24], &[0u8; 8]);

    let back = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "Container")
        .expect("parse should succeed");
    assert_eq!(back, input);
}

#[test]
fn bool_list_packs_bits() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Flags { bits @0 :List(Bool); }",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "bits",
        Value::List(vec![
            Value::bool(true),
            Value::bool(false),
            Value::bool(true),
        ]),
    )]);
    assert_eq!(roundtrip(&schema, &input, "Flags"), input);
}

#[test]
fn text_list_round_trips() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Words { words @0 :List(Text); }",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "words",
        Value::List(vec![Value::str("one"), Value::str("two")]),
    )]);
    assert_eq!(roundtrip(&schema, &input, "Words"), input);
}

#[test]
fn struct_list_uses_inline_composite_encoding() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Roster { people @0 :List(Person); }\nstruct Person { name @0 :Text; age @1 :UInt8; }",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "people",
        Value::List(vec![
            msg(vec![("name", Value::str("Ann")), ("age", Value::uint(1))]),
            msg(vec![("name", Value::str("Ben")), ("age", Value::uint(2))]),
        ]),
    )]);
    assert_eq!(roundtrip(&schema, &input, "Roster"), input);
}

#[test]
fn nested_structs_round_trip() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Outer { label @0 :Text; inner @1 :Inner; }\nstruct Inner { x @0 :UInt32; y @1 :UInt32; }",
    )
    .expect("schema should parse");

    let input = msg(vec![
        ("label", Value::str("point")),
        ("inner", msg(vec![("x", Value::uint(3)), ("y", Value::uint(4))])),
    ]);
    assert_eq!(roundtrip(&schema, &input, "Outer"), input);
}

#[test]
fn enums_occupy_uint16_slots_and_map_to_names() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { status @0 :Status; }\nenum Status { active @0; inactive @1; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("status", Value::str("inactive"))]);
    assert_eq!(roundtrip(&schema, &input, "S"), input);

    // Unknown ordinals fall back to the raw number.
    let numeric = msg(vec![("status", Value::uint(9))]);
    assert_eq!(roundtrip(&schema, &numeric, "S"), numeric);
}

#[test]
fn missing_fields_read_back_as_defaults() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; name @1 :Text; tags @2 :List(Text); }",
    )
    .expect("schema should parse");

    let back = roundtrip(&schema, &msg(vec![]), "S");
    let expected = msg(vec![
        ("n", Value::uint(0)),
        ("name", Value::null()),
        ("tags", Value::List(vec![])),
    ]);
    assert_eq!(back, expected);
}

#[test]
fn unknown_fields_are_skipped_on_write() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("n", Value::uint(7)), ("ghost", Value::str("x"))]);
    let back = roundtrip(&schema, &input, "S");
    assert_eq!(back, msg(vec![("n", Value::uint(7))]));
}

#[test]
fn empty_input_and_unknown_root_are_errors() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; }",
    )
    .expect("schema should parse");

    assert!(CapnpBinaryParser::new(&schema).parse(&[], "S").is_err());
    assert!(CapnpBinaryParser::new(&schema)
        .parse(&[0, 0, 0, 0, 1, 0, 0, 0], "Ghost")
        .is_err());
    assert!(CapnpBinarySerializer::new(&schema)
        .serialize(&msg(vec![]), "Ghost")
        .is_err());
}

#[test]
fn out_of_bounds_offsets_are_rejected() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { name @0 :Text; }",
    )
    .expect("schema should parse");

    // One-segment message whose root struct pointer points past the end:
    // offset 5 with 0 data words and 1 pointer word.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0, 0, 0, 0]); // count - 1
    bytes.extend_from_slice(&[2, 0, 0, 0]); // 2 words
    let root = (5u64 << 2) | (1u64 << 48); // struct, offset 5, 1 ptr word
    bytes.extend_from_slice(&root.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 8]);

    let err = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "S")
        .expect_err("should fail");
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn truncated_segment_table_is_rejected() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; }",
    )
    .expect("schema should parse");

    // Claims 4 words but provides none.
    let bytes = [0, 0, 0, 0, 4, 0, 0, 0];
    let err = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "S")
        .expect_err("should fail");
    assert!(err.to_string().contains("segment"));
}

#[test]
fn double_far_pointers_are_rejected() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; }",
    )
    .expect("schema should parse");

    // Root is a far pointer with the landing-pad (double-far) flag set.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&[1, 0, 0, 0]);
    let far = 2u64 | (1 << 2); // far, double_far = true, offset 0, segment 0
    bytes.extend_from_slice(&far.to_le_bytes());

    let err = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "S")
        .expect_err("should fail");
    assert!(err.to_string().contains("double-far"));
}

#[test]
fn single_far_pointers_resolve_across_segments() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct S { n @0 :UInt32; }",
    )
    .expect("schema should parse");

    // Two segments: segment 0 holds a far pointer to segment 1 word 0,
    // where a struct pointer (offset 0, 1 data word) precedes the data.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[1, 0, 0, 0]); // count - 1 = 1
    bytes.extend_from_slice(&[1, 0, 0, 0]); // segment 0: 1 word
    bytes.extend_from_slice(&[2, 0, 0, 0]); // segment 1: 2 words
    bytes.extend_from_slice(&[0, 0, 0, 0]); // header padding (count even)
    let far = 2u64 | (0 << 3) | (1u64 << 32); // to segment 1, word 0
    bytes.extend_from_slice(&far.to_le_bytes());
    let root = 1u64 << 32; // struct: offset 0, 1 data word
    bytes.extend_from_slice(&root.to_le_bytes());
    bytes.extend_from_slice(&99u64.to_le_bytes());

    let value = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "S")
        .expect("parse should succeed");
    assert_eq!(value, msg(vec![("n", Value::uint(99))]));
}
