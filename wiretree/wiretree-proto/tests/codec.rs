use wiretree_core::{Field, Message, Scalar, Value};
use wiretree_proto::{
    parse_binary, parse_binary_as, parse_proto_schema, serialize_binary, ProtoSchema,
};

fn person_schema() -> ProtoSchema {
    parse_proto_schema(
        r#"
        syntax = "proto3";
        message Person {
          string name = 1;
          int32 age = 2;
          bool active = 3;
        }
        "#,
    )
    .expect("schema should parse")
}

/// Field 1 (string) with "hello" is `0x0A 0x05 h e l l o`; field 2 (varint)
/// with 150 is `0x10 0x96 0x01`.
#[test]
fn reference_wire_bytes() {
    let schema = person_schema();
    let mut m = Message::new();
    m.push("name", Value::str("hello"));
    m.push("age", Value::int(150));

    let bytes = serialize_binary(&m, &schema, "Person").expect("serialize should succeed");
    assert_eq!(
        bytes,
        vec![0x0A, 0x05, b'h', b'e', b'l', b'l', b'o', 0x10, 0x96, 0x01]
    );
}

#[test]
fn person_round_trip_in_declared_order() {
    let schema = person_schema();
    let mut m = Message::new();
    m.push("name", Value::str("Alice"));
    m.push("age", Value::int(30));
    m.push("active", Value::bool(true));

    let bytes = serialize_binary(&m, &schema, "Person").expect("serialize should succeed");
    let back = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(back, m);

    // Bit-exact the other way around too.
    let again = serialize_binary(&back, &schema, "Person").expect("serialize should succeed");
    assert_eq!(again, bytes);
}

#[test]
fn nested_message_round_trip() {
    let schema = parse_proto_schema(
        r#"
        message Person {
          string name = 1;
          Address address = 2;
        }
        message Address {
          string city = 1;
        }
        "#,
    )
    .expect("schema should parse");

    let mut addr = Message::new();
    addr.push("city", Value::str("SF"));
    let mut m = Message::new();
    m.push("name", Value::str("Bob"));
    m.push("address", Value::Message(addr));

    let bytes = serialize_binary(&m, &schema, "Person").expect("serialize should succeed");
    let back = parse_binary_as(&bytes, &schema, "Person").expect("parse should succeed");
    assert_eq!(back, m);
}

#[test]
fn all_scalar_kinds_round_trip() {
    let schema = parse_proto_schema(
        r#"
        message Kinds {
          int32 a = 1;
          int64 b = 2;
          uint32 c = 3;
          uint64 d = 4;
          sint32 e = 5;
          sint64 f = 6;
          fixed32 g = 7;
          fixed64 h = 8;
          sfixed32 i = 9;
          sfixed64 j = 10;
          float k = 11;
          double l = 12;
          bool m = 13;
          string n = 14;
          bytes o = 15;
        }
        "#,
    )
    .expect("schema should parse");

    let mut m = Message::new();
    m.push("a", Value::int(-42));
    m.push("b", Value::int(i64::MIN));
    m.push("c", Value::uint(u32::MAX as u64));
    m.push("d", Value::uint(u64::MAX));
    m.push("e", Value::int(-1));
    m.push("f", Value::int(i64::MAX));
    m.push("g", Value::uint(7));
    m.push("h", Value::uint(8));
    m.push("i", Value::int(-9));
    m.push("j", Value::int(-10));
    m.push("k", Value::float(1.5));
    m.push("l", Value::float(-2.25));
    m.push("m", Value::bool(true));
    m.push("n", Value::str("hi"));
    m.push("o", Value::bytes(vec![0, 1, 255]));

    let bytes = serialize_binary(&m, &schema, "Kinds").expect("serialize should succeed");
    let back = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(back, m);
}

#[test]
fn repeated_fields_round_trip_as_separate_entries() {
    let schema = parse_proto_schema(
        "message Tags { repeated string tag = 1; }",
    )
    .expect("schema should parse");

    let mut m = Message::new();
    m.push("tag", Value::str("a"));
    m.push("tag", Value::str("b"));

    let bytes = serialize_binary(&m, &schema, "Tags").expect("serialize should succeed");
    let back = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(back.find_fields("tag").len(), 2);
    assert_eq!(back, m);
}

#[test]
fn list_values_expand_to_repeated_entries() {
    let schema = parse_proto_schema(
        "message Tags { repeated int32 n = 1; }",
    )
    .expect("schema should parse");

    let mut with_list = Message::new();
    with_list.push(
        "n",
        Value::List(vec![Value::int(1), Value::int(2), Value::int(3)]),
    );
    let mut expanded = Message::new();
    expanded.push("n", Value::int(1));
    expanded.push("n", Value::int(2));
    expanded.push("n", Value::int(3));

    let a = serialize_binary(&with_list, &schema, "Tags").expect("serialize should succeed");
    let b = serialize_binary(&expanded, &schema, "Tags").expect("serialize should succeed");
    assert_eq!(a, b);
}

#[test]
fn enum_fields_map_numbers_to_names() {
    let schema = parse_proto_schema(
        r#"
        message Item {
          Color color = 1;
        }
        enum Color {
          COLOR_UNSPECIFIED = 0;
          RED = 1;
          BLUE = 2;
        }
        "#,
    )
    .expect("schema should parse");

    let mut m = Message::new();
    m.push("color", Value::str("BLUE"));
    let bytes = serialize_binary(&m, &schema, "Item").expect("serialize should succeed");
    assert_eq!(bytes, vec![0x08, 0x02]);

    let back = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(back.find_field("color").unwrap().value, Value::str("BLUE"));

    // Out-of-set numbers fall back to the raw integer.
    let unknown = vec![0x08, 0x63];
    let back = parse_binary(&unknown, &schema).expect("parse should succeed");
    assert_eq!(back.find_field("color").unwrap().value, Value::int(99));
}

#[test]
fn map_fields_round_trip_as_entry_messages() {
    let schema = parse_proto_schema(
        "message Counter { map<string, int32> counts = 1; }",
    )
    .expect("schema should parse");

    let mut m = Message::new();
    m.push(
        "counts",
        Value::Map(vec![
            (Scalar::Str("a".into()), Value::int(1)),
            (Scalar::Str("b".into()), Value::int(2)),
        ]),
    );

    let bytes = serialize_binary(&m, &schema, "Counter").expect("serialize should succeed");
    let back = parse_binary(&bytes, &schema).expect("parse should succeed");

    let entries = back.find_fields("counts");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|f| f.is_map));
    let Value::Message(first) = &entries[0].value else {
        panic!("expected entry message");
    };
    assert_eq!(first.find_field("key").unwrap().value, Value::str("a"));
    assert_eq!(first.find_field("value").unwrap().value, Value::int(1));

    // Entry-message form re-serializes to the same bytes.
    let again = serialize_binary(&back, &schema, "Counter").expect("serialize should succeed");
    assert_eq!(again, bytes);
}

#[test]
fn unknown_fields_are_skipped_on_read() {
    let schema = person_schema();

    // Field 9 (unknown): varint 7. Field 1: "ok". Field 10 (unknown):
    // length-delimited "zz". Field 2: 5.
    let mut bytes = vec![0x48, 0x07];
    bytes.extend_from_slice(&[0x0A, 0x02, b'o', b'k']);
    bytes.extend_from_slice(&[0x52, 0x02, b'z', b'z']);
    bytes.extend_from_slice(&[0x10, 0x05]);

    let m = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(m.len(), 2);
    assert_eq!(m.find_field("name").unwrap().value, Value::str("ok"));
    assert_eq!(m.find_field("age").unwrap().value, Value::int(5));
}

#[test]
fn unknown_fields_are_skipped_on_write() {
    let schema = person_schema();
    let mut m = Message::new();
    m.push("name", Value::str("ok"));
    m.push_field(Field::new("no_such_field", Value::int(1)));

    let bytes = serialize_binary(&m, &schema, "Person").expect("serialize should succeed");
    assert_eq!(bytes, vec![0x0A, 0x02, b'o', b'k']);
}

#[test]
fn empty_message_serializes_to_empty_bytes() {
    let schema = person_schema();
    let bytes =
        serialize_binary(&Message::new(), &schema, "Person").expect("serialize should succeed");
    assert!(bytes.is_empty());
}

#[test]
fn empty_input_is_a_parse_error() {
    let schema = person_schema();
    let err = parse_binary(&[], &schema).expect_err("should fail");
    assert!(err.to_string().contains("empty input"));
}

#[test]
fn missing_root_type_fails_both_ways() {
    let schema = person_schema();
    assert!(parse_binary_as(&[0x08, 0x01], &schema, "Ghost").is_err());
    assert!(serialize_binary(&Message::new(), &schema, "Ghost").is_err());
}

#[test]
fn truncated_payloads_fail() {
    let schema = person_schema();

    // Length prefix of 5 with only two payload bytes.
    let err = parse_binary(&[0x0A, 0x05, b'h', b'i'], &schema).expect_err("should fail");
    assert!(err.to_string().contains("overruns"));

    // Truncated varint value.
    assert!(parse_binary(&[0x10, 0x80], &schema).is_err());
}

#[test]
fn nested_length_overrun_fails() {
    let schema = parse_proto_schema(
        r#"
        message Outer { Inner inner = 1; }
        message Inner { string s = 1; }
        "#,
    )
    .expect("schema should parse");

    // Outer field 1 claims 4 bytes; inner string claims 9.
    let bytes = vec![0x0A, 0x04, 0x0A, 0x09, b'x', b'y'];
    assert!(parse_binary(&bytes, &schema).is_err());
}

#[test]
fn unknown_embedded_type_is_a_serialization_error() {
    let schema = parse_proto_schema(
        "message Outer { Ghost inner = 1; }",
    )
    .expect("schema should parse");

    let mut m = Message::new();
    m.push("inner", Value::Message(Message::new()));
    let err = serialize_binary(&m, &schema, "Outer").expect_err("should fail");
    assert!(err.to_string().contains("Ghost"));
}
