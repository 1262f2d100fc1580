//! End-to-end scenarios across the whole library surface.

use wiretree::{
    parse_binary, parse_capnp_schema, parse_flatbuffers_binary, parse_flatbuffers_schema,
    parse_proto_schema, parse_textproto, serialize_binary, serialize_flatbuffers, to_textproto,
    CapnpBinaryParser, CapnpBinarySerializer, Message, Value,
};

fn msg(fields: Vec<(&str, Value)>) -> Value {
    let mut m = Message::new();
    for (name, value) in fields {
        m.push(name, value);
    }
    Value::Message(m)
}

/// Proto3 round-trip: tag+value per field in declared order, re-parse
/// equals the input.
#[test]
fn proto3_person_round_trip() {
    let schema = parse_proto_schema(
        "message Person { string name = 1; int32 age = 2; bool active = 3; }",
    )
    .expect("schema should parse");

    let mut person = Message::new();
    person.push("name", Value::str("Alice"));
    person.push("age", Value::int(30));
    person.push("active", Value::bool(true));

    let bytes = serialize_binary(&person, &schema, "Person").expect("serialize should succeed");
    let mut expected = Vec::new();
    expected.extend_from_slice(&[0x0A, 0x05]);
    expected.extend_from_slice(b"Alice");
    expected.extend_from_slice(&[0x10, 30]);
    expected.extend_from_slice(&[0x18, 1]);
    assert_eq!(bytes, expected);

    assert_eq!(parse_binary(&bytes, &schema).expect("parse should succeed"), person);
}

/// Nested embedded message: binary round-trips and the textproto emitter
/// produces the block form.
#[test]
fn nested_message_binary_and_text() {
    let schema = parse_proto_schema(
        "message Person { string name = 1; Address address = 2; } message Address { string city = 1; }",
    )
    .expect("schema should parse");

    let mut addr = Message::new();
    addr.push("city", Value::str("SF"));
    let mut person = Message::new();
    person.push("name", Value::str("Bob"));
    person.push("address", Value::Message(addr));

    let bytes = serialize_binary(&person, &schema, "Person").expect("serialize should succeed");
    assert_eq!(parse_binary(&bytes, &schema).expect("parse should succeed"), person);

    assert_eq!(
        to_textproto(&person),
        "name: \"Bob\"\naddress {\n  city: \"SF\"\n}\n"
    );
}

/// Cap'n Proto primitive: at least segment header + root pointer + struct.
#[test]
fn capnp_primitive_struct() {
    let schema = parse_capnp_schema(
        "@0xbf5147cbbecf40c1;\nstruct TestStruct { value @0 :UInt32; }",
    )
    .expect("schema should parse");

    let input = msg(vec![("value", Value::uint(42))]);
    let bytes = CapnpBinarySerializer::new(&schema)
        .serialize(&input, "TestStruct")
        .expect("serialize should succeed");
    assert!(bytes.len() >= 16);

    let back = CapnpBinaryParser::new(&schema)
        .parse(&bytes, "TestStruct")
        .expect("parse should succeed");
    assert_eq!(back, input);
}

/// Cap'n Proto list round-trip, including the empty-list null pointer.
#[test]
fn capnp_list_round_trip() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct Container { numbers @0 :List(UInt32); }",
    )
    .expect("schema should parse");
    let serializer = CapnpBinarySerializer::new(&schema);
    let parser = CapnpBinaryParser::new(&schema);

    let input = msg(vec![(
        "numbers",
        Value::List((1..=5).map(Value::uint).collect()),
    )]);
    let bytes = serializer
        .serialize(&input, "Container")
        .expect("serialize should succeed");
    assert_eq!(parser.parse(&bytes, "Container").expect("parse should succeed"), input);

    let empty = msg(vec![("numbers", Value::List(vec![]))]);
    let bytes = serializer
        .serialize(&empty, "Container")
        .expect("serialize should succeed");
    assert_eq!(parser.parse(&bytes, "Container").expect("parse should succeed"), empty);
}

/// FlatBuffers table round-trip.
#[test]
fn flatbuffers_monster_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table Monster { hp: int; name: string; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![("hp", Value::int(150)), ("name", Value::str("Dragon"))]);
    let bytes = serialize_flatbuffers(&input, &schema).expect("serialize should succeed");
    assert_eq!(
        parse_flatbuffers_binary(&bytes, &schema).expect("parse should succeed"),
        input
    );
}

/// Textproto duplicates survive a parse/emit/parse cycle as separate
/// fields.
#[test]
fn textproto_duplicate_fields() {
    let input = "subsets: \"latin\"\nsubsets: \"cyrillic\"\n";
    let m = parse_textproto(input).expect("parse should succeed");
    assert_eq!(m.find_fields("subsets").len(), 2);

    let emitted = to_textproto(&m);
    assert_eq!(emitted, input);
    assert_eq!(parse_textproto(&emitted).expect("reparse should succeed"), m);
}

/// The three-way conversion path: text → model → binary → model → text.
#[test]
fn text_to_binary_and_back() {
    let schema = parse_proto_schema(
        "message Person { string name = 1; int32 age = 2; }",
    )
    .expect("schema should parse");

    let m = parse_textproto("name: \"Ann\"\nage: 41\n").expect("parse should succeed");
    let bytes = serialize_binary(&m, &schema, "Person").expect("serialize should succeed");
    let back = parse_binary(&bytes, &schema).expect("parse should succeed");
    assert_eq!(to_textproto(&back), "name: \"Ann\"\nage: 41\n");
}

/// JSON/YAML rendering of a decoded message.
#[test]
fn rendering_to_json_and_yaml() {
    let m = parse_textproto("name: \"Ann\"\ntags: \"a\"\ntags: \"b\"\n")
        .expect("parse should succeed");
    assert_eq!(m.to_json(), r#"{"name":"Ann","tags":["a","b"]}"#);
    let yaml = m.to_yaml();
    assert!(yaml.contains("name: Ann"));
    assert!(yaml.contains("- a"));
}
