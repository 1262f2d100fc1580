use wiretree_core::{Message, Value};
use wiretree_flatbuffers::{parse_flatbuffers_binary, parse_flatbuffers_schema, serialize_flatbuffers, FbsSchema};

fn msg(fields: Vec<(&str, Value)>) -> Value {
    let mut m = Message::new();
    for (name, value) in fields {
        m.push(name, value);
    }
    Value::Message(m)
}

fn roundtrip(schema: &FbsSchema, value: &Value) -> Value {
    let bytes = serialize_flatbuffers(value, schema).expect("serialize should succeed");
    parse_flatbuffers_binary(&bytes, schema).expect("parse should succeed")
}

#[test]
fn monster_round_trips() {
    let schema = parse_flatbuffers_schema(
        "table Monster { hp: int; name: string; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![("hp", Value::int(150)), ("name", Value::str("Dragon"))]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn vtable_layout_matches_the_wire_contract() {
    let schema = parse_flatbuffers_schema(
        "table Monster { hp: int; name: string; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![("hp", Value::int(100)), ("name", Value::str("Orc"))]);
    let bytes = serialize_flatbuffers(&input, &schema).expect("serialize should succeed");

    // Root uoffset points at the table's soffset.
    let root = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let soffset = i32::from_le_bytes(bytes[root..root + 4].try_into().unwrap());
    let vtable = (root as i64 - i64::from(soffset)) as usize;

    let vtable_size = u16::from_le_bytes(bytes[vtable..vtable + 2].try_into().unwrap());
    let object_size = u16::from_le_bytes(bytes[vtable + 2..vtable + 4].try_into().unwrap());
    // Two fields: 4 header bytes + 2 entries.
    assert_eq!(vtable_size, 8);
    // soffset (4) + int (4) + string uoffset (4).
    assert_eq!(object_size, 12);

    let hp_entry = u16::from_le_bytes(bytes[vtable + 4..vtable + 6].try_into().unwrap());
    let hp = i32::from_le_bytes(
        bytes[root + usize::from(hp_entry)..root + usize::from(hp_entry) + 4]
            .try_into()
            .unwrap(),
    );
    assert_eq!(hp, 100);

    // The string payload is length-prefixed and null-terminated.
    assert!(bytes.windows(4).any(|w| w == b"Orc\0"));
}

#[test]
fn absent_fields_read_back_as_null() {
    let schema = parse_flatbuffers_schema(
        "table Monster { hp: int; name: string; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![("name", Value::str("Orc"))]);
    let back = roundtrip(&schema, &input);
    assert_eq!(
        back,
        msg(vec![("hp", Value::null()), ("name", Value::str("Orc"))])
    );
}

#[test]
fn absent_fields_with_declared_defaults_read_back_as_the_default() {
    let schema = parse_flatbuffers_schema(
        "table Monster { hp: int = 100; name: string; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let back = roundtrip(&schema, &msg(vec![("name", Value::str("Orc"))]));
    let Value::Message(m) = &back else {
        panic!("expected message");
    };
    assert_eq!(m.find_field("hp").unwrap().value, Value::uint(100));
}

#[test]
fn all_scalar_widths_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table T { a: bool; b: byte; c: ubyte; d: short; e: ushort; f: int; g: uint; h: long; i: ulong; j: float; k: double; }\nroot_type T;",
    )
    .expect("schema should parse");

    let input = msg(vec![
        ("a", Value::bool(true)),
        ("b", Value::int(-8)),
        ("c", Value::uint(200)),
        ("d", Value::int(-30000)),
        ("e", Value::uint(60000)),
        ("f", Value::int(-2_000_000_000)),
        ("g", Value::uint(4_000_000_000)),
        ("h", Value::int(i64::MIN)),
        ("i", Value::uint(u64::MAX)),
        ("j", Value::float(1.5)),
        ("k", Value::float(-2.25)),
    ]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn scalar_vectors_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table T { inventory: [ubyte]; scores: [double]; }\nroot_type T;",
    )
    .expect("schema should parse");

    let input = msg(vec![
        (
            "inventory",
            Value::List(vec![Value::uint(1), Value::uint(2), Value::uint(3)]),
        ),
        (
            "scores",
            Value::List(vec![Value::float(0.5), Value::float(1.5)]),
        ),
    ]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn string_vectors_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table T { names: [string]; }\nroot_type T;",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "names",
        Value::List(vec![Value::str("ab"), Value::str("cdef"), Value::str("")]),
    )]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn nested_tables_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table Weapon { name: string; damage: short; }\ntable Monster { name: string; weapon: Weapon; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![
        ("name", Value::str("Orc")),
        (
            "weapon",
            msg(vec![("name", Value::str("axe")), ("damage", Value::int(5))]),
        ),
    ]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn table_vectors_round_trip() {
    let schema = parse_flatbuffers_schema(
        "table Weapon { damage: short; }\ntable Monster { weapons: [Weapon]; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![(
        "weapons",
        Value::List(vec![
            msg(vec![("damage", Value::int(3))]),
            msg(vec![("damage", Value::int(5))]),
        ]),
    )]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn structs_are_stored_inline() {
    let schema = parse_flatbuffers_schema(
        "struct Vec3 { x: float; y: float; z: float; }\ntable Monster { pos: Vec3; hp: int; }\nroot_type Monster;",
    )
    .expect("schema should parse");

    let input = msg(vec![
        (
            "pos",
            msg(vec![
                ("x", Value::float(1.0)),
                ("y", Value::float(2.0)),
                ("z", Value::float(3.0)),
            ]),
        ),
        ("hp", Value::int(9)),
    ]);
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn enums_map_to_names_with_numeric_fallback() {
    let schema = parse_flatbuffers_schema(
        "enum Color : byte { Red = 0, Green, Blue }\ntable T { color: Color; }\nroot_type T;",
    )
    .expect("schema should parse");

    let input = msg(vec![("color", Value::str("Green"))]);
    assert_eq!(roundtrip(&schema, &input), input);

    let numeric = msg(vec![("color", Value::int(9))]);
    assert_eq!(roundtrip(&schema, &numeric), numeric);
}

#[test]
fn file_identifier_is_emitted_after_the_root_offset() {
    let schema = parse_flatbuffers_schema(
        "table T { x: int; }\nroot_type T;\nfile_identifier \"MONS\";",
    )
    .expect("schema should parse");

    let input = msg(vec![("x", Value::int(1))]);
    let bytes = serialize_flatbuffers(&input, &schema).expect("serialize should succeed");
    assert_eq!(&bytes[4..8], b"MONS");
    assert_eq!(roundtrip(&schema, &input), input);
}

#[test]
fn empty_input_and_missing_root_type_fail() {
    let schema = parse_flatbuffers_schema(
        "table T { x: int; }\nroot_type T;",
    )
    .expect("schema should parse");
    assert!(parse_flatbuffers_binary(&[], &schema).is_err());

    let no_root = parse_flatbuffers_schema("table T { x: int; }").expect("schema should parse");
    let err = parse_flatbuffers_binary(&[0, 0, 0, 0], &no_root).expect_err("should fail");
    assert!(err.to_string().contains("root_type"));

    assert!(serialize_flatbuffers(&msg(vec![]), &no_root).is_err());
}

#[test]
fn truncated_buffers_fail() {
    let schema = parse_flatbuffers_schema(
        "table T { x: int; }\nroot_type T;",
    )
    .expect("schema should parse");

    // Root uoffset pointing past the end.
    let err = parse_flatbuffers_binary(&[200, 0, 0, 0], &schema).expect_err("should fail");
    assert!(err.to_string().contains("past the end"));

    // Too short for even the root uoffset.
    assert!(parse_flatbuffers_binary(&[1, 2], &schema).is_err());
}
