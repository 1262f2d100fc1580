use wiretree_capnp::{parse_capnp_schema, FieldType, PrimitiveType};
use wiretree_core::Scalar;

#[test]
fn parses_a_full_capnp_file() {
    let schema = parse_capnp_schema(
        r#"
        @0xbf5147cbbecf40c1;

        # A demo schema.
        using Common = import "common.capnp";

        const maxRetries :UInt8 = 3;

        struct Person {
          name @0 :Text;
          age @1 :UInt8;
          email @2 :Text;
          scores @3 :List(Float64) $compact;
          status @4 :Status;
          address @5 :Address;

          struct Address {
            city @0 :Text;
          }

          union {
            employed @6 :Text;
            retired @7 :Void;
          }

          extras @8 :group {
            note @9 :Text;
          }
        }

        enum Status {
          active @0;
          inactive @1;
        }

        interface Directory {
          lookup @0 (name :Text) -> (person :Person);
          remove @1 (name :Text);
        }
        "#,
    )
    .expect("schema should parse");

    assert_eq!(schema.file_id, "0xbf5147cbbecf40c1");
    assert_eq!(schema.usings.len(), 1);
    assert_eq!(schema.usings[0].alias, "Common");
    assert_eq!(schema.constants.len(), 1);
    assert_eq!(schema.constants[0].value, Scalar::UInt(3));

    let person = schema.find_struct("Person").expect("Person exists");
    assert_eq!(person.fields.len(), 6);
    assert_eq!(person.fields[0].ordinal, 0);
    assert_eq!(
        person.fields[3].ty,
        FieldType::List(Box::new(FieldType::Primitive(PrimitiveType::Float64)))
    );
    assert_eq!(person.fields[4].ty, FieldType::Named("Status".to_string()));

    assert_eq!(person.unions.len(), 1);
    assert_eq!(person.unions[0].fields.len(), 2);
    assert_eq!(person.groups.len(), 1);
    assert_eq!(person.groups[0].name, "extras");
    assert!(schema.find_struct("Address").is_some());

    let status = schema.find_enum("Status").expect("Status exists");
    assert_eq!(status.ordinal_of("inactive"), Some(1));
    assert_eq!(status.name_of(0), Some("active"));

    assert_eq!(schema.interfaces.len(), 1);
    let dir = &schema.interfaces[0];
    assert_eq!(dir.methods.len(), 2);
    assert_eq!(dir.methods[0].params.len(), 1);
    assert_eq!(dir.methods[0].results.len(), 1);
    assert!(dir.methods[1].results.is_empty());
}

#[test]
fn file_id_is_required() {
    let err = parse_capnp_schema("struct A { x @0 :Bool; }").expect_err("should fail");
    assert!(err.to_string().contains("parse error"));
}

#[test]
fn nested_list_types_parse() {
    let schema = parse_capnp_schema(
        "@0xabc123;\nstruct M { grid @0 :List(List(UInt32)); }",
    )
    .expect("schema should parse");
    let m = schema.find_struct("M").expect("M exists");
    assert_eq!(
        m.fields[0].ty,
        FieldType::List(Box::new(FieldType::List(Box::new(FieldType::Primitive(
            PrimitiveType::UInt32
        )))))
    );
}

#[test]
fn field_defaults_are_typed_by_literal_form() {
    let schema = parse_capnp_schema(
        "@0x1;\nstruct D { a @0 :Int32 = -5; b @1 :Float64 = 1.5; c @2 :Bool = true; d @3 :Text = \"hi\"; }",
    )
    .expect("schema should parse");
    let d = schema.find_struct("D").expect("D exists");
    assert_eq!(d.fields[0].default_value, Some(Scalar::Int(-5)));
    assert_eq!(d.fields[1].default_value, Some(Scalar::Float(1.5)));
    assert_eq!(d.fields[2].default_value, Some(Scalar::Bool(true)));
    assert_eq!(d.fields[3].default_value, Some(Scalar::Str("hi".into())));
}

#[test]
fn duplicate_ordinals_are_rejected() {
    let err = parse_capnp_schema(
        "@0x1;\nstruct A { x @0 :Bool; y @0 :Bool; }",
    )
    .expect_err("should fail");
    assert!(err.to_string().contains("duplicate ordinal"));
}

#[test]
fn single_member_unions_are_rejected() {
    let err = parse_capnp_schema(
        "@0x1;\nstruct A { union { only @0 :Bool; } }",
    )
    .expect_err("should fail");
    assert!(err.to_string().contains("fewer than 2"));
}
