//! `.capnp` IDL grammar and processor.
//!
//! nom recursive-descent in the same shape as the proto3 parser: `sp` eats
//! whitespace and `#…EOL` comments, each production is one combinator
//! function, and the processor checks schema invariants before returning.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1},
    combinator::{map, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use wiretree_core::{ParseError, Scalar};

use crate::schema::{
    Annotation, CapnpSchema, ConstDef, EnumDef, FieldDef, FieldType, GroupDef, InterfaceDef,
    MethodDef, PrimitiveType, StructDef, UnionDef, UsingDef,
};

/// Parse a `.capnp` source into a validated [`CapnpSchema`].
pub fn parse_capnp_schema(source: &str) -> Result<CapnpSchema, ParseError> {
    let (rest, schema) = match schema_file(source) {
        Ok(ok) => ok,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::at_offset(
                "invalid capnp syntax",
                source,
                source.len() - e.input.len(),
            ));
        }
        Err(nom::Err::Incomplete(_)) => return Err(ParseError::new("unexpected end of input")),
    };
    let (rest, ()) = sp(rest).unwrap_or((rest, ()));
    if !rest.is_empty() {
        return Err(ParseError::at_offset(
            "unexpected token",
            source,
            source.len() - rest.len(),
        ));
    }
    schema
        .check_invariants()
        .map_err(|e| ParseError::new(e.to_string()))?;
    Ok(schema)
}

enum TopLevel {
    Using(UsingDef),
    Const(ConstDef),
    Struct(StructDef),
    Enum(EnumDef),
    Interface(InterfaceDef),
    Annotation(Annotation),
}

enum StructItem {
    Field(FieldDef),
    Union(UnionDef),
    Group(GroupDef),
    Struct(StructDef),
    Enum(EnumDef),
    Interface(InterfaceDef),
    Annotation(Annotation),
}

fn schema_file(input: &str) -> IResult<&str, CapnpSchema> {
    let (input, ()) = sp(input)?;
    let (input, file_id) = file_id(input)?;
    let (input, items) = many0(preceded(sp, top_level))(input)?;

    let mut schema = CapnpSchema {
        file_id,
        usings: Vec::new(),
        structs: Vec::new(),
        enums: Vec::new(),
        interfaces: Vec::new(),
        constants: Vec::new(),
    };
    for item in items {
        match item {
            TopLevel::Using(u) => schema.usings.push(u),
            TopLevel::Const(c) => schema.constants.push(c),
            TopLevel::Struct(s) => schema.structs.push(s),
            TopLevel::Enum(e) => schema.enums.push(e),
            TopLevel::Interface(i) => schema.interfaces.push(i),
            TopLevel::Annotation(_) => {}
        }
    }
    Ok((input, schema))
}

/// `@0xHEX;` at the top of every file.
fn file_id(input: &str) -> IResult<&str, String> {
    map(
        tuple((
            char('@'),
            tag("0x"),
            take_while1(|c: char| c.is_ascii_hexdigit()),
            preceded(sp, char(';')),
        )),
        |(_, _, hex, _): (_, _, &str, _)| format!("0x{hex}"),
    )(input)
}

/// Whitespace and `#…EOL` comments.
fn sp(mut input: &str) -> IResult<&str, ()> {
    loop {
        let trimmed = input.trim_start();
        if trimmed.starts_with('#') {
            input = match trimmed.find('\n') {
                Some(nl) => &trimmed[nl + 1..],
                None => "",
            };
        } else {
            return Ok((trimmed, ()));
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (rest, matched) = tag(word)(input)?;
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, matched))
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), opt(is_not("\"")), char('"')),
        |s: Option<&str>| s.unwrap_or("").to_string(),
    )(input)
}

fn ordinal(input: &str) -> IResult<&str, u16> {
    let (rest, digits) = preceded(char('@'), digit1)(input)?;
    let value: u16 = digits.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((rest, value))
}

fn top_level(input: &str) -> IResult<&str, TopLevel> {
    alt((
        map(using_decl, TopLevel::Using),
        map(const_decl, TopLevel::Const),
        map(struct_def, TopLevel::Struct),
        map(enum_def, TopLevel::Enum),
        map(interface_def, TopLevel::Interface),
        map(annotation_use, TopLevel::Annotation),
    ))(input)
}

/// `using Alias = import "path";`
fn using_decl(input: &str) -> IResult<&str, UsingDef> {
    map(
        tuple((
            keyword("using"),
            preceded(sp, identifier),
            preceded(sp, char('=')),
            preceded(sp, keyword("import")),
            preceded(sp, string_literal),
            preceded(sp, char(';')),
        )),
        |(_, alias, _, _, path, _)| UsingDef {
            alias: alias.to_string(),
            path,
        },
    )(input)
}

/// `const name :Type = value;`
fn const_decl(input: &str) -> IResult<&str, ConstDef> {
    map(
        tuple((
            keyword("const"),
            preceded(sp, identifier),
            preceded(sp, char(':')),
            preceded(sp, type_expr),
            preceded(sp, char('=')),
            preceded(sp, literal),
            preceded(sp, char(';')),
        )),
        |(_, name, _, ty, _, value, _)| ConstDef {
            name: name.to_string(),
            ty,
            value,
        },
    )(input)
}

/// Primitive names, `List(T)` (recursive), or a (possibly dotted) user type.
fn type_expr(input: &str) -> IResult<&str, FieldType> {
    alt((list_type, named_type))(input)
}

fn list_type(input: &str) -> IResult<&str, FieldType> {
    map(
        tuple((
            keyword("List"),
            preceded(sp, char('(')),
            preceded(sp, type_expr),
            preceded(sp, char(')')),
        )),
        |(_, _, elem, _)| FieldType::List(Box::new(elem)),
    )(input)
}

fn named_type(input: &str) -> IResult<&str, FieldType> {
    map(
        recognize(separated_list1(char('.'), identifier)),
        |name: &str| match PrimitiveType::from_name(name) {
            Some(p) => FieldType::Primitive(p),
            None => FieldType::Named(name.to_string()),
        },
    )(input)
}

/// A default or const literal, typed by its form.
fn literal(input: &str) -> IResult<&str, Scalar> {
    alt((
        map(string_literal, Scalar::Str),
        map(keyword("true"), |_| Scalar::Bool(true)),
        map(keyword("false"), |_| Scalar::Bool(false)),
        map(keyword("void"), |_| Scalar::Null),
        number_literal,
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, Scalar> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        alt((
            recognize(tuple((tag("0x"), take_while1(|c: char| c.is_ascii_hexdigit())))),
            recognize(tuple((
                digit1,
                opt(tuple((char('.'), digit1))),
                opt(tuple((
                    nom::character::complete::one_of("eE"),
                    opt(nom::character::complete::one_of("+-")),
                    digit1,
                ))),
            ))),
        )),
    )))(input)?;

    let scalar = if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).map(Scalar::UInt).ok()
    } else if let Some(hex) = text.strip_prefix("-0x") {
        u64::from_str_radix(hex, 16)
            .ok()
            .map(|v| Scalar::Int(-(v as i64)))
    } else if text.contains('.') || text.contains('e') || text.contains('E') {
        text.parse::<f64>().map(Scalar::Float).ok()
    } else if text.starts_with('-') {
        text.parse::<i64>().map(Scalar::Int).ok()
    } else {
        text.parse::<u64>().map(Scalar::UInt).ok()
    };
    match scalar {
        Some(s) => Ok((rest, s)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// `name @N :Type [= default];`
fn field_def(input: &str) -> IResult<&str, FieldDef> {
    map(
        tuple((
            identifier,
            preceded(sp, ordinal),
            preceded(sp, char(':')),
            preceded(sp, type_expr),
            opt(preceded(tuple((sp, char('='), sp)), literal)),
            many0(preceded(sp, annotation_suffix)),
            preceded(sp, char(';')),
        )),
        |(name, ordinal, _, ty, default_value, _, _)| FieldDef {
            name: name.to_string(),
            ordinal,
            ty,
            default_value,
        },
    )(input)
}

/// `$annotation` or `$annotation(value)` attached to a declaration.
fn annotation_suffix(input: &str) -> IResult<&str, Annotation> {
    map(
        tuple((
            char('$'),
            recognize(separated_list1(char('.'), identifier)),
            opt(delimited(char('('), opt(is_not(")")), char(')'))),
        )),
        |(_, name, value): (_, &str, Option<Option<&str>>)| Annotation {
            name: name.to_string(),
            value: value.flatten().map(str::to_string),
        },
    )(input)
}

/// A standalone annotation statement inside a body: `$ann;` / `$ann(v);`
fn annotation_use(input: &str) -> IResult<&str, Annotation> {
    map(
        tuple((annotation_suffix, preceded(sp, char(';')))),
        |(a, _)| a,
    )(input)
}

fn struct_def(input: &str) -> IResult<&str, StructDef> {
    let (input, (_, name, anns, _, items, _)) = tuple((
        keyword("struct"),
        preceded(sp, identifier),
        many0(preceded(sp, annotation_suffix)),
        preceded(sp, char('{')),
        many0(preceded(sp, struct_item)),
        preceded(sp, char('}')),
    ))(input)?;

    let mut def = StructDef {
        name: name.to_string(),
        fields: Vec::new(),
        unions: Vec::new(),
        groups: Vec::new(),
        nested_structs: Vec::new(),
        nested_enums: Vec::new(),
        nested_interfaces: Vec::new(),
        annotations: anns,
    };
    for item in items {
        match item {
            StructItem::Field(f) => def.fields.push(f),
            StructItem::Union(u) => def.unions.push(u),
            StructItem::Group(g) => def.groups.push(g),
            StructItem::Struct(s) => def.nested_structs.push(s),
            StructItem::Enum(e) => def.nested_enums.push(e),
            StructItem::Interface(i) => def.nested_interfaces.push(i),
            StructItem::Annotation(a) => def.annotations.push(a),
        }
    }
    Ok((input, def))
}

fn struct_item(input: &str) -> IResult<&str, StructItem> {
    alt((
        map(struct_def, StructItem::Struct),
        map(enum_def, StructItem::Enum),
        map(interface_def, StructItem::Interface),
        map(union_def, StructItem::Union),
        map(group_def, StructItem::Group),
        map(annotation_use, StructItem::Annotation),
        map(field_def, StructItem::Field),
    ))(input)
}

/// `union { a @1 :T; b @2 :U; }` or `which :union { … }`.
fn union_def(input: &str) -> IResult<&str, UnionDef> {
    map(
        tuple((
            opt(tuple((identifier, sp, char(':'), sp))),
            keyword("union"),
            preceded(sp, char('{')),
            many0(preceded(sp, field_def)),
            preceded(sp, char('}')),
        )),
        |(named, _, _, fields, _)| UnionDef {
            name: named.map(|(n, _, _, _)| n.to_string()),
            fields,
        },
    )(input)
}

/// `name @ord :group { fields }`
fn group_def(input: &str) -> IResult<&str, GroupDef> {
    map(
        tuple((
            identifier,
            preceded(sp, ordinal),
            preceded(sp, char(':')),
            preceded(sp, keyword("group")),
            preceded(sp, char('{')),
            many0(preceded(sp, field_def)),
            preceded(sp, char('}')),
        )),
        |(name, ordinal, _, _, _, fields, _)| GroupDef {
            name: name.to_string(),
            ordinal,
            fields,
        },
    )(input)
}

fn enum_def(input: &str) -> IResult<&str, EnumDef> {
    map(
        tuple((
            keyword("enum"),
            preceded(sp, identifier),
            preceded(sp, char('{')),
            many0(preceded(sp, enumerant)),
            preceded(sp, char('}')),
        )),
        |(_, name, _, enumerants, _)| EnumDef {
            name: name.to_string(),
            enumerants,
        },
    )(input)
}

/// `name @N;`
fn enumerant(input: &str) -> IResult<&str, (String, u16)> {
    map(
        tuple((identifier, preceded(sp, ordinal), preceded(sp, char(';')))),
        |(name, ordinal, _)| (name.to_string(), ordinal),
    )(input)
}

fn interface_def(input: &str) -> IResult<&str, InterfaceDef> {
    map(
        tuple((
            keyword("interface"),
            preceded(sp, identifier),
            preceded(sp, char('{')),
            many0(preceded(sp, method_def)),
            preceded(sp, char('}')),
        )),
        |(_, name, _, methods, _)| InterfaceDef {
            name: name.to_string(),
            methods,
        },
    )(input)
}

/// `name @N (a :T, b :U) -> (r :V);` — the result list is optional.
fn method_def(input: &str) -> IResult<&str, MethodDef> {
    map(
        tuple((
            identifier,
            preceded(sp, ordinal),
            preceded(sp, param_list),
            opt(preceded(tuple((sp, tag("->"), sp)), param_list)),
            preceded(sp, char(';')),
        )),
        |(name, ordinal, params, results, _)| MethodDef {
            name: name.to_string(),
            ordinal,
            params,
            results: results.unwrap_or_default(),
        },
    )(input)
}

fn param_list(input: &str) -> IResult<&str, Vec<(String, FieldType)>> {
    delimited(
        char('('),
        separated_list0(
            tuple((sp, char(','), sp)),
            map(
                tuple((preceded(sp, identifier), preceded(sp, char(':')), preceded(sp, type_expr))),
                |(name, _, ty)| (name.to_string(), ty),
            ),
        ),
        preceded(sp, char(')')),
    )(input)
}
