//! Proto3 IDL grammar and processor.
//!
//! A nom recursive-descent parser: one combinator per production, with a
//! shared `sp` combinator that swallows whitespace plus `//` and `/* */`
//! comments between tokens. The processor assembles the [`ProtoSchema`] and
//! enforces its structural invariants.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1},
    combinator::{map, map_res, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use wiretree_core::ParseError;

use crate::schema::{EnumDef, FieldDef, Label, MessageDef, ProtoSchema};

/// Parse a `.proto` source into a validated [`ProtoSchema`].
pub fn parse_proto_schema(source: &str) -> Result<ProtoSchema, ParseError> {
    let (rest, items) = match many0(top_level)(source) {
        Ok(ok) => ok,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::at_offset(
                "invalid proto3 syntax",
                source,
                source.len() - e.input.len(),
            ));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ParseError::new("unexpected end of input"));
        }
    };
    let (rest, ()) = sp(rest).unwrap_or((rest, ()));
    if !rest.is_empty() {
        return Err(ParseError::at_offset(
            "unexpected token",
            source,
            source.len() - rest.len(),
        ));
    }

    let mut schema = ProtoSchema {
        syntax: "proto3".to_string(),
        package: None,
        imports: Vec::new(),
        messages: Vec::new(),
        enums: Vec::new(),
    };
    for item in items {
        match item {
            TopLevel::Syntax(s) => {
                if s != "proto3" {
                    return Err(ParseError::new(format!(
                        "unsupported syntax '{s}' (only proto3)"
                    )));
                }
                schema.syntax = s;
            }
            TopLevel::Package(p) => schema.package = Some(p),
            TopLevel::Import(p) => schema.imports.push(p),
            TopLevel::Message(m) => schema.messages.push(m),
            TopLevel::Enum(e) => schema.enums.push(e),
        }
    }
    schema
        .check_invariants()
        .map_err(|e| ParseError::new(e.to_string()))?;
    Ok(schema)
}

enum TopLevel {
    Syntax(String),
    Package(String),
    Import(String),
    Message(MessageDef),
    Enum(EnumDef),
}

enum MessageItem {
    Field(FieldDef),
    Message(MessageDef),
    Enum(EnumDef),
}

/// Whitespace and comments between tokens.
fn sp(mut input: &str) -> IResult<&str, ()> {
    loop {
        let trimmed = input.trim_start();
        if let Some(rest) = trimmed.strip_prefix("//") {
            input = match rest.find('\n') {
                Some(nl) => &rest[nl + 1..],
                None => "",
            };
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => input = &rest[end + 2..],
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        trimmed,
                        nom::error::ErrorKind::TakeUntil,
                    )))
                }
            }
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

/// A keyword token that must not run into a longer identifier.
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

fn dotted_ident(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), opt(is_not("\"")), char('"')),
        |s: Option<&str>| s.unwrap_or("").to_string(),
    )(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(
        recognize(pair(opt(char('-')), digit1)),
        |s: &str| s.parse::<i64>(),
    )(input)
}

fn top_level(input: &str) -> IResult<&str, TopLevel> {
    preceded(
        sp,
        alt((
            syntax_decl,
            package_decl,
            import_decl,
            map(message_def, TopLevel::Message),
            map(enum_def, TopLevel::Enum),
        )),
    )(input)
}

fn syntax_decl(input: &str) -> IResult<&str, TopLevel> {
    map(
        tuple((
            keyword("syntax"),
            preceded(sp, char('=')),
            preceded(sp, string_literal),
            preceded(sp, char(';')),
        )),
        |(_, _, s, _)| TopLevel::Syntax(s),
    )(input)
}

fn package_decl(input: &str) -> IResult<&str, TopLevel> {
    map(
        tuple((
            keyword("package"),
            preceded(sp, dotted_ident),
            preceded(sp, char(';')),
        )),
        |(_, name, _)| TopLevel::Package(name.to_string()),
    )(input)
}

fn import_decl(input: &str) -> IResult<&str, TopLevel> {
    map(
        tuple((
            keyword("import"),
            preceded(sp, string_literal),
            preceded(sp, char(';')),
        )),
        |(_, path, _)| TopLevel::Import(path),
    )(input)
}

fn message_def(input: &str) -> IResult<&str, MessageDef> {
    let (input, (_, name, _, items, _)) = tuple((
        keyword("message"),
        preceded(sp, identifier),
        preceded(sp, char('{')),
        many0(preceded(sp, message_item)),
        preceded(sp, char('}')),
    ))(input)?;

    let mut def = MessageDef {
        name: name.to_string(),
        fields: Vec::new(),
        nested_messages: Vec::new(),
        nested_enums: Vec::new(),
    };
    for item in items {
        match item {
            MessageItem::Field(f) => def.fields.push(f),
            MessageItem::Message(m) => def.nested_messages.push(m),
            MessageItem::Enum(e) => def.nested_enums.push(e),
        }
    }
    Ok((input, def))
}

fn message_item(input: &str) -> IResult<&str, MessageItem> {
    alt((
        map(message_def, MessageItem::Message),
        map(enum_def, MessageItem::Enum),
        map(map_field_def, MessageItem::Field),
        map(field_def, MessageItem::Field),
    ))(input)
}

fn field_label(input: &str) -> IResult<&str, Label> {
    alt((
        value(Label::Repeated, keyword("repeated")),
        value(Label::Optional, keyword("optional")),
    ))(input)
}

fn field_def(input: &str) -> IResult<&str, FieldDef> {
    map(
        tuple((
            opt(field_label),
            preceded(sp, dotted_ident),
            preceded(sp, identifier),
            preceded(sp, char('=')),
            preceded(sp, field_number),
            preceded(sp, char(';')),
        )),
        |(label, type_name, name, _, number, _)| FieldDef {
            name: name.to_string(),
            type_name: type_name.to_string(),
            number,
            label,
            key_type: None,
            value_type: None,
        },
    )(input)
}

fn map_field_def(input: &str) -> IResult<&str, FieldDef> {
    map(
        tuple((
            keyword("map"),
            preceded(sp, char('<')),
            preceded(sp, dotted_ident),
            preceded(sp, char(',')),
            preceded(sp, dotted_ident),
            preceded(sp, char('>')),
            preceded(sp, identifier),
            preceded(sp, char('=')),
            preceded(sp, field_number),
            preceded(sp, char(';')),
        )),
        |(_, _, key_type, _, value_type, _, name, _, number, _)| FieldDef {
            name: name.to_string(),
            type_name: "map".to_string(),
            number,
            label: None,
            key_type: Some(key_type.to_string()),
            value_type: Some(value_type.to_string()),
        },
    )(input)
}

fn field_number(input: &str) -> IResult<&str, u32> {
    map_res(take_while1(|c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<u32>()
    })(input)
}

fn enum_def(input: &str) -> IResult<&str, EnumDef> {
    map(
        tuple((
            keyword("enum"),
            preceded(sp, identifier),
            preceded(sp, char('{')),
            many0(preceded(sp, enum_value)),
            preceded(sp, char('}')),
        )),
        |(_, name, _, values, _)| EnumDef {
            name: name.to_string(),
            values,
        },
    )(input)
}

fn enum_value(input: &str) -> IResult<&str, (String, i32)> {
    map(
        tuple((
            identifier,
            preceded(sp, char('=')),
            preceded(sp, integer),
            preceded(sp, char(';')),
        )),
        |(name, _, number, _)| (name.to_string(), number as i32),
    )(input)
}
