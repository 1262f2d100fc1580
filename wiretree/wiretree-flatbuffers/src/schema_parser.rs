//! `.fbs` IDL grammar and processor.

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
    EnumDef, FbsSchema, FbsType, FieldDef, Metadata, ScalarType, StructDef, TableDef, UnionDef,
};

/// Parse a `.fbs` source into a validated [`FbsSchema`].
pub fn parse_flatbuffers_schema(source: &str) -> Result<FbsSchema, ParseError> {
    let (rest, items) = match many0(preceded(sp, top_level))(source) {
        Ok(ok) => ok,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::at_offset(
                "invalid fbs syntax",
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

    let mut schema = FbsSchema {
        namespace: None,
        includes: Vec::new(),
        tables: Vec::new(),
        structs: Vec::new(),
        enums: Vec::new(),
        unions: Vec::new(),
        root_type: None,
        file_identifier: None,
        file_extension: None,
        attributes: Vec::new(),
    };
    for item in items {
        match item {
            TopLevel::Namespace(n) => schema.namespace = Some(n),
            TopLevel::Include(p) => schema.includes.push(p),
            TopLevel::Attribute(a) => schema.attributes.push(a),
            TopLevel::Table(t) => schema.tables.push(t),
            TopLevel::Struct(s) => schema.structs.push(s),
            TopLevel::Enum(e) => schema.enums.push(e),
            TopLevel::Union(u) => schema.unions.push(u),
            TopLevel::RootType(r) => schema.root_type = Some(r),
            TopLevel::FileIdentifier(f) => schema.file_identifier = Some(f),
            TopLevel::FileExtension(f) => schema.file_extension = Some(f),
        }
    }
    schema
        .check_invariants()
        .map_err(|e| ParseError::new(e.to_string()))?;
    Ok(schema)
}

enum TopLevel {
    Namespace(String),
    Include(String),
    Attribute(String),
    Table(TableDef),
    Struct(StructDef),
    Enum(EnumDef),
    Union(UnionDef),
    RootType(String),
    FileIdentifier(String),
    FileExtension(String),
}

/// Whitespace plus `//` and `/* */` comments.
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

fn top_level(input: &str) -> IResult<&str, TopLevel> {
    alt((
        map(
            statement("namespace", dotted_ident),
            |n| TopLevel::Namespace(n.to_string()),
        ),
        map(statement("include", string_literal), TopLevel::Include),
        map(statement("attribute", string_literal), TopLevel::Attribute),
        map(statement("root_type", dotted_ident), |n| {
            TopLevel::RootType(n.to_string())
        }),
        map(
            statement("file_identifier", string_literal),
            TopLevel::FileIdentifier,
        ),
        map(
            statement("file_extension", string_literal),
            TopLevel::FileExtension,
        ),
        map(table_def, TopLevel::Table),
        map(struct_def, TopLevel::Struct),
        map(enum_def, TopLevel::Enum),
        map(union_def, TopLevel::Union),
    ))(input)
}

/// `keyword value ;`
fn statement<'a, O>(
    word: &'static str,
    value: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    map(
        tuple((keyword(word), preceded(sp, value), preceded(sp, char(';')))),
        |(_, v, _)| v,
    )
}

fn table_def(input: &str) -> IResult<&str, TableDef> {
    map(
        tuple((
            keyword("table"),
            preceded(sp, identifier),
            opt(preceded(sp, metadata_list)),
            preceded(sp, char('{')),
            many0(preceded(sp, field_def)),
            preceded(sp, char('}')),
        )),
        |(_, name, metadata, _, fields, _)| TableDef {
            name: name.to_string(),
            fields,
            metadata: metadata.unwrap_or_default(),
        },
    )(input)
}

fn struct_def(input: &str) -> IResult<&str, StructDef> {
    map(
        tuple((
            keyword("struct"),
            preceded(sp, identifier),
            opt(preceded(sp, metadata_list)),
            preceded(sp, char('{')),
            many0(preceded(sp, field_def)),
            preceded(sp, char('}')),
        )),
        |(_, name, metadata, _, fields, _)| StructDef {
            name: name.to_string(),
            fields,
            metadata: metadata.unwrap_or_default(),
        },
    )(input)
}

/// `name : type [= literal] [(metadata)] ;`
fn field_def(input: &str) -> IResult<&str, FieldDef> {
    map(
        tuple((
            identifier,
            preceded(sp, char(':')),
            preceded(sp, type_expr),
            opt(preceded(tuple((sp, char('='), sp)), literal)),
            opt(preceded(sp, metadata_list)),
            preceded(sp, char(';')),
        )),
        |(name, _, ty, default_value, metadata, _)| FieldDef {
            name: name.to_string(),
            ty,
            default_value,
            metadata: metadata.unwrap_or_default(),
        },
    )(input)
}

fn type_expr(input: &str) -> IResult<&str, FbsType> {
    alt((
        map(
            delimited(
                pair(char('['), sp),
                type_expr,
                pair(sp, char(']')),
            ),
            |elem| FbsType::Vector(Box::new(elem)),
        ),
        map(dotted_ident, |name: &str| {
            if name == "string" {
                FbsType::Str
            } else {
                match ScalarType::from_name(name) {
                    Some(s) => FbsType::Scalar(s),
                    None => FbsType::Named(name.to_string()),
                }
            }
        }),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Scalar> {
    alt((
        map(string_literal, Scalar::Str),
        map(keyword("true"), |_| Scalar::Bool(true)),
        map(keyword("false"), |_| Scalar::Bool(false)),
        number_literal,
        // An identifier default names an enum value.
        map(identifier, |s: &str| Scalar::Str(s.to_string())),
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, Scalar> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(tuple((char('.'), digit1))),
        opt(tuple((
            nom::character::complete::one_of("eE"),
            opt(nom::character::complete::one_of("+-")),
            digit1,
        ))),
    )))(input)?;
    let scalar = if text.contains('.') || text.contains('e') || text.contains('E') {
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

/// `(key: value, flag, …)`
fn metadata_list(input: &str) -> IResult<&str, Vec<Metadata>> {
    delimited(
        char('('),
        separated_list0(tuple((sp, char(','), sp)), preceded(sp, metadata_entry)),
        preceded(sp, char(')')),
    )(input)
}

fn metadata_entry(input: &str) -> IResult<&str, Metadata> {
    map(
        tuple((
            identifier,
            opt(preceded(
                tuple((sp, char(':'), sp)),
                alt((
                    string_literal,
                    map(
                        recognize(tuple((opt(char('-')), take_while1(|c: char| {
                            c.is_ascii_alphanumeric() || c == '.' || c == '_'
                        })))),
                        |s: &str| s.to_string(),
                    ),
                )),
            )),
        )),
        |(key, value)| Metadata {
            key: key.to_string(),
            value,
        },
    )(input)
}

/// `enum Name : base { A, B = 3, C }` — implicit values continue from the
/// previous one, starting at 0.
fn enum_def(input: &str) -> IResult<&str, EnumDef> {
    let (input, (_, name, _, base, _, entries, _, _)) = tuple((
        keyword("enum"),
        preceded(sp, identifier),
        preceded(sp, char(':')),
        preceded(sp, identifier),
        preceded(sp, char('{')),
        separated_list0(
            tuple((sp, char(','), sp)),
            preceded(
                sp,
                pair(
                    identifier,
                    opt(preceded(tuple((sp, char('='), sp)), number_literal)),
                ),
            ),
        ),
        opt(preceded(sp, char(','))),
        preceded(sp, char('}')),
    ))(input)?;

    let base = ScalarType::from_name(base).unwrap_or(ScalarType::Int);
    let mut values = Vec::with_capacity(entries.len());
    let mut next = 0i64;
    for (name, explicit) in entries {
        let number = match explicit {
            Some(Scalar::Int(n)) => n,
            Some(Scalar::UInt(n)) => n as i64,
            Some(Scalar::Float(f)) => f as i64,
            _ => next,
        };
        values.push((name.to_string(), number));
        next = number + 1;
    }
    Ok((
        input,
        EnumDef {
            name: name.to_string(),
            base,
            values,
        },
    ))
}

/// `union U { A, B }`
fn union_def(input: &str) -> IResult<&str, UnionDef> {
    map(
        tuple((
            keyword("union"),
            preceded(sp, identifier),
            preceded(sp, char('{')),
            separated_list0(
                tuple((sp, char(','), sp)),
                preceded(sp, map(dotted_ident, str::to_string)),
            ),
            opt(preceded(sp, char(','))),
            preceded(sp, char('}')),
        )),
        |(_, name, _, members, _, _)| UnionDef {
            name: name.to_string(),
            members,
        },
    )(input)
}
