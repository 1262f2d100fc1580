//! Protocol Buffers text-format grammar and processor.
//!
//! The grammar follows the official text-format spec: `#` and `//` comments,
//! optional `;`/`,` field separators, `{}` or `<>` message braces, adjacent
//! string literal concatenation, and the C escape set in strings. The colon
//! is required before scalar values and optional before message values.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, one_of},
    combinator::{map, opt, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{pair, preceded, tuple},
    IResult,
};
use wiretree_core::{Message, ParseError, Scalar, Value};

/// Parse a text-format document into the generic [`Message`] tree.
pub fn parse_textproto(source: &str) -> Result<Message, ParseError> {
    let (rest, fields) = match many0(preceded(sp, field))(source) {
        Ok(ok) => ok,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::at_offset(
                "invalid text format",
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
    Ok(process_fields(fields))
}

// ── grammar ──────────────────────────────────────────────────────────────────

struct TextField {
    name: String,
    value: TextValue,
}

enum TextValue {
    Scalar(Scalar),
    Ident(String),
    Fields(Vec<TextField>),
    List(Vec<TextValue>),
}

/// Whitespace plus `#…EOL` and `//…EOL` comments.
fn sp(mut input: &str) -> IResult<&str, ()> {
    loop {
        let trimmed = input.trim_start();
        if trimmed.starts_with('#') || trimmed.starts_with("//") {
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

fn field(input: &str) -> IResult<&str, TextField> {
    let (input, name) = identifier(input)?;
    let (input, ()) = sp(input)?;
    let (input, value) = alt((
        preceded(pair(char(':'), sp), alt((message_value, bracket_list, scalar_value))),
        // Colon is optional for message values and message lists.
        alt((message_value, bracket_list)),
    ))(input)?;
    let (input, _) = opt(preceded(sp, one_of(";,")))(input)?;
    Ok((
        input,
        TextField {
            name: name.to_string(),
            value,
        },
    ))
}

fn message_value(input: &str) -> IResult<&str, TextValue> {
    let (input, open) = one_of("{<")(input)?;
    let close = if open == '{' { '}' } else { '>' };
    let (input, fields) = many0(preceded(sp, field))(input)?;
    let (input, ()) = sp(input)?;
    let (input, _) = char(close)(input)?;
    Ok((input, TextValue::Fields(fields)))
}

fn bracket_list(input: &str) -> IResult<&str, TextValue> {
    map(
        tuple((
            char('['),
            sp,
            separated_list0(
                tuple((sp, char(','), sp)),
                alt((message_value, scalar_value)),
            ),
            sp,
            char(']'),
        )),
        |(_, _, items, _, _)| TextValue::List(items),
    )(input)
}

fn scalar_value(input: &str) -> IResult<&str, TextValue> {
    alt((
        map(string_concat, |bytes| TextValue::Scalar(bytes_scalar(bytes))),
        number,
        map(identifier, |s| TextValue::Ident(s.to_string())),
    ))(input)
}

/// Adjacent string literals concatenate: `"a" "b"` is `"ab"`.
fn string_concat(input: &str) -> IResult<&str, Vec<u8>> {
    map(many1(preceded(sp, string_literal)), |parts| {
        parts.concat()
    })(input)
}

fn string_literal(input: &str) -> IResult<&str, Vec<u8>> {
    let (input, quote) = one_of("\"'")(input)?;
    let mut out = Vec::new();
    let mut chars = input.char_indices();
    loop {
        let Some((i, c)) = chars.next() else {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Char,
            )));
        };
        if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        }
        if c == '\\' {
            let rest = &input[i + 1..];
            let consumed = unescape_into(rest, &mut out).ok_or_else(|| {
                nom::Err::Failure(nom::error::Error::new(rest, nom::error::ErrorKind::Escaped))
            })?;
            for _ in 0..consumed {
                chars.next();
            }
        } else {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
}

/// Decode one C escape after a backslash; returns the number of consumed
/// characters. Supports `\a \b \f \n \r \t \v \? \\ \' \"`, octal `\ooo`,
/// and hex `\xhh`.
fn unescape_into(rest: &str, out: &mut Vec<u8>) -> Option<usize> {
    let mut chars = rest.chars();
    let c = chars.next()?;
    match c {
        'a' => out.push(0x07),
        'b' => out.push(0x08),
        'f' => out.push(0x0C),
        'n' => out.push(b'\n'),
        'r' => out.push(b'\r'),
        't' => out.push(b'\t'),
        'v' => out.push(0x0B),
        '?' => out.push(b'?'),
        '\\' => out.push(b'\\'),
        '\'' => out.push(b'\''),
        '"' => out.push(b'"'),
        'x' | 'X' => {
            let hex: String = rest[1..]
                .chars()
                .take(2)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if hex.is_empty() {
                return None;
            }
            out.push(u8::from_str_radix(&hex, 16).ok()?);
            return Some(1 + hex.len());
        }
        '0'..='7' => {
            let oct: String = rest
                .chars()
                .take(3)
                .take_while(|c| ('0'..='7').contains(c))
                .collect();
            out.push(u8::from_str_radix(&oct, 8).ok()?);
            return Some(oct.len());
        }
        _ => return None,
    }
    Some(1)
}

fn number(input: &str) -> IResult<&str, TextValue> {
    let (rest, negative) = map(opt(char('-')), |m| m.is_some())(input)?;
    let (rest, ()) = sp(rest)?;
    alt((
        move |i| hex_number(i, negative),
        move |i| float_number(i, negative),
        move |i| octal_number(i, negative),
        move |i| decimal_number(i, negative),
    ))(rest)
}

fn hex_number(input: &str, negative: bool) -> IResult<&str, TextValue> {
    let (rest, digits) = preceded(
        alt((tag("0x"), tag("0X"))),
        take_while1(|c: char| c.is_ascii_hexdigit()),
    )(input)?;
    let value = u64::from_str_radix(digits, 16)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    Ok((rest, TextValue::Scalar(signed_scalar(value, negative))))
}

fn octal_number(input: &str, negative: bool) -> IResult<&str, TextValue> {
    let (rest, digits) = recognize(pair(char('0'), take_while1(|c| ('0'..='7').contains(&c))))(input)?;
    let value = u64::from_str_radix(digits, 8)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    Ok((rest, TextValue::Scalar(signed_scalar(value, negative))))
}

fn decimal_number(input: &str, negative: bool) -> IResult<&str, TextValue> {
    let (rest, digits) = digit1(input)?;
    let value: u64 = digits
        .parse()
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    Ok((rest, TextValue::Scalar(signed_scalar(value, negative))))
}

/// Floats need a decimal point, an exponent, or an `f` suffix to be told
/// apart from integers.
fn float_number(input: &str, negative: bool) -> IResult<&str, TextValue> {
    let (rest, text) = alt((
        recognize(tuple((
            digit1,
            char('.'),
            take_while(|c: char| c.is_ascii_digit()),
            opt(exponent),
        ))),
        recognize(tuple((char('.'), digit1, opt(exponent)))),
        recognize(tuple((digit1, exponent))),
        // Bare digits with an `f` suffix ("1f") are still floats.
        nom::sequence::terminated(digit1, nom::combinator::peek(one_of("fF"))),
    ))(input)?;
    let (rest, _) = opt(one_of("fF"))(rest)?;
    let value: f64 = text
        .parse()
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float)))?;
    let value = if negative { -value } else { value };
    Ok((rest, TextValue::Scalar(Scalar::Float(value))))
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn signed_scalar(magnitude: u64, negative: bool) -> Scalar {
    if negative {
        // -(i64::MIN) overflows i64; wrapping_neg handles the boundary.
        Scalar::Int((magnitude as i64).wrapping_neg())
    } else if magnitude > i64::MAX as u64 {
        Scalar::UInt(magnitude)
    } else {
        Scalar::Int(magnitude as i64)
    }
}

fn bytes_scalar(bytes: Vec<u8>) -> Scalar {
    match String::from_utf8(bytes) {
        Ok(s) => Scalar::Str(s),
        Err(e) => Scalar::Bytes(e.into_bytes()),
    }
}

// ── processor ────────────────────────────────────────────────────────────────

fn process_fields(fields: Vec<TextField>) -> Message {
    let mut message = Message::new();
    for f in fields {
        message.push(f.name, process_value(f.value));
    }
    message
}

fn process_value(value: TextValue) -> Value {
    match value {
        TextValue::Scalar(s) => Value::Scalar(s),
        TextValue::Ident(ident) => Value::Scalar(ident_scalar(&ident)),
        TextValue::Fields(fields) => Value::Message(process_fields(fields)),
        TextValue::List(items) => Value::List(items.into_iter().map(process_value).collect()),
    }
}

/// `true`/`false` (and `t`/`f`), case-insensitive, become booleans; any other
/// identifier is kept as a string and treated as an enum symbol.
fn ident_scalar(ident: &str) -> Scalar {
    match ident.to_ascii_lowercase().as_str() {
        "true" | "t" => Scalar::Bool(true),
        "false" | "f" => Scalar::Bool(false),
        _ => Scalar::Str(ident.to_string()),
    }
}
