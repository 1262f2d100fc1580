//! Schema-driven Protocol Buffers wire codec.
//!
//! The decoder walks the byte stream tag by tag, resolving field numbers
//! against the [`MessageDef`]; the encoder walks the [`Message`] field
//! sequence in order. Both sides skip unknown fields instead of failing.

use bytes::{Buf, BufMut, Bytes};
use wiretree_core::{Field, Message, ParseError, Scalar, SerializationError, Value};

use crate::schema::{EnumDef, FieldDef, MessageDef, ProtoSchema};
use crate::wire::{
    decode_tag, decode_varint, decode_zigzag32, decode_zigzag64, encode_tag, encode_varint,
    encode_zigzag32, encode_zigzag64, skip_value, WireType,
};

/// Parse wire-format bytes against the schema's first message definition.
pub fn parse_binary(bytes: &[u8], schema: &ProtoSchema) -> Result<Message, ParseError> {
    let def = schema
        .first_message()
        .ok_or_else(|| ParseError::new("schema defines no messages"))?;
    parse_checked(bytes, schema, def)
}

/// Parse wire-format bytes as the named message type.
pub fn parse_binary_as(
    bytes: &[u8],
    schema: &ProtoSchema,
    type_name: &str,
) -> Result<Message, ParseError> {
    let def = schema
        .find_message(type_name)
        .ok_or_else(|| ParseError::new(format!("root type '{type_name}' not found in schema")))?;
    parse_checked(bytes, schema, def)
}

fn parse_checked(
    bytes: &[u8],
    schema: &ProtoSchema,
    def: &MessageDef,
) -> Result<Message, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::new("empty input"));
    }
    decode_message(bytes, schema, def)
}

/// Decode one message body (no length prefix). Embedded messages recurse
/// through here, where an empty body is a legal empty message.
pub fn decode_message(
    bytes: &[u8],
    schema: &ProtoSchema,
    def: &MessageDef,
) -> Result<Message, ParseError> {
    let mut buf = Bytes::copy_from_slice(bytes);
    let mut message = Message::new();

    while buf.has_remaining() {
        let (field_number, wire_type) = decode_tag(&mut buf)?;
        let Some(field_def) = def.field_by_number(field_number) else {
            skip_value(&mut buf, wire_type)?;
            continue;
        };
        let value = decode_field(&mut buf, wire_type, field_def, schema)?;
        message.push_field(Field {
            name: field_def.name.clone(),
            value,
            is_map: field_def.is_map(),
        });
    }
    Ok(message)
}

fn decode_field(
    buf: &mut Bytes,
    wire_type: WireType,
    field_def: &FieldDef,
    schema: &ProtoSchema,
) -> Result<Value, ParseError> {
    let expected = wire_type_for(&field_def.type_name, schema);
    if wire_type != expected {
        return Err(ParseError::new(format!(
            "field '{}' declared {} but encoded with wire type {:?}",
            field_def.name, field_def.type_name, wire_type
        )));
    }

    match field_def.type_name.as_str() {
        "bool" => Ok(Value::bool(decode_varint(buf)? != 0)),
        "int32" | "int64" => Ok(Value::int(decode_varint(buf)? as i64)),
        "uint32" | "uint64" => Ok(Value::uint(decode_varint(buf)?)),
        "sint32" => Ok(Value::int(i64::from(decode_zigzag32(decode_varint(buf)?)))),
        "sint64" => Ok(Value::int(decode_zigzag64(decode_varint(buf)?))),
        "fixed64" => Ok(Value::uint(get_u64_le(buf)?)),
        "sfixed64" => Ok(Value::int(get_u64_le(buf)? as i64)),
        "double" => Ok(Value::float(f64::from_bits(get_u64_le(buf)?))),
        "fixed32" => Ok(Value::uint(u64::from(get_u32_le(buf)?))),
        "sfixed32" => Ok(Value::int(i64::from(get_u32_le(buf)? as i32))),
        "float" => Ok(Value::float(f64::from(f32::from_bits(get_u32_le(buf)?)))),
        "string" => {
            let payload = get_len_delimited(buf)?;
            let s = String::from_utf8(payload.to_vec())
                .map_err(|e| ParseError::new(format!("invalid UTF-8 in string field: {e}")))?;
            Ok(Value::str(s))
        }
        "bytes" => Ok(Value::bytes(get_len_delimited(buf)?.to_vec())),
        "map" => {
            let payload = get_len_delimited(buf)?;
            decode_map_entry(&payload, field_def, schema)
        }
        user_type => {
            if let Some(enum_def) = schema.find_enum(user_type) {
                let raw = decode_varint(buf)? as i64;
                return Ok(Value::Scalar(enum_scalar(raw, enum_def)));
            }
            let nested = schema.find_message(user_type).ok_or_else(|| {
                ParseError::new(format!(
                    "unknown type '{user_type}' for field '{}'",
                    field_def.name
                ))
            })?;
            let payload = get_len_delimited(buf)?;
            Ok(Value::Message(decode_message(&payload, schema, nested)?))
        }
    }
}

/// Decode a map entry body: key at field 1, value at field 2, either of
/// which may be absent (defaults apply).
fn decode_map_entry(
    bytes: &[u8],
    field_def: &FieldDef,
    schema: &ProtoSchema,
) -> Result<Value, ParseError> {
    let key_type = field_def.key_type.as_deref().unwrap_or("string");
    let value_type = field_def.value_type.as_deref().unwrap_or("string");

    let entry_def = MessageDef {
        name: format!("{}Entry", field_def.name),
        fields: vec![
            synthetic_field("key", key_type, 1),
            synthetic_field("value", value_type, 2),
        ],
        nested_messages: Vec::new(),
        nested_enums: Vec::new(),
    };

    let mut entry = decode_message(bytes, schema, &entry_def)?;
    if entry.find_field("key").is_none() {
        let default = default_value(key_type, schema);
        entry.fields.insert(0, Field::new("key", default));
    }
    if entry.find_field("value").is_none() {
        entry.push("value", default_value(value_type, schema));
    }
    Ok(Value::Message(entry))
}

fn synthetic_field(name: &str, type_name: &str, number: u32) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
        number,
        label: None,
        key_type: None,
        value_type: None,
    }
}

fn default_value(type_name: &str, schema: &ProtoSchema) -> Value {
    match type_name {
        "string" => Value::str(""),
        "bytes" => Value::bytes(Vec::new()),
        "bool" => Value::bool(false),
        "float" | "double" => Value::float(0.0),
        "uint32" | "uint64" | "fixed32" | "fixed64" => Value::uint(0),
        t if crate::schema::SCALAR_TYPES.contains(&t) => Value::int(0),
        t => match schema.find_enum(t) {
            Some(e) => Value::Scalar(enum_scalar(0, e)),
            None => Value::Message(Message::new()),
        },
    }
}

fn enum_scalar(raw: i64, enum_def: &EnumDef) -> Scalar {
    i32::try_from(raw)
        .ok()
        .and_then(|n| enum_def.name_of(n))
        .map(|name| Scalar::Str(name.to_string()))
        .unwrap_or(Scalar::Int(raw))
}

fn wire_type_for(type_name: &str, schema: &ProtoSchema) -> WireType {
    match type_name {
        "bool" | "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64" => WireType::Varint,
        "fixed64" | "sfixed64" | "double" => WireType::I64,
        "fixed32" | "sfixed32" | "float" => WireType::I32,
        "string" | "bytes" | "map" => WireType::Len,
        user_type => {
            if schema.find_enum(user_type).is_some() {
                WireType::Varint
            } else {
                WireType::Len
            }
        }
    }
}

fn get_u32_le(buf: &mut Bytes) -> Result<u32, ParseError> {
    if buf.remaining() < 4 {
        return Err(ParseError::new("truncated 32-bit value"));
    }
    Ok(buf.get_u32_le())
}

fn get_u64_le(buf: &mut Bytes) -> Result<u64, ParseError> {
    if buf.remaining() < 8 {
        return Err(ParseError::new("truncated 64-bit value"));
    }
    Ok(buf.get_u64_le())
}

fn get_len_delimited(buf: &mut Bytes) -> Result<Bytes, ParseError> {
    let len = decode_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(ParseError::new(format!(
            "length-delimited value of {len} bytes overruns buffer ({} left)",
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

// ── encoder ──────────────────────────────────────────────────────────────────

/// Serialize a [`Message`] as the named root type.
pub fn serialize_binary(
    message: &Message,
    schema: &ProtoSchema,
    type_name: &str,
) -> Result<Vec<u8>, SerializationError> {
    let def = schema
        .find_message(type_name)
        .ok_or_else(|| SerializationError::UnknownRootType(type_name.to_string()))?;
    encode_message(message, schema, def)
}

/// Encode a message body. Emission order matches the field sequence; fields
/// absent from the schema are skipped, mirroring decoder leniency.
pub fn encode_message(
    message: &Message,
    schema: &ProtoSchema,
    def: &MessageDef,
) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::new();
    for field in &message.fields {
        let Some(field_def) = def.field_by_name(&field.name) else {
            continue;
        };
        encode_field(&field.value, field_def, schema, &mut out)?;
    }
    Ok(out)
}

fn encode_field(
    value: &Value,
    field_def: &FieldDef,
    schema: &ProtoSchema,
    out: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    match value {
        Value::List(items) => {
            for item in items {
                encode_field(item, field_def, schema, out)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            for (k, v) in entries {
                let mut entry = Message::new();
                entry.push("key", Value::Scalar(k.clone()));
                entry.push("value", v.clone());
                encode_map_entry(&entry, field_def, schema, out)?;
            }
            Ok(())
        }
        Value::Message(m) if field_def.is_map() => encode_map_entry(m, field_def, schema, out),
        Value::Message(m) => {
            let nested = schema.find_message(&field_def.type_name).ok_or_else(|| {
                SerializationError::UnknownMessageType(
                    field_def.type_name.clone(),
                    field_def.name.clone(),
                )
            })?;
            let body = encode_message(m, schema, nested)?;
            encode_tag(field_def.number, WireType::Len, out);
            encode_varint(body.len() as u64, out);
            out.extend_from_slice(&body);
            Ok(())
        }
        Value::Scalar(s) => encode_scalar_field(s, field_def, schema, out),
    }
}

fn encode_map_entry(
    entry: &Message,
    field_def: &FieldDef,
    schema: &ProtoSchema,
    out: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    let key_type = field_def.key_type.as_deref().unwrap_or("string");
    let value_type = field_def.value_type.as_deref().unwrap_or("string");
    let mut body = Vec::new();
    if let Some(k) = entry.find_field("key") {
        encode_field(&k.value, &synthetic_field("key", key_type, 1), schema, &mut body)?;
    }
    if let Some(v) = entry.find_field("value") {
        encode_field(
            &v.value,
            &synthetic_field("value", value_type, 2),
            schema,
            &mut body,
        )?;
    }
    encode_tag(field_def.number, WireType::Len, out);
    encode_varint(body.len() as u64, out);
    out.extend_from_slice(&body);
    Ok(())
}

fn encode_scalar_field(
    scalar: &Scalar,
    field_def: &FieldDef,
    schema: &ProtoSchema,
    out: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    let unrepresentable = || SerializationError::Unrepresentable {
        field: field_def.name.clone(),
        declared: field_def.type_name.clone(),
        found: scalar.variant_name().to_string(),
    };

    match field_def.type_name.as_str() {
        "bool" => {
            let b = scalar.as_bool().ok_or_else(unrepresentable)?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(u64::from(b), out);
        }
        "int32" => {
            let n = scalar.to_i64()?;
            i32::try_from(n).map_err(|_| unrepresentable())?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(n as u64, out);
        }
        "int64" => {
            let n = scalar.to_i64()?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(n as u64, out);
        }
        "uint32" => {
            let n = scalar.to_u64()?;
            u32::try_from(n).map_err(|_| unrepresentable())?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(n, out);
        }
        "uint64" => {
            let n = scalar.to_u64()?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(n, out);
        }
        "sint32" => {
            let n = i32::try_from(scalar.to_i64()?).map_err(|_| unrepresentable())?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(encode_zigzag32(n), out);
        }
        "sint64" => {
            let n = scalar.to_i64()?;
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(encode_zigzag64(n), out);
        }
        "fixed64" => {
            let n = scalar.to_u64()?;
            encode_tag(field_def.number, WireType::I64, out);
            out.put_u64_le(n);
        }
        "sfixed64" => {
            let n = scalar.to_i64()?;
            encode_tag(field_def.number, WireType::I64, out);
            out.put_i64_le(n);
        }
        "double" => {
            let f = scalar.to_f64()?;
            encode_tag(field_def.number, WireType::I64, out);
            out.put_f64_le(f);
        }
        "fixed32" => {
            let n = u32::try_from(scalar.to_u64()?).map_err(|_| unrepresentable())?;
            encode_tag(field_def.number, WireType::I32, out);
            out.put_u32_le(n);
        }
        "sfixed32" => {
            let n = i32::try_from(scalar.to_i64()?).map_err(|_| unrepresentable())?;
            encode_tag(field_def.number, WireType::I32, out);
            out.put_i32_le(n);
        }
        "float" => {
            let f = scalar.to_f64()?;
            encode_tag(field_def.number, WireType::I32, out);
            out.put_f32_le(f as f32);
        }
        "string" => {
            let bytes: &[u8] = match scalar {
                Scalar::Str(s) => s.as_bytes(),
                Scalar::Bytes(b) => b,
                _ => return Err(unrepresentable()),
            };
            encode_tag(field_def.number, WireType::Len, out);
            encode_varint(bytes.len() as u64, out);
            out.extend_from_slice(bytes);
        }
        "bytes" => {
            let bytes: &[u8] = match scalar {
                Scalar::Bytes(b) => b,
                Scalar::Str(s) => s.as_bytes(),
                _ => return Err(unrepresentable()),
            };
            encode_tag(field_def.number, WireType::Len, out);
            encode_varint(bytes.len() as u64, out);
            out.extend_from_slice(bytes);
        }
        user_type => {
            let Some(enum_def) = schema.find_enum(user_type) else {
                // A message-typed field carrying a scalar value.
                return Err(unrepresentable());
            };
            let number = match scalar {
                Scalar::Str(name) => enum_def
                    .number_of(name)
                    .ok_or_else(unrepresentable)?,
                other => i32::try_from(other.to_i64()?).map_err(|_| unrepresentable())?,
            };
            encode_tag(field_def.number, WireType::Varint, out);
            encode_varint(i64::from(number) as u64, out);
        }
    }
    Ok(())
}
