//! Binary reader: root uoffset → table → vtable walk, decoding fields in
//! declaration order.

use bytes::{Buf, Bytes};
use wiretree_core::{Message, ParseError, Scalar, Value};

use crate::schema::{EnumDef, FbsSchema, FbsType, FieldDef, ScalarType, StructDef, TableDef};

/// Parse a FlatBuffers binary against the schema's `root_type` table.
pub fn parse_flatbuffers_binary(bytes: &[u8], schema: &FbsSchema) -> Result<Value, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::new("empty input"));
    }
    let root = schema
        .root_table()
        .map_err(|e| ParseError::new(e.to_string()))?;
    let view = Buffer::new(bytes);
    let table_pos = view.read_uoffset(0)?;
    read_table(&view, table_pos, root, schema).map(Value::Message)
}

/// Bounds-checked little-endian reads at arbitrary positions, built on
/// cheap [`Bytes`] sub-slices and the `try_get_*_le` accessors.
struct Buffer {
    bytes: Bytes,
}

impl Buffer {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    /// A cursor positioned at `pos`.
    fn at(&self, pos: usize) -> Result<Bytes, ParseError> {
        if pos > self.bytes.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        Ok(self.bytes.slice(pos..))
    }

    fn out_of_bounds(&self, pos: usize, len: usize) -> ParseError {
        ParseError::new(format!(
            "read of {len} bytes at {pos} out of bounds ({} total)",
            self.bytes.len()
        ))
    }

    fn slice(&self, pos: usize, len: usize) -> Result<Bytes, ParseError> {
        let mut cursor = self.at(pos)?;
        if cursor.remaining() < len {
            return Err(self.out_of_bounds(pos, len));
        }
        Ok(cursor.copy_to_bytes(len))
    }

    fn read_u8(&self, pos: usize) -> Result<u8, ParseError> {
        self.at(pos)?
            .try_get_u8()
            .map_err(|_| self.out_of_bounds(pos, 1))
    }

    fn read_u16(&self, pos: usize) -> Result<u16, ParseError> {
        self.at(pos)?
            .try_get_u16_le()
            .map_err(|_| self.out_of_bounds(pos, 2))
    }

    fn read_u32(&self, pos: usize) -> Result<u32, ParseError> {
        self.at(pos)?
            .try_get_u32_le()
            .map_err(|_| self.out_of_bounds(pos, 4))
    }

    fn read_u64(&self, pos: usize) -> Result<u64, ParseError> {
        self.at(pos)?
            .try_get_u64_le()
            .map_err(|_| self.out_of_bounds(pos, 8))
    }

    fn read_i32(&self, pos: usize) -> Result<i32, ParseError> {
        self.at(pos)?
            .try_get_i32_le()
            .map_err(|_| self.out_of_bounds(pos, 4))
    }

    /// A uoffset is relative to its own location.
    fn read_uoffset(&self, pos: usize) -> Result<usize, ParseError> {
        let offset = self.read_u32(pos)? as usize;
        let target = pos + offset;
        if target >= self.bytes.len() {
            return Err(ParseError::new(format!(
                "uoffset at {pos} points to {target}, past the end of the buffer"
            )));
        }
        Ok(target)
    }
}

fn read_table(
    view: &Buffer,
    pos: usize,
    def: &TableDef,
    schema: &FbsSchema,
) -> Result<Message, ParseError> {
    // soffset's negation gives the vtable position: V = P - soffset.
    let soffset = view.read_i32(pos)?;
    let vtable_pos = pos as i64 - i64::from(soffset);
    let vtable_pos = usize::try_from(vtable_pos)
        .map_err(|_| ParseError::new(format!("vtable position {vtable_pos} out of bounds")))?;
    let vtable_size = view.read_u16(vtable_pos)?;
    let entry_count = usize::from(vtable_size.saturating_sub(4)) / 2;

    let mut message = Message::new();
    for (i, field) in def.fields.iter().enumerate() {
        let entry = if i < entry_count {
            view.read_u16(vtable_pos + 4 + i * 2)?
        } else {
            0
        };
        let value = if entry == 0 {
            absent_value(field)
        } else {
            read_field(view, pos + usize::from(entry), &field.ty, schema)?
        };
        message.push(field.name.clone(), value);
    }
    Ok(message)
}

/// A vtable entry of 0 means absent: the declared default if the schema has
/// one, null otherwise.
fn absent_value(field: &FieldDef) -> Value {
    match &field.default_value {
        Some(s) => Value::Scalar(s.clone()),
        None => Value::null(),
    }
}

fn read_field(
    view: &Buffer,
    pos: usize,
    ty: &FbsType,
    schema: &FbsSchema,
) -> Result<Value, ParseError> {
    match ty {
        FbsType::Scalar(s) => read_scalar(view, pos, *s),
        FbsType::Str => {
            let target = view.read_uoffset(pos)?;
            read_string(view, target)
        }
        FbsType::Vector(elem) => {
            let target = view.read_uoffset(pos)?;
            read_vector(view, target, elem, schema)
        }
        FbsType::Named(name) => {
            if let Some(enum_def) = schema.find_enum(name) {
                read_enum(view, pos, enum_def)
            } else if let Some(struct_def) = schema.find_struct(name) {
                read_struct(view, pos, struct_def, schema)
            } else if let Some(table_def) = schema.find_table(name) {
                let target = view.read_uoffset(pos)?;
                read_table(view, target, table_def, schema).map(Value::Message)
            } else {
                Err(ParseError::new(format!("unknown type '{name}'")))
            }
        }
    }
}

fn read_scalar(view: &Buffer, pos: usize, ty: ScalarType) -> Result<Value, ParseError> {
    Ok(match ty {
        ScalarType::Bool => Value::bool(view.read_u8(pos)? != 0),
        ScalarType::Byte => Value::int(i64::from(view.read_u8(pos)? as i8)),
        ScalarType::UByte => Value::uint(u64::from(view.read_u8(pos)?)),
        ScalarType::Short => Value::int(i64::from(view.read_u16(pos)? as i16)),
        ScalarType::UShort => Value::uint(u64::from(view.read_u16(pos)?)),
        ScalarType::Int => Value::int(i64::from(view.read_u32(pos)? as i32)),
        ScalarType::UInt => Value::uint(u64::from(view.read_u32(pos)?)),
        ScalarType::Long => Value::int(view.read_u64(pos)? as i64),
        ScalarType::ULong => Value::uint(view.read_u64(pos)?),
        ScalarType::Float => Value::float(f64::from(f32::from_bits(view.read_u32(pos)?))),
        ScalarType::Double => Value::float(f64::from_bits(view.read_u64(pos)?)),
    })
}

/// Enums are read as their underlying scalar and mapped back to the declared
/// name, falling back to the number when it is not in the value set.
fn read_enum(view: &Buffer, pos: usize, def: &EnumDef) -> Result<Value, ParseError> {
    let raw = match read_scalar(view, pos, def.base)? {
        Value::Scalar(Scalar::Int(n)) => n,
        Value::Scalar(Scalar::UInt(n)) => n as i64,
        other => {
            return Err(ParseError::new(format!(
                "enum base type read produced {other:?}"
            )))
        }
    };
    Ok(match def.name_of(raw) {
        Some(name) => Value::str(name),
        None => Value::int(raw),
    })
}

/// u32 length, then UTF-8 payload, then a null terminator that is not
/// counted in the length.
fn read_string(view: &Buffer, pos: usize) -> Result<Value, ParseError> {
    let len = view.read_u32(pos)? as usize;
    let payload = view.slice(pos + 4, len)?;
    let s = std::str::from_utf8(&payload)
        .map_err(|e| ParseError::new(format!("invalid UTF-8 in string: {e}")))?;
    Ok(Value::str(s))
}

fn read_vector(
    view: &Buffer,
    pos: usize,
    elem: &FbsType,
    schema: &FbsSchema,
) -> Result<Value, ParseError> {
    let len = view.read_u32(pos)? as usize;
    let base = pos + 4;
    let stride = element_stride(elem, schema)?;
    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        let elem_pos = base + i * stride;
        let value = match elem {
            // Out-of-line elements are reached through uoffsets.
            FbsType::Str => read_string(view, view.read_uoffset(elem_pos)?)?,
            FbsType::Named(name) if schema.find_table(name).is_some() => {
                let table_def = schema.find_table(name).expect("checked above");
                Value::Message(read_table(view, view.read_uoffset(elem_pos)?, table_def, schema)?)
            }
            inline => read_field(view, elem_pos, inline, schema)?,
        };
        items.push(value);
    }
    Ok(Value::List(items))
}

/// Bytes per vector element: scalar width, struct size, or 4 for the
/// uoffset of strings/tables.
fn element_stride(ty: &FbsType, schema: &FbsSchema) -> Result<usize, ParseError> {
    Ok(match ty {
        FbsType::Scalar(s) => s.size(),
        FbsType::Str => 4,
        FbsType::Vector(_) => 4,
        FbsType::Named(name) => {
            if let Some(e) = schema.find_enum(name) {
                e.base.size()
            } else if let Some(s) = schema.find_struct(name) {
                struct_size(s, schema)?
            } else if schema.find_table(name).is_some() {
                4
            } else {
                return Err(ParseError::new(format!("unknown type '{name}'")));
            }
        }
    })
}

/// FlatBuffers structs are fixed-size inline records: concatenated field
/// bytes, no vtable.
pub(crate) fn struct_size(def: &StructDef, schema: &FbsSchema) -> Result<usize, ParseError> {
    let mut size = 0;
    for f in &def.fields {
        size += match &f.ty {
            FbsType::Scalar(s) => s.size(),
            FbsType::Named(name) => {
                if let Some(e) = schema.find_enum(name) {
                    e.base.size()
                } else if let Some(s) = schema.find_struct(name) {
                    struct_size(s, schema)?
                } else {
                    return Err(ParseError::new(format!(
                        "struct field '{}' has non-fixed-size type '{name}'",
                        f.name
                    )));
                }
            }
            other => {
                return Err(ParseError::new(format!(
                    "struct field '{}' has non-fixed-size type {other:?}",
                    f.name
                )))
            }
        };
    }
    Ok(size)
}

fn read_struct(
    view: &Buffer,
    pos: usize,
    def: &StructDef,
    schema: &FbsSchema,
) -> Result<Value, ParseError> {
    let mut message = Message::new();
    let mut cursor = pos;
    for f in &def.fields {
        let value = match &f.ty {
            FbsType::Scalar(s) => {
                let v = read_scalar(view, cursor, *s)?;
                cursor += s.size();
                v
            }
            FbsType::Named(name) => {
                if let Some(enum_def) = schema.find_enum(name) {
                    let v = read_enum(view, cursor, enum_def)?;
                    cursor += enum_def.base.size();
                    v
                } else if let Some(struct_def) = schema.find_struct(name) {
                    let v = read_struct(view, cursor, struct_def, schema)?;
                    cursor += struct_size(struct_def, schema)?;
                    v
                } else {
                    return Err(ParseError::new(format!("unknown type '{name}'")));
                }
            }
            other => {
                return Err(ParseError::new(format!(
                    "struct field '{}' has non-fixed-size type {other:?}",
                    f.name
                )))
            }
        };
        message.push(f.name.clone(), value);
    }
    Ok(Value::Message(message))
}
