//! Binary writer using the canonical layout: root uoffset, then each table
//! followed by its vtable, with out-of-line payloads (strings, vectors,
//! nested tables) appended afterwards and reached through relative uoffsets.

use bytes::BufMut;
use wiretree_core::{Message, Scalar, SerializationError, Value};

use crate::reader::struct_size;
use crate::schema::{EnumDef, FbsSchema, FbsType, ScalarType, StructDef, TableDef};

/// Serialize a message tree as the schema's `root_type` table.
pub fn serialize_flatbuffers(
    value: &Value,
    schema: &FbsSchema,
) -> Result<Vec<u8>, SerializationError> {
    let root = schema
        .root_table()
        .map_err(|e| SerializationError::Other(e.to_string()))?;
    let message = value
        .try_message()
        .map_err(|e| SerializationError::Other(format!("root value: {e}")))?;

    let mut out = Vec::new();
    out.put_u32_le(0); // root uoffset, patched below
    if let Some(id) = &schema.file_identifier {
        let mut bytes = [0u8; 4];
        for (i, b) in id.bytes().take(4).enumerate() {
            bytes[i] = b;
        }
        out.put_slice(&bytes);
    }

    let table_pos = write_table(&mut out, message, root, schema)?;
    patch_u32(&mut out, 0, table_pos as u32);
    Ok(out)
}

fn patch_u32(out: &mut [u8], pos: usize, value: u32) {
    out[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

fn align_to(out: &mut Vec<u8>, n: usize) {
    while out.len() % n != 0 {
        out.push(0);
    }
}

/// Emit one table (body, then vtable, then out-of-line children) and return
/// its absolute position.
fn write_table(
    out: &mut Vec<u8>,
    message: &Message,
    def: &TableDef,
    schema: &FbsSchema,
) -> Result<usize, SerializationError> {
    // Slot layout: present fields in declaration order after the soffset.
    let mut slot_offsets: Vec<u16> = Vec::with_capacity(def.fields.len());
    let mut cursor: usize = 4;
    for field in &def.fields {
        if present_value(message, &field.name).is_some() {
            slot_offsets.push(cursor as u16);
            cursor += inline_size(&field.ty, schema)?;
        } else {
            slot_offsets.push(0);
        }
    }
    let object_size = cursor;
    let vtable_size = 4 + 2 * def.fields.len();

    align_to(out, 4);
    let table_pos = out.len();
    out.resize(table_pos + object_size, 0);

    // The vtable sits right after the table body, so soffset = -object_size.
    let vtable_pos = out.len();
    out.put_u16_le(vtable_size as u16);
    out.put_u16_le(object_size as u16);
    for entry in &slot_offsets {
        out.put_u16_le(*entry);
    }
    patch_u32(out, table_pos, (-(object_size as i32)) as u32);

    // Inline values first, then out-of-line children with patched uoffsets.
    for (i, field) in def.fields.iter().enumerate() {
        let Some(value) = present_value(message, &field.name) else {
            continue;
        };
        let slot = table_pos + usize::from(slot_offsets[i]);
        write_field(out, slot, value, &field.ty, &field.name, schema)?;
    }
    Ok(table_pos)
}

/// A field counts as present only when it exists and is not an explicit
/// null; the reader hands back null for absent fields, so this keeps
/// serialize/parse symmetric.
fn present_value<'a>(message: &'a Message, name: &str) -> Option<&'a Value> {
    let entry = message.find_field(name)?;
    if matches!(entry.value, Value::Scalar(Scalar::Null)) {
        return None;
    }
    Some(&entry.value)
}

fn write_field(
    out: &mut Vec<u8>,
    slot: usize,
    value: &Value,
    ty: &FbsType,
    field_name: &str,
    schema: &FbsSchema,
) -> Result<(), SerializationError> {
    let unrepresentable = || SerializationError::Unrepresentable {
        field: field_name.to_string(),
        declared: format!("{ty:?}"),
        found: value.variant_name().to_string(),
    };

    match ty {
        FbsType::Scalar(s) => {
            let scalar = value.try_scalar().map_err(|_| unrepresentable())?;
            let bytes = scalar_bytes(scalar, *s, unrepresentable)?;
            out[slot..slot + bytes.len()].copy_from_slice(&bytes);
        }
        FbsType::Str => {
            let s = match value {
                Value::Scalar(Scalar::Str(s)) => s,
                _ => return Err(unrepresentable()),
            };
            let target = write_string(out, s);
            patch_u32(out, slot, (target - slot) as u32);
        }
        FbsType::Vector(elem) => {
            let items = value.try_list().map_err(|_| unrepresentable())?;
            let target = write_vector(out, items, elem, field_name, schema)?;
            patch_u32(out, slot, (target - slot) as u32);
        }
        FbsType::Named(name) => {
            if let Some(enum_def) = schema.find_enum(name) {
                let scalar = value.try_scalar().map_err(|_| unrepresentable())?;
                let number = enum_number(scalar, enum_def).ok_or_else(unrepresentable)?;
                let bytes = scalar_bytes(&Scalar::Int(number), enum_def.base, unrepresentable)?;
                out[slot..slot + bytes.len()].copy_from_slice(&bytes);
            } else if let Some(struct_def) = schema.find_struct(name) {
                let m = value.try_message().map_err(|_| unrepresentable())?;
                write_struct(out, slot, m, struct_def, schema)?;
            } else if let Some(table_def) = schema.find_table(name) {
                let m = value.try_message().map_err(|_| unrepresentable())?;
                let target = write_table(out, m, table_def, schema)?;
                patch_u32(out, slot, (target - slot) as u32);
            } else {
                return Err(SerializationError::UnknownMessageType(
                    name.clone(),
                    field_name.to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Length-prefixed, null-terminated, 4-byte aligned. Returns the position of
/// the length field.
fn write_string(out: &mut Vec<u8>, s: &str) -> usize {
    align_to(out, 4);
    let pos = out.len();
    out.put_u32_le(s.len() as u32);
    out.put_slice(s.as_bytes());
    out.put_u8(0);
    pos
}

fn write_vector(
    out: &mut Vec<u8>,
    items: &[Value],
    elem: &FbsType,
    field_name: &str,
    schema: &FbsSchema,
) -> Result<usize, SerializationError> {
    align_to(out, 4);
    let pos = out.len();
    out.put_u32_le(items.len() as u32);

    let stride = inline_size(elem, schema)?;
    let base = out.len();
    out.resize(base + items.len() * stride, 0);
    for (i, item) in items.iter().enumerate() {
        write_field(out, base + i * stride, item, elem, field_name, schema)?;
    }
    Ok(pos)
}

/// Inline (slot) size for a field of this type within a table or vector.
fn inline_size(ty: &FbsType, schema: &FbsSchema) -> Result<usize, SerializationError> {
    Ok(match ty {
        FbsType::Scalar(s) => s.size(),
        FbsType::Str | FbsType::Vector(_) => 4,
        FbsType::Named(name) => {
            if let Some(e) = schema.find_enum(name) {
                e.base.size()
            } else if let Some(s) = schema.find_struct(name) {
                struct_size(s, schema).map_err(|e| SerializationError::Other(e.to_string()))?
            } else if schema.find_table(name).is_some() {
                4
            } else {
                return Err(SerializationError::Other(format!("unknown type '{name}'")));
            }
        }
    })
}

/// Structs are written inline as concatenated field bytes; missing fields
/// stay zero.
fn write_struct(
    out: &mut Vec<u8>,
    slot: usize,
    message: &Message,
    def: &StructDef,
    schema: &FbsSchema,
) -> Result<(), SerializationError> {
    let mut cursor = slot;
    for f in &def.fields {
        let size = inline_size(&f.ty, schema)?;
        if let Some(entry) = message.find_field(&f.name) {
            write_field(out, cursor, &entry.value, &f.ty, &f.name, schema)?;
        }
        cursor += size;
    }
    Ok(())
}

fn enum_number(scalar: &Scalar, def: &EnumDef) -> Option<i64> {
    match scalar {
        Scalar::Str(name) => def.number_of(name),
        other => other.to_i64().ok(),
    }
}

fn scalar_bytes(
    scalar: &Scalar,
    ty: ScalarType,
    unrepresentable: impl Fn() -> SerializationError,
) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::with_capacity(ty.size());
    match ty {
        ScalarType::Bool => {
            out.put_u8(u8::from(scalar.as_bool().ok_or_else(unrepresentable)?));
        }
        ScalarType::Byte => {
            let n = scalar.to_i64().map_err(|_| unrepresentable())?;
            out.put_i8(i8::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::UByte => {
            let n = scalar.to_u64().map_err(|_| unrepresentable())?;
            out.put_u8(u8::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::Short => {
            let n = scalar.to_i64().map_err(|_| unrepresentable())?;
            out.put_i16_le(i16::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::UShort => {
            let n = scalar.to_u64().map_err(|_| unrepresentable())?;
            out.put_u16_le(u16::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::Int => {
            let n = scalar.to_i64().map_err(|_| unrepresentable())?;
            out.put_i32_le(i32::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::UInt => {
            let n = scalar.to_u64().map_err(|_| unrepresentable())?;
            out.put_u32_le(u32::try_from(n).map_err(|_| unrepresentable())?);
        }
        ScalarType::Long => {
            out.put_i64_le(scalar.to_i64().map_err(|_| unrepresentable())?);
        }
        ScalarType::ULong => {
            out.put_u64_le(scalar.to_u64().map_err(|_| unrepresentable())?);
        }
        ScalarType::Float => {
            let f = scalar.to_f64().map_err(|_| unrepresentable())?;
            out.put_f32_le(f as f32);
        }
        ScalarType::Double => {
            let f = scalar.to_f64().map_err(|_| unrepresentable())?;
            out.put_f64_le(f);
        }
    }
    Ok(out)
}
