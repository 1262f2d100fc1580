//! Binary writer: a single in-progress segment of words, grown by
//! `allocate`, with read-modify-write masking for sub-word fields.
//!
//! Only direct pointers are emitted; everything lands in segment 0. The
//! framing (header + payload) is produced by `build` at the end.

use wiretree_core::{Message, Scalar, SerializationError, Value};

use crate::layout::{layout_of, Slot, StructLayout};
use crate::pointer::{ElementSize, Pointer};
use crate::schema::{CapnpSchema, EnumDef, FieldDef, FieldType, PrimitiveType, StructDef};

/// Serializes value trees into Cap'n Proto binary messages.
pub struct CapnpBinarySerializer<'a> {
    schema: &'a CapnpSchema,
}

impl<'a> CapnpBinarySerializer<'a> {
    pub fn new(schema: &'a CapnpSchema) -> Self {
        Self { schema }
    }

    /// Serialize `value` (a message tree) as the named root struct.
    pub fn serialize(&self, value: &Value, root_type: &str) -> Result<Vec<u8>, SerializationError> {
        let def = self
            .schema
            .find_struct(root_type)
            .ok_or_else(|| SerializationError::UnknownRootType(root_type.to_string()))?;
        let message = value
            .try_message()
            .map_err(|e| SerializationError::Other(format!("root value: {e}")))?;

        let mut builder = SegmentBuilder::new();
        // Word 0 is reserved for the root pointer.
        builder.allocate(1);
        let (start, data_words, pointer_words) = self.write_struct(&mut builder, message, def)?;
        builder.patch_struct_pointer(0, start, data_words, pointer_words);
        Ok(builder.build())
    }

    /// Allocate and fill one struct; returns its start word and section
    /// sizes.
    fn write_struct(
        &self,
        builder: &mut SegmentBuilder,
        message: &Message,
        def: &StructDef,
    ) -> Result<(u32, u16, u16), SerializationError> {
        let layout =
            layout_of(def, self.schema).map_err(|e| SerializationError::Other(e.to_string()))?;
        let start = builder.allocate(usize::from(layout.data_words) + usize::from(layout.pointer_words));
        self.write_struct_fields(builder, start, message, def, &layout)?;
        Ok((start, layout.data_words, layout.pointer_words))
    }

    /// Fill a pre-allocated struct region. Fields missing from the message
    /// keep their zero default; fields unknown to the schema are skipped.
    fn write_struct_fields(
        &self,
        builder: &mut SegmentBuilder,
        start: u32,
        message: &Message,
        def: &StructDef,
        layout: &StructLayout,
    ) -> Result<(), SerializationError> {
        for field_slot in &layout.slots {
            let field = &def.fields[field_slot.field_index];
            let Some(entry) = message.find_field(&field.name) else {
                continue;
            };
            match field_slot.slot {
                Slot::None => {}
                Slot::Data { word, shift, bits } => {
                    let raw = self.data_bits_of(&entry.value, field)?;
                    builder.merge_bits(start + word, shift, bits, raw);
                }
                Slot::Pointer { index } => {
                    let ptr_word = start + u32::from(layout.data_words) + index;
                    self.write_pointer_field(builder, ptr_word, &entry.value, field)?;
                }
            }
        }
        Ok(())
    }

    /// Raw bits for a data-section field, range-checked against the declared
    /// width.
    fn data_bits_of(&self, value: &Value, field: &FieldDef) -> Result<u64, SerializationError> {
        let unrepresentable = || SerializationError::Unrepresentable {
            field: field.name.clone(),
            declared: format!("{:?}", field.ty),
            found: value.variant_name().to_string(),
        };
        let scalar = value.try_scalar().map_err(|_| unrepresentable())?;

        match &field.ty {
            FieldType::Primitive(p) => match p {
                PrimitiveType::Bool => Ok(u64::from(scalar.as_bool().ok_or_else(unrepresentable)?)),
                PrimitiveType::Int8 => signed_bits(scalar, i8::MIN as i64, i8::MAX as i64, unrepresentable),
                PrimitiveType::Int16 => signed_bits(scalar, i16::MIN as i64, i16::MAX as i64, unrepresentable),
                PrimitiveType::Int32 => signed_bits(scalar, i32::MIN as i64, i32::MAX as i64, unrepresentable),
                PrimitiveType::Int64 => signed_bits(scalar, i64::MIN, i64::MAX, unrepresentable),
                PrimitiveType::UInt8 => unsigned_bits(scalar, u8::MAX as u64, unrepresentable),
                PrimitiveType::UInt16 => unsigned_bits(scalar, u16::MAX as u64, unrepresentable),
                PrimitiveType::UInt32 => unsigned_bits(scalar, u32::MAX as u64, unrepresentable),
                PrimitiveType::UInt64 => unsigned_bits(scalar, u64::MAX, unrepresentable),
                PrimitiveType::Float32 => {
                    let f = scalar.to_f64().map_err(|_| unrepresentable())?;
                    Ok(u64::from((f as f32).to_bits()))
                }
                PrimitiveType::Float64 => {
                    let f = scalar.to_f64().map_err(|_| unrepresentable())?;
                    Ok(f.to_bits())
                }
                _ => Err(unrepresentable()),
            },
            FieldType::Named(name) => {
                let enum_def = self
                    .schema
                    .find_enum(name)
                    .ok_or_else(|| SerializationError::Other(format!("'{name}' is not an enum")))?;
                enum_bits(scalar, enum_def, unrepresentable)
            }
            FieldType::List(_) => Err(unrepresentable()),
        }
    }

    fn write_pointer_field(
        &self,
        builder: &mut SegmentBuilder,
        ptr_word: u32,
        value: &Value,
        field: &FieldDef,
    ) -> Result<(), SerializationError> {
        let unrepresentable = || SerializationError::Unrepresentable {
            field: field.name.clone(),
            declared: format!("{:?}", field.ty),
            found: value.variant_name().to_string(),
        };
        if matches!(value, Value::Scalar(Scalar::Null)) {
            // Absent: leave the null pointer word.
            return Ok(());
        }

        match &field.ty {
            FieldType::Primitive(PrimitiveType::Text) => {
                let s = match value {
                    Value::Scalar(Scalar::Str(s)) => s.as_bytes(),
                    _ => return Err(unrepresentable()),
                };
                let start = builder.write_byte_list(s, true);
                builder.patch_list_pointer(ptr_word, start, ElementSize::Byte, s.len() as u32 + 1);
            }
            FieldType::Primitive(PrimitiveType::Data) => {
                let bytes: &[u8] = match value {
                    Value::Scalar(Scalar::Bytes(b)) => b,
                    Value::Scalar(Scalar::Str(s)) => s.as_bytes(),
                    _ => return Err(unrepresentable()),
                };
                let start = builder.write_byte_list(bytes, false);
                builder.patch_list_pointer(ptr_word, start, ElementSize::Byte, bytes.len() as u32);
            }
            FieldType::Primitive(PrimitiveType::AnyPointer) => {
                // Only capability indices are representable.
                let index = value
                    .try_scalar()
                    .ok()
                    .and_then(|s| s.to_u64().ok())
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(unrepresentable)?;
                builder.write_word(ptr_word, Pointer::Capability { index }.encode());
            }
            FieldType::List(elem) => {
                let items = value.try_list().map_err(|_| unrepresentable())?;
                self.write_list(builder, ptr_word, items, elem, field)?;
            }
            FieldType::Named(name) => {
                let def = self.schema.find_struct(name).ok_or_else(|| {
                    SerializationError::UnknownMessageType(name.clone(), field.name.clone())
                })?;
                let message = value.try_message().map_err(|_| unrepresentable())?;
                let (start, data_words, pointer_words) =
                    self.write_struct(builder, message, def)?;
                builder.patch_struct_pointer(ptr_word, start, data_words, pointer_words);
            }
            FieldType::Primitive(_) => return Err(unrepresentable()),
        }
        Ok(())
    }

    /// Lists of length zero encode as a null pointer.
    fn write_list(
        &self,
        builder: &mut SegmentBuilder,
        ptr_word: u32,
        items: &[Value],
        elem: &FieldType,
        field: &FieldDef,
    ) -> Result<(), SerializationError> {
        if items.is_empty() {
            return Ok(());
        }
        let count = items.len() as u32;

        match element_size_of(elem, self.schema)? {
            ElementSize::Void => {
                builder.patch_list_pointer(ptr_word, builder.len(), ElementSize::Void, count);
            }
            ElementSize::Bit => {
                let start = builder.allocate(words_for_bits(u64::from(count)));
                for (i, item) in items.iter().enumerate() {
                    let b = item
                        .try_scalar()
                        .ok()
                        .and_then(Scalar::as_bool)
                        .ok_or_else(|| elem_error(field, item))?;
                    builder.merge_bits(start + (i as u32 / 64), i as u32 % 64, 1, u64::from(b));
                }
                builder.patch_list_pointer(ptr_word, start, ElementSize::Bit, count);
            }
            size @ (ElementSize::Byte
            | ElementSize::TwoBytes
            | ElementSize::FourBytes
            | ElementSize::EightBytes) => {
                let bits = size.bits_per_element();
                let per_word = 64 / bits;
                let start = builder.allocate(words_for_bits(u64::from(count) * u64::from(bits)));
                let elem_field = FieldDef {
                    name: field.name.clone(),
                    ordinal: 0,
                    ty: elem.clone(),
                    default_value: None,
                };
                for (i, item) in items.iter().enumerate() {
                    let raw = self.data_bits_of(item, &elem_field)?;
                    let i = i as u32;
                    builder.merge_bits(start + i / per_word, (i % per_word) * bits, bits, raw);
                }
                builder.patch_list_pointer(ptr_word, start, size, count);
            }
            ElementSize::Pointer => {
                let start = builder.allocate(count as usize);
                let elem_field = FieldDef {
                    name: field.name.clone(),
                    ordinal: 0,
                    ty: elem.clone(),
                    default_value: None,
                };
                for (i, item) in items.iter().enumerate() {
                    self.write_pointer_field(builder, start + i as u32, item, &elem_field)?;
                }
                builder.patch_list_pointer(ptr_word, start, ElementSize::Pointer, count);
            }
            ElementSize::InlineComposite => {
                let FieldType::Named(name) = elem else {
                    return Err(SerializationError::Other(format!(
                        "inline composite element type {elem:?}"
                    )));
                };
                let def = self.schema.find_struct(name).ok_or_else(|| {
                    SerializationError::UnknownMessageType(name.clone(), field.name.clone())
                })?;
                let layout = layout_of(def, self.schema)
                    .map_err(|e| SerializationError::Other(e.to_string()))?;
                let stride = u32::from(layout.data_words) + u32::from(layout.pointer_words);
                let start = builder.allocate(1 + count as usize * stride as usize);
                builder.write_word(
                    start,
                    Pointer::Struct {
                        offset: count as i32,
                        data_words: layout.data_words,
                        pointer_words: layout.pointer_words,
                    }
                    .encode(),
                );
                for (i, item) in items.iter().enumerate() {
                    let message = item.try_message().map_err(|_| elem_error(field, item))?;
                    self.write_struct_fields(
                        builder,
                        start + 1 + i as u32 * stride,
                        message,
                        def,
                        &layout,
                    )?;
                }
                // For inline composites the count field carries total words.
                builder.patch_list_pointer(
                    ptr_word,
                    start,
                    ElementSize::InlineComposite,
                    count * stride,
                );
            }
        }
        Ok(())
    }
}

fn elem_error(field: &FieldDef, item: &Value) -> SerializationError {
    SerializationError::Unrepresentable {
        field: field.name.clone(),
        declared: format!("{:?}", field.ty),
        found: item.variant_name().to_string(),
    }
}

fn signed_bits(
    scalar: &Scalar,
    min: i64,
    max: i64,
    unrepresentable: impl Fn() -> SerializationError,
) -> Result<u64, SerializationError> {
    let n = scalar.to_i64().map_err(|_| unrepresentable())?;
    if n < min || n > max {
        return Err(unrepresentable());
    }
    Ok(n as u64)
}

fn unsigned_bits(
    scalar: &Scalar,
    max: u64,
    unrepresentable: impl Fn() -> SerializationError,
) -> Result<u64, SerializationError> {
    let n = scalar.to_u64().map_err(|_| unrepresentable())?;
    if n > max {
        return Err(unrepresentable());
    }
    Ok(n)
}

fn enum_bits(
    scalar: &Scalar,
    enum_def: &EnumDef,
    unrepresentable: impl Fn() -> SerializationError,
) -> Result<u64, SerializationError> {
    match scalar {
        Scalar::Str(name) => enum_def
            .ordinal_of(name)
            .map(u64::from)
            .ok_or_else(unrepresentable),
        other => {
            let n = other.to_u64().map_err(|_| unrepresentable())?;
            if n > u64::from(u16::MAX) {
                return Err(unrepresentable());
            }
            Ok(n)
        }
    }
}

fn element_size_of(ty: &FieldType, schema: &CapnpSchema) -> Result<ElementSize, SerializationError> {
    Ok(match ty {
        FieldType::Primitive(p) => match p {
            PrimitiveType::Void => ElementSize::Void,
            PrimitiveType::Bool => ElementSize::Bit,
            PrimitiveType::Int8 | PrimitiveType::UInt8 => ElementSize::Byte,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => ElementSize::TwoBytes,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => {
                ElementSize::FourBytes
            }
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => {
                ElementSize::EightBytes
            }
            PrimitiveType::Text | PrimitiveType::Data | PrimitiveType::AnyPointer => {
                ElementSize::Pointer
            }
        },
        FieldType::List(_) => ElementSize::Pointer,
        FieldType::Named(name) => {
            if schema.find_enum(name).is_some() {
                ElementSize::TwoBytes
            } else if schema.find_struct(name).is_some() {
                ElementSize::InlineComposite
            } else {
                return Err(SerializationError::Other(format!("unknown type '{name}'")));
            }
        }
    })
}

fn words_for_bits(bits: u64) -> usize {
    bits.div_ceil(64) as usize
}

/// The single in-progress segment.
struct SegmentBuilder {
    words: Vec<u64>,
}

impl SegmentBuilder {
    fn new() -> Self {
        Self { words: Vec::new() }
    }

    fn len(&self) -> u32 {
        self.words.len() as u32
    }

    /// Extend by `n` zero words; returns the offset of the first.
    fn allocate(&mut self, n: usize) -> u32 {
        let start = self.words.len() as u32;
        self.words.resize(self.words.len() + n, 0);
        start
    }

    fn write_word(&mut self, idx: u32, value: u64) {
        self.words[idx as usize] = value;
    }

    /// Read-modify-write `bits` wide at `shift`, preserving adjacent
    /// sub-word fields.
    fn merge_bits(&mut self, word: u32, shift: u32, bits: u32, value: u64) {
        let mask = if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        let w = &mut self.words[word as usize];
        *w = (*w & !(mask << shift)) | ((value & mask) << shift);
    }

    /// Append a byte list (word-padded), optionally with a trailing null.
    fn write_byte_list(&mut self, bytes: &[u8], null_terminated: bool) -> u32 {
        let total = bytes.len() + usize::from(null_terminated);
        let start = self.allocate(words_for_bits(total as u64 * 8));
        for (i, b) in bytes.iter().enumerate() {
            let i = i as u32;
            self.merge_bits(start + i / 8, (i % 8) * 8, 8, u64::from(*b));
        }
        start
    }

    /// `offset = target - pointer_word - 1`; zero-sized structs use offset
    /// −1 so the word stays distinguishable from a null pointer.
    fn patch_struct_pointer(&mut self, ptr_word: u32, start: u32, data_words: u16, pointer_words: u16) {
        let offset = if data_words == 0 && pointer_words == 0 {
            -1
        } else {
            start as i32 - ptr_word as i32 - 1
        };
        self.write_word(
            ptr_word,
            Pointer::Struct {
                offset,
                data_words,
                pointer_words,
            }
            .encode(),
        );
    }

    fn patch_list_pointer(
        &mut self,
        ptr_word: u32,
        start: u32,
        element_size: ElementSize,
        element_count: u32,
    ) {
        self.write_word(
            ptr_word,
            Pointer::List {
                offset: start as i32 - ptr_word as i32 - 1,
                element_size,
                element_count,
            }
            .encode(),
        );
    }

    /// Emit the framing followed by the word payload.
    fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.words.len() * 8);
        out.extend_from_slice(&0u32.to_le_bytes()); // segment count - 1
        out.extend_from_slice(&(self.words.len() as u32).to_le_bytes());
        for w in &self.words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }
}
