//! Binary reader: segment framing, pointer resolution, and schema-driven
//! decoding into the generic value tree.

use bytes::{Buf, Bytes};
use wiretree_core::{Message, ParseError, Scalar, Value};

use crate::layout::{layout_of, Slot};
use crate::pointer::{ElementSize, Pointer};
use crate::schema::{CapnpSchema, EnumDef, FieldType, PrimitiveType, StructDef};

/// Parses Cap'n Proto binary messages against a schema.
pub struct CapnpBinaryParser<'a> {
    schema: &'a CapnpSchema,
}

impl<'a> CapnpBinaryParser<'a> {
    pub fn new(schema: &'a CapnpSchema) -> Self {
        Self { schema }
    }

    /// Decode a framed message whose root is `root_type`.
    pub fn parse(&self, bytes: &[u8], root_type: &str) -> Result<Value, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::new("empty input"));
        }
        let def = self.schema.find_struct(root_type).ok_or_else(|| {
            ParseError::new(format!("root type '{root_type}' not found in schema"))
        })?;

        let segments = SegmentReader::from_framed(bytes)?;
        match segments.follow_pointer(0, 0, 0)? {
            Resolved::Null => Ok(Value::Message(Message::new())),
            Resolved::Struct {
                seg,
                start,
                data_words,
                pointer_words,
            } => self.read_struct(&segments, seg, start, data_words, pointer_words, def),
            other => Err(ParseError::new(format!(
                "root pointer is not a struct ({other:?})"
            ))),
        }
    }

    fn read_struct(
        &self,
        segments: &SegmentReader,
        seg: u32,
        start: u32,
        data_words: u16,
        pointer_words: u16,
        def: &StructDef,
    ) -> Result<Value, ParseError> {
        let layout = layout_of(def, self.schema)?;
        let mut message = Message::new();

        for field_slot in &layout.slots {
            let field = &def.fields[field_slot.field_index];
            let value = match field_slot.slot {
                Slot::None => Value::null(),
                Slot::Data { word, shift, bits } => {
                    let raw = if word < u32::from(data_words) {
                        let w = segments.word(seg, start + word)?;
                        (w >> shift) & mask(bits)
                    } else {
                        // Beyond the encoded data section: default.
                        0
                    };
                    self.data_value(raw, &field.ty)?
                }
                Slot::Pointer { index } => {
                    if index < u32::from(pointer_words) {
                        let ptr_word = start + u32::from(data_words) + index;
                        self.pointer_value(segments, seg, ptr_word, &field.ty)?
                    } else {
                        absent_pointer_value(&field.ty)
                    }
                }
            };
            message.push(field.name.clone(), value);
        }
        Ok(Value::Message(message))
    }

    /// Interpret raw data-section bits according to the declared type, with
    /// sign extension for the signed widths.
    fn data_value(&self, raw: u64, ty: &FieldType) -> Result<Value, ParseError> {
        Ok(match ty {
            FieldType::Primitive(p) => match p {
                PrimitiveType::Bool => Value::bool(raw != 0),
                PrimitiveType::Int8 => Value::int(i64::from(raw as u8 as i8)),
                PrimitiveType::Int16 => Value::int(i64::from(raw as u16 as i16)),
                PrimitiveType::Int32 => Value::int(i64::from(raw as u32 as i32)),
                PrimitiveType::Int64 => Value::int(raw as i64),
                PrimitiveType::UInt8 | PrimitiveType::UInt16 | PrimitiveType::UInt32
                | PrimitiveType::UInt64 => Value::uint(raw),
                PrimitiveType::Float32 => Value::float(f64::from(f32::from_bits(raw as u32))),
                PrimitiveType::Float64 => Value::float(f64::from_bits(raw)),
                other => {
                    return Err(ParseError::new(format!(
                        "type {other:?} has no data-section representation"
                    )))
                }
            },
            FieldType::Named(name) => {
                let enum_def = self.schema.find_enum(name).ok_or_else(|| {
                    ParseError::new(format!("'{name}' is not an enum"))
                })?;
                Value::Scalar(enum_scalar(raw as u16, enum_def))
            }
            FieldType::List(_) => {
                return Err(ParseError::new("list type in data section"));
            }
        })
    }

    fn pointer_value(
        &self,
        segments: &SegmentReader,
        seg: u32,
        ptr_word: u32,
        ty: &FieldType,
    ) -> Result<Value, ParseError> {
        let resolved = segments.follow_pointer(seg, ptr_word, 0)?;
        match (ty, resolved) {
            (_, Resolved::Null) => Ok(absent_pointer_value(ty)),
            (FieldType::Primitive(PrimitiveType::Text), r) => self.read_text(segments, r),
            (FieldType::Primitive(PrimitiveType::Data), r) => self.read_data(segments, r),
            (FieldType::Primitive(PrimitiveType::AnyPointer), Resolved::Capability { index }) => {
                Ok(Value::uint(u64::from(index)))
            }
            (FieldType::Primitive(PrimitiveType::AnyPointer), _) => Ok(Value::null()),
            (FieldType::List(elem), r) => self.read_list(segments, r, elem),
            (FieldType::Named(name), r) => {
                let def = self
                    .schema
                    .find_struct(name)
                    .ok_or_else(|| ParseError::new(format!("unknown struct type '{name}'")))?;
                let Resolved::Struct {
                    seg,
                    start,
                    data_words,
                    pointer_words,
                } = r
                else {
                    return Err(ParseError::new(format!(
                        "field of type '{name}' is not a struct pointer"
                    )));
                };
                self.read_struct(segments, seg, start, data_words, pointer_words, def)
            }
            (ty, r) => Err(ParseError::new(format!(
                "pointer {r:?} does not match declared type {ty:?}"
            ))),
        }
    }

    /// Text is a byte list whose trailing null byte is counted but stripped.
    fn read_text(&self, segments: &SegmentReader, r: Resolved) -> Result<Value, ParseError> {
        let Resolved::List {
            seg,
            start,
            element_size: ElementSize::Byte,
            element_count,
        } = r
        else {
            return Err(ParseError::new(format!("text field is not a byte list ({r:?})")));
        };
        if element_count == 0 {
            return Ok(Value::str(""));
        }
        let bytes = segments.bytes(seg, start, element_count as usize)?;
        let (last, body) = bytes.split_last().expect("count checked above");
        if *last != 0 {
            return Err(ParseError::new("text missing null terminator"));
        }
        let s = std::str::from_utf8(body)
            .map_err(|e| ParseError::new(format!("invalid UTF-8 in text: {e}")))?;
        Ok(Value::str(s))
    }

    fn read_data(&self, segments: &SegmentReader, r: Resolved) -> Result<Value, ParseError> {
        let Resolved::List {
            seg,
            start,
            element_size: ElementSize::Byte,
            element_count,
        } = r
        else {
            return Err(ParseError::new(format!("data field is not a byte list ({r:?})")));
        };
        Ok(Value::bytes(
            segments.bytes(seg, start, element_count as usize)?.to_vec(),
        ))
    }

    fn read_list(
        &self,
        segments: &SegmentReader,
        r: Resolved,
        elem: &FieldType,
    ) -> Result<Value, ParseError> {
        let Resolved::List {
            seg,
            start,
            element_size,
            element_count,
        } = r
        else {
            return Err(ParseError::new(format!("list field is not a list pointer ({r:?})")));
        };

        let mut items = Vec::new();
        match element_size {
            ElementSize::Void => {
                items.resize(element_count as usize, Value::null());
            }
            ElementSize::Bit => {
                for i in 0..element_count {
                    let w = segments.word(seg, start + i / 64)?;
                    items.push(Value::bool((w >> (i % 64)) & 1 == 1));
                }
            }
            ElementSize::Byte
            | ElementSize::TwoBytes
            | ElementSize::FourBytes
            | ElementSize::EightBytes => {
                let bits = element_size.bits_per_element();
                let per_word = 64 / bits;
                for i in 0..element_count {
                    let w = segments.word(seg, start + i / per_word)?;
                    let raw = (w >> ((i % per_word) * bits)) & mask(bits);
                    items.push(self.data_value(raw, elem)?);
                }
            }
            ElementSize::Pointer => {
                for i in 0..element_count {
                    items.push(self.pointer_value(segments, seg, start + i, elem)?);
                }
            }
            ElementSize::InlineComposite => {
                // The count field holds total words; the tag word holds the
                // element count and per-element section sizes.
                let tag = Pointer::decode(segments.word(seg, start)?);
                let (count, data_words, pointer_words) = tag.expect_struct()?;
                let count = count as u32;
                let stride = u32::from(data_words) + u32::from(pointer_words);
                if u64::from(count) * u64::from(stride) > u64::from(element_count) {
                    return Err(ParseError::new(
                        "inline composite elements overrun the list body",
                    ));
                }
                let FieldType::Named(name) = elem else {
                    return Err(ParseError::new(format!(
                        "inline composite list with non-struct element type {elem:?}"
                    )));
                };
                let def = self
                    .schema
                    .find_struct(name)
                    .ok_or_else(|| ParseError::new(format!("unknown struct type '{name}'")))?;
                for i in 0..count {
                    items.push(self.read_struct(
                        segments,
                        seg,
                        start + 1 + i * stride,
                        data_words,
                        pointer_words,
                        def,
                    )?);
                }
            }
        }
        Ok(Value::List(items))
    }
}

/// A pointer value for a slot the encoded struct does not carry.
fn absent_pointer_value(ty: &FieldType) -> Value {
    match ty {
        FieldType::List(_) => Value::List(Vec::new()),
        _ => Value::null(),
    }
}

fn enum_scalar(raw: u16, enum_def: &EnumDef) -> Scalar {
    match enum_def.name_of(raw) {
        Some(name) => Scalar::Str(name.to_string()),
        None => Scalar::UInt(u64::from(raw)),
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A resolved (non-far) pointer target.
#[derive(Debug, Clone, Copy)]
enum Resolved {
    Null,
    Struct {
        seg: u32,
        start: u32,
        data_words: u16,
        pointer_words: u16,
    },
    List {
        seg: u32,
        start: u32,
        element_size: ElementSize,
        element_count: u32,
    },
    Capability {
        index: u32,
    },
}

/// Bounds-checked views over the message's segments.
struct SegmentReader {
    segments: Vec<Bytes>,
}

impl SegmentReader {
    /// Parse the framing header: u32 segment-count-minus-one, per-segment
    /// sizes in words, and a padding u32 when the count is even.
    fn from_framed(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        if buf.remaining() < 4 {
            return Err(ParseError::new("truncated segment header"));
        }
        let count = buf.get_u32_le() as usize + 1;
        if buf.remaining() < count * 4 {
            return Err(ParseError::new("truncated segment size table"));
        }
        let sizes: Vec<usize> = (0..count).map(|_| buf.get_u32_le() as usize).collect();
        if (1 + count) % 2 != 0 {
            if buf.remaining() < 4 {
                return Err(ParseError::new("truncated segment header padding"));
            }
            buf.advance(4);
        }

        let mut segments = Vec::with_capacity(count);
        for (i, words) in sizes.iter().enumerate() {
            let len = words * 8;
            if buf.remaining() < len {
                return Err(ParseError::new(format!(
                    "segment {i} claims {words} words but only {} bytes remain",
                    buf.remaining()
                )));
            }
            segments.push(buf.copy_to_bytes(len));
        }
        Ok(Self { segments })
    }

    fn segment(&self, seg: u32) -> Result<&Bytes, ParseError> {
        self.segments
            .get(seg as usize)
            .ok_or_else(|| ParseError::new(format!("segment id {seg} out of range")))
    }

    /// Read the word at `(seg, idx)`, rejecting reads past the segment's
    /// declared length.
    fn word(&self, seg: u32, idx: u32) -> Result<u64, ParseError> {
        let data = self.segment(seg)?;
        let offset = idx as usize * 8;
        if offset + 8 > data.len() {
            return Err(ParseError::new(format!(
                "word offset {idx} out of bounds for segment {seg} ({} words)",
                data.len() / 8
            )));
        }
        Ok(u64::from_le_bytes(
            data[offset..offset + 8].try_into().expect("8-byte slice"),
        ))
    }

    /// Borrow `len` raw bytes starting at word `start`.
    fn bytes(&self, seg: u32, start: u32, len: usize) -> Result<&[u8], ParseError> {
        let data = self.segment(seg)?;
        let offset = start as usize * 8;
        if offset + len > data.len() {
            return Err(ParseError::new(format!(
                "byte range {offset}..{} out of bounds for segment {seg}",
                offset + len
            )));
        }
        Ok(&data[offset..offset + len])
    }

    /// Decode the pointer at `(seg, ptr_word)`, resolving a single far hop.
    /// Double-far landing pads are never produced by the writer and are
    /// rejected here.
    fn follow_pointer(&self, seg: u32, ptr_word: u32, depth: u8) -> Result<Resolved, ParseError> {
        let word = self.word(seg, ptr_word)?;
        match Pointer::decode(word) {
            Pointer::Null => Ok(Resolved::Null),
            Pointer::Struct {
                offset,
                data_words,
                pointer_words,
            } => Ok(Resolved::Struct {
                seg,
                start: target_word(ptr_word, offset)?,
                data_words,
                pointer_words,
            }),
            Pointer::List {
                offset,
                element_size,
                element_count,
            } => Ok(Resolved::List {
                seg,
                start: target_word(ptr_word, offset)?,
                element_size,
                element_count,
            }),
            Pointer::Far {
                double_far: true, ..
            } => Err(ParseError::new("double-far pointers are not supported")),
            Pointer::Far {
                double_far: false,
                word_offset,
                segment_id,
            } => {
                if depth > 0 {
                    return Err(ParseError::new("far pointer chain"));
                }
                self.follow_pointer(segment_id, word_offset, depth + 1)
            }
            Pointer::Capability { index } => Ok(Resolved::Capability { index }),
        }
    }
}

/// `target = pointer_word + 1 + offset`; negative results are out of bounds.
fn target_word(ptr_word: u32, offset: i32) -> Result<u32, ParseError> {
    let target = i64::from(ptr_word) + 1 + i64::from(offset);
    u32::try_from(target)
        .map_err(|_| ParseError::new(format!("pointer offset {offset} resolves before segment start")))
}
