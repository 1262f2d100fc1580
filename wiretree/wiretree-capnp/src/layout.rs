//! Struct layout: where each field lives inside the data and pointer
//! sections.
//!
//! Primitive placement is a pure function of the field's ordinal and width;
//! pointer-typed fields (Text, Data, List, structs, AnyPointer) take pointer
//! slots counted in declaration order. Enums referenced by name occupy
//! 16-bit data slots.

use wiretree_core::ParseError;

use crate::schema::{CapnpSchema, FieldType, PrimitiveType, StructDef};

/// Placement of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    /// No storage at all (`Void`).
    None,
    /// `bits` wide at `shift` within data word `word`.
    Data { word: u32, shift: u32, bits: u32 },
    /// Index into the pointer section.
    Pointer { index: u32 },
}

#[derive(Debug, Clone)]
pub struct FieldSlot {
    /// Index into the struct's `fields` vector.
    pub field_index: usize,
    pub slot: Slot,
}

#[derive(Debug, Clone)]
pub struct StructLayout {
    pub data_words: u16,
    pub pointer_words: u16,
    pub slots: Vec<FieldSlot>,
}

/// Data-section width in bits for a field, or `None` for pointer fields.
fn data_bits(ty: &FieldType, schema: &CapnpSchema) -> Result<Option<u32>, ParseError> {
    Ok(match ty {
        FieldType::Primitive(p) => match p {
            PrimitiveType::Void => Some(0),
            PrimitiveType::Bool => Some(1),
            PrimitiveType::Int8 | PrimitiveType::UInt8 => Some(8),
            PrimitiveType::Int16 | PrimitiveType::UInt16 => Some(16),
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => Some(32),
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => Some(64),
            PrimitiveType::Text | PrimitiveType::Data | PrimitiveType::AnyPointer => None,
        },
        FieldType::List(_) => None,
        FieldType::Named(name) => {
            if schema.find_enum(name).is_some() {
                // Enums live in the data section as UInt16.
                Some(16)
            } else if schema.find_struct(name).is_some() {
                None
            } else {
                return Err(ParseError::new(format!("unknown type '{name}'")));
            }
        }
    })
}

/// Compute the layout of a struct from its field list.
pub fn layout_of(def: &StructDef, schema: &CapnpSchema) -> Result<StructLayout, ParseError> {
    let mut slots = Vec::with_capacity(def.fields.len());
    let mut data_words: u32 = 0;
    let mut pointer_count: u32 = 0;

    for (field_index, field) in def.fields.iter().enumerate() {
        let ord = u32::from(field.ordinal);
        let slot = match data_bits(&field.ty, schema)? {
            None => {
                let index = pointer_count;
                pointer_count += 1;
                Slot::Pointer { index }
            }
            Some(0) => Slot::None,
            Some(1) => {
                let word = ord / 64;
                data_words = data_words.max(word + 1);
                Slot::Data {
                    word,
                    shift: ord % 64,
                    bits: 1,
                }
            }
            Some(bits) => {
                let per_word = 64 / bits;
                let word = ord / per_word;
                data_words = data_words.max(word + 1);
                Slot::Data {
                    word,
                    shift: (ord % per_word) * bits,
                    bits,
                }
            }
        };
        slots.push(FieldSlot { field_index, slot });
    }

    Ok(StructLayout {
        data_words: data_words as u16,
        pointer_words: pointer_count as u16,
        slots,
    })
}
