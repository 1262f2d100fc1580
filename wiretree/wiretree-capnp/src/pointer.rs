//! 64-bit pointer words: struct, list, far, and capability pointers.
//!
//! All words are little-endian. Offsets are in words, measured from the word
//! after the pointer; negative offsets are legal.

use wiretree_core::ParseError;

/// The 3-bit element-size code in a list pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0x7 {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            _ => Self::InlineComposite,
        }
    }

    /// Bits per element for the fixed-width codes.
    pub fn bits_per_element(self) -> u32 {
        match self {
            Self::Void => 0,
            Self::Bit => 1,
            Self::Byte => 8,
            Self::TwoBytes => 16,
            Self::FourBytes => 32,
            Self::EightBytes | Self::Pointer => 64,
            Self::InlineComposite => 64,
        }
    }
}

/// A decoded pointer word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pointer {
    Null,
    Struct {
        /// Signed 30-bit word offset, relative to the word after the pointer.
        offset: i32,
        data_words: u16,
        pointer_words: u16,
    },
    List {
        offset: i32,
        element_size: ElementSize,
        /// Element count, except for inline composites where it is the total
        /// word count of the list body.
        element_count: u32,
    },
    Far {
        /// Set when the landing pad is a two-word double-far pad.
        double_far: bool,
        /// Word offset of the landing pad within the target segment.
        word_offset: u32,
        segment_id: u32,
    },
    Capability {
        index: u32,
    },
}

const OFFSET_MASK: u64 = 0x3FFF_FFFF;

fn sign_extend_30(raw: u32) -> i32 {
    ((raw << 2) as i32) >> 2
}

impl Pointer {
    pub fn decode(word: u64) -> Self {
        if word == 0 {
            return Pointer::Null;
        }
        match word & 0x3 {
            0 => Pointer::Struct {
                offset: sign_extend_30(((word >> 2) & OFFSET_MASK) as u32),
                data_words: (word >> 32) as u16,
                pointer_words: (word >> 48) as u16,
            },
            1 => Pointer::List {
                offset: sign_extend_30(((word >> 2) & OFFSET_MASK) as u32),
                element_size: ElementSize::from_bits(word >> 32),
                element_count: ((word >> 35) & 0x1FFF_FFFF) as u32,
            },
            2 => Pointer::Far {
                double_far: (word >> 2) & 1 == 1,
                word_offset: ((word >> 3) & 0x1FFF_FFFF) as u32,
                segment_id: (word >> 32) as u32,
            },
            _ => Pointer::Capability {
                index: (word >> 32) as u32,
            },
        }
    }

    pub fn encode(&self) -> u64 {
        match *self {
            Pointer::Null => 0,
            Pointer::Struct {
                offset,
                data_words,
                pointer_words,
            } => {
                (u64::from(offset as u32 & OFFSET_MASK as u32) << 2)
                    | (u64::from(data_words) << 32)
                    | (u64::from(pointer_words) << 48)
            }
            Pointer::List {
                offset,
                element_size,
                element_count,
            } => {
                1 | (u64::from(offset as u32 & OFFSET_MASK as u32) << 2)
                    | ((element_size as u64) << 32)
                    | (u64::from(element_count & 0x1FFF_FFFF) << 35)
            }
            Pointer::Far {
                double_far,
                word_offset,
                segment_id,
            } => {
                2 | (u64::from(double_far) << 2)
                    | (u64::from(word_offset & 0x1FFF_FFFF) << 3)
                    | (u64::from(segment_id) << 32)
            }
            Pointer::Capability { index } => 3 | (u64::from(index) << 32),
        }
    }

    pub fn expect_struct(self) -> Result<(i32, u16, u16), ParseError> {
        match self {
            Pointer::Struct {
                offset,
                data_words,
                pointer_words,
            } => Ok((offset, data_words, pointer_words)),
            other => Err(ParseError::new(format!(
                "expected struct pointer, found {other:?}"
            ))),
        }
    }
}
