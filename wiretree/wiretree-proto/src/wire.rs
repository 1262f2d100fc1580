//! Protocol Buffers wire-format primitives: varints, ZigZag, and field tags.
//!
//! All multi-byte fixed-width values on the wire are little-endian.

use bytes::{Buf, BufMut};
use wiretree_core::ParseError;

/// A varint never spans more than 10 payload bytes (64 bits at 7 bits each).
pub const MAX_VARINT_BYTES: usize = 10;

/// The three-bit classifier in a field tag's low bits. Wire types 3 and 4
/// (groups) are unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    I32 = 5,
}

impl WireType {
    pub fn from_bits(bits: u8) -> Result<Self, ParseError> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::I32),
            other => Err(ParseError::new(format!("unsupported wire type {other}"))),
        }
    }
}

/// Little-endian base-128: low 7 bits per byte, high bit flags continuation.
pub fn encode_varint(mut value: u64, out: &mut impl BufMut) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.put_u8(byte);
            return;
        }
        out.put_u8(byte | 0x80);
    }
}

/// Decode a varint, rejecting truncation and encodings past 10 bytes.
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64, ParseError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_BYTES {
        if !buf.has_remaining() {
            return Err(ParseError::new("truncated varint"));
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ParseError::new("varint exceeds 10 bytes"))
}

pub fn encode_zigzag32(n: i32) -> u64 {
    (((n << 1) ^ (n >> 31)) as u32) as u64
}

pub fn decode_zigzag32(u: u64) -> i32 {
    let u = u as u32;
    ((u >> 1) as i32) ^ -((u & 1) as i32)
}

pub fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn decode_zigzag64(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// `tag = (field_number << 3) | wire_type`.
pub fn encode_tag(field_number: u32, wire_type: WireType, out: &mut impl BufMut) {
    encode_varint((u64::from(field_number) << 3) | wire_type as u64, out);
}

pub fn decode_tag(buf: &mut impl Buf) -> Result<(u32, WireType), ParseError> {
    let tag = decode_varint(buf)?;
    let wire_type = WireType::from_bits((tag & 0x7) as u8)?;
    let field_number = u32::try_from(tag >> 3)
        .map_err(|_| ParseError::new(format!("field number {} out of range", tag >> 3)))?;
    Ok((field_number, wire_type))
}

/// Skip one value of the given wire type. This is how unknown fields are
/// tolerated instead of rejected.
pub fn skip_value(buf: &mut impl Buf, wire_type: WireType) -> Result<(), ParseError> {
    match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
        }
        WireType::I64 => {
            if buf.remaining() < 8 {
                return Err(ParseError::new("truncated 64-bit value"));
            }
            buf.advance(8);
        }
        WireType::I32 => {
            if buf.remaining() < 4 {
                return Err(ParseError::new("truncated 32-bit value"));
            }
            buf.advance(4);
        }
        WireType::Len => {
            let len = decode_varint(buf)? as usize;
            if buf.remaining() < len {
                return Err(ParseError::new("truncated length-delimited value"));
            }
            buf.advance(len);
        }
    }
    Ok(())
}
