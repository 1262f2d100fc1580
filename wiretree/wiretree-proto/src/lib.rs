//! Protocol Buffers support: the proto3 IDL parser, the text-format
//! parser/emitter, the binary wire codec, and the schema validator.
//!
//! Everything operates on the generic [`Message`](wiretree_core::Message)
//! tree; schemas are immutable after construction and may be shared freely.

mod codec;
mod emit;
mod schema;
mod schema_parser;
mod textproto;
mod validate;
pub mod wire;

pub use codec::{decode_message, encode_message, parse_binary, parse_binary_as, serialize_binary};
pub use emit::to_textproto;
pub use schema::{EnumDef, FieldDef, Label, MessageDef, ProtoSchema, SCALAR_TYPES};
pub use schema_parser::parse_proto_schema;
pub use textproto::parse_textproto;
pub use validate::{validate_message, ValidationIssue};
