//! FlatBuffers support: the `.fbs` IDL parser and the vtable/offset binary
//! codec.
//!
//! The codec uses the canonical layout: every uoffset (root, string, vector,
//! nested table) is relative to the slot it is stored in, so buffers from
//! standard FlatBuffers implementations parse too. Scalars are accepted at
//! 1-byte alignment on read; the writer aligns strings and vectors to 4.

mod reader;
mod schema;
mod schema_parser;
mod writer;

pub use reader::parse_flatbuffers_binary;
pub use schema::{
    EnumDef, FbsSchema, FbsType, FieldDef, Metadata, ScalarType, StructDef, TableDef, UnionDef,
};
pub use schema_parser::parse_flatbuffers_schema;
pub use writer::serialize_flatbuffers;
