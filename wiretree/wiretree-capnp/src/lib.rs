//! Cap'n Proto support: the `.capnp` IDL parser and the word-aligned
//! segment/pointer binary codec.
//!
//! The writer keeps a single in-progress segment and emits only direct
//! pointers; the reader resolves single-hop far pointers, so multi-segment
//! messages produced elsewhere still decode.

mod layout;
mod pointer;
mod reader;
mod schema;
mod schema_parser;
mod writer;

pub use layout::{layout_of, FieldSlot, Slot, StructLayout};
pub use pointer::{ElementSize, Pointer};
pub use reader::CapnpBinaryParser;
pub use schema::{
    Annotation, CapnpSchema, ConstDef, EnumDef, FieldDef, FieldType, GroupDef, InterfaceDef,
    MethodDef, PrimitiveType, StructDef, UnionDef, UsingDef,
};
pub use schema_parser::parse_capnp_schema;
pub use writer::CapnpBinarySerializer;
