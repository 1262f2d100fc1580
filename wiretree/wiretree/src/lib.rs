//! Polyglot schema-and-data library for three wire-format families:
//! Protocol Buffers (text and binary), Cap'n Proto, and FlatBuffers.
//!
//! Given a schema in the family's IDL, the codecs parse data messages into a
//! uniform in-memory tree ([`Message`] / [`Value`]) and serialize trees back
//! to bytes. In-memory entry points return typed errors; the `*_file`
//! wrappers and [`parse`] read whole files and use `anyhow` with context.

mod dispatch;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub use wiretree_core::{
    CoercionError, Field, Message, ParseError, Scalar, SerializationError, ValidationError, Value,
};

pub use wiretree_capnp::{
    parse_capnp_schema, CapnpBinaryParser, CapnpBinarySerializer, CapnpSchema,
};
pub use wiretree_flatbuffers::{
    parse_flatbuffers_binary, parse_flatbuffers_schema, serialize_flatbuffers, FbsSchema,
};
pub use wiretree_proto::{
    parse_binary, parse_binary_as, parse_proto_schema, parse_textproto, serialize_binary,
    to_textproto, validate_message, ProtoSchema, ValidationIssue,
};

pub use dispatch::parse;

/// Read and parse a text-format file.
pub fn parse_textproto_file(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_textproto(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read and parse a wire-format file against the schema's first message.
pub fn parse_binary_file(path: impl AsRef<Path>, schema: &ProtoSchema) -> Result<Message> {
    let path = path.as_ref();
    let content =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_binary(&content, schema).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read and parse a `.proto` schema file.
pub fn parse_schema_file(path: impl AsRef<Path>) -> Result<ProtoSchema> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_proto_schema(&content)
        .with_context(|| format!("Failed to parse schema {}", path.display()))
}

/// Read and parse a `.capnp` schema file.
pub fn parse_capnp_schema_file(path: impl AsRef<Path>) -> Result<CapnpSchema> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_capnp_schema(&content)
        .with_context(|| format!("Failed to parse schema {}", path.display()))
}

/// Read and parse a `.fbs` schema file.
pub fn parse_flatbuffers_schema_file(path: impl AsRef<Path>) -> Result<FbsSchema> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_flatbuffers_schema(&content)
        .with_context(|| format!("Failed to parse schema {}", path.display()))
}
