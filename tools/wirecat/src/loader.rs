//! Schema loading and schema-directed data parsing shared by the commands.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use wiretree::{
    parse_capnp_schema_file, parse_flatbuffers_binary, parse_flatbuffers_schema_file,
    parse_schema_file, CapnpBinaryParser, CapnpSchema, FbsSchema, Message, ProtoSchema, Value,
};

/// A schema of any of the three families, loaded by file extension.
pub enum Schema {
    Proto(ProtoSchema),
    Capnp(CapnpSchema),
    Fbs(FbsSchema),
}

impl Schema {
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "proto" => Ok(Self::Proto(parse_schema_file(path)?)),
            "capnp" => Ok(Self::Capnp(parse_capnp_schema_file(path)?)),
            "fbs" => Ok(Self::Fbs(parse_flatbuffers_schema_file(path)?)),
            other => bail!("unrecognized schema extension '.{other}' for {}", path.display()),
        }
    }

    /// Parse a data file against this schema. `message_type` selects the
    /// root type where the family needs one.
    pub fn parse_data(&self, path: &Path, message_type: Option<&str>) -> Result<Value> {
        match self {
            Schema::Proto(schema) => {
                let message = parse_proto_data(path, schema, message_type)?;
                Ok(Value::Message(message))
            }
            Schema::Capnp(schema) => {
                let root = message_type
                    .context("Cap'n Proto data requires -t <root type>")?;
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(CapnpBinaryParser::new(schema).parse(&bytes, root)?)
            }
            Schema::Fbs(schema) => {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(parse_flatbuffers_binary(&bytes, schema)?)
            }
        }
    }
}

fn parse_proto_data(
    path: &Path,
    schema: &ProtoSchema,
    message_type: Option<&str>,
) -> Result<Message> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if matches!(extension.as_str(), "txtpb" | "textproto") {
        return wiretree::parse_textproto_file(path);
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let message = match message_type {
        Some(name) => wiretree::parse_binary_as(&bytes, schema, name)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        None => wiretree::parse_binary(&bytes, schema)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
    };
    Ok(message)
}
