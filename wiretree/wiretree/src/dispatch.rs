//! Extension-based dispatch for the `parse` entry point.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use wiretree_core::Message;
use wiretree_proto::ProtoSchema;

/// Parse a data file (or inline text-format content) into a [`Message`].
///
/// Dispatch rules:
/// - `.txtpb` / `.textproto` — text format.
/// - `.binpb` — wire format; `schema` is required.
/// - `.proto` / `.fbs` — rejected: these are schemas, not data.
/// - `.pb` — content sniff: UTF-8 that parses as text format is text,
///   anything else is wire format (schema required).
/// - Anything that is not an existing file is treated as inline text-format
///   content.
pub fn parse(path_or_content: &str, schema: Option<&ProtoSchema>) -> Result<Message> {
    let path = Path::new(path_or_content);
    if !path.is_file() {
        return Ok(wiretree_proto::parse_textproto(path_or_content)?);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "txtpb" | "textproto" => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(wiretree_proto::parse_textproto(&content)?)
        }
        "binpb" => {
            let schema = schema
                .with_context(|| format!("{} requires a schema", path.display()))?;
            let content =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(wiretree_proto::parse_binary(&content, schema)?)
        }
        "proto" | "fbs" => {
            bail!("{} is a schema, not data", path.display())
        }
        "pb" => {
            let content =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            sniff(&content, schema).with_context(|| format!("Failed to parse {}", path.display()))
        }
        _ => {
            let content =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            sniff(&content, schema).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }
}

/// Text wins when the bytes are valid UTF-8 and parse as text format;
/// otherwise fall back to the wire format, which needs a schema.
fn sniff(content: &[u8], schema: Option<&ProtoSchema>) -> Result<Message> {
    if let Ok(text) = std::str::from_utf8(content) {
        if let Ok(message) = wiretree_proto::parse_textproto(text) {
            return Ok(message);
        }
    }
    let schema = schema.context("binary content requires a schema")?;
    Ok(wiretree_proto::parse_binary(content, schema)?)
}
