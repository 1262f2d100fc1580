//! Text-format emitter: the inverse of the textproto parser.
//!
//! Two-space indentation, repeated fields as repeated lines, short scalar
//! lists inline, nested messages and map entries as `{ … }` blocks.

use wiretree_core::{Field, Message, Scalar, Value};

/// Render a [`Message`] in Protocol Buffers text format.
pub fn to_textproto(message: &Message) -> String {
    let mut out = String::new();
    emit_fields(message, 0, &mut out);
    out
}

fn emit_fields(message: &Message, indent: usize, out: &mut String) {
    for field in &message.fields {
        emit_field(field, indent, out);
    }
}

fn emit_field(field: &Field, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match &field.value {
        Value::Scalar(s) => {
            out.push_str(&format!("{pad}{}: {}\n", field.name, render_scalar(s)));
        }
        Value::Message(m) => {
            out.push_str(&format!("{pad}{} {{\n", field.name));
            emit_fields(m, indent + 1, out);
            out.push_str(&format!("{pad}}}\n"));
        }
        Value::List(items) => emit_list(&field.name, items, indent, out),
        Value::Map(entries) => {
            for (k, v) in entries {
                out.push_str(&format!("{pad}{} {{\n", field.name));
                out.push_str(&format!("{pad}  key: {}\n", render_scalar(k)));
                emit_value_field("value", v, indent + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
        }
    }
}

fn emit_value_field(name: &str, value: &Value, indent: usize, out: &mut String) {
    emit_field(
        &Field::new(name, value.clone()),
        indent,
        out,
    );
}

fn emit_list(name: &str, items: &[Value], indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    let all_scalars = items.iter().all(|v| matches!(v, Value::Scalar(_)));

    if items.is_empty() {
        out.push_str(&format!("{pad}{name}: []\n"));
        return;
    }

    if all_scalars {
        let rendered: Vec<String> = items
            .iter()
            .map(|v| match v {
                Value::Scalar(s) => render_scalar(s),
                _ => unreachable!(),
            })
            .collect();
        if rendered.len() < 5 {
            out.push_str(&format!("{pad}{name}: [{}]\n", rendered.join(", ")));
        } else {
            out.push_str(&format!("{pad}{name}: [\n"));
            for (i, r) in rendered.iter().enumerate() {
                let sep = if i + 1 < rendered.len() { "," } else { "" };
                out.push_str(&format!("{pad}  {r}{sep}\n"));
            }
            out.push_str(&format!("{pad}]\n"));
        }
        return;
    }

    // Lists with message elements render as repeated blocks.
    for item in items {
        emit_value_field(name, item, indent, out);
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Str(s) => format!("\"{}\"", escape_str(s)),
        Scalar::Bytes(b) => format!("\"{}\"", escape_bytes(b)),
        Scalar::Int(n) => n.to_string(),
        Scalar::UInt(n) => n.to_string(),
        Scalar::Float(f) => render_float(*f),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Null => "\"\"".to_string(),
    }
}

/// Floats keep a decimal point so they re-parse as floats.
fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Bytes render with the same escapes; anything outside printable ASCII
/// falls back to three-digit octal so the parser can take it back.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
    out
}
