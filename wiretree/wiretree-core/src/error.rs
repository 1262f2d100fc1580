//! Error types shared across the wiretree crates.
//!
//! Every codec surfaces errors to the caller; nothing in the core logs,
//! retries, or swallows. The only deliberate leniency is unknown-field
//! tolerance inside the binary codecs, which is not an error path at all.

/// Malformed input: bad tokens, truncated buffers, varint overflow, invalid
/// pointers, out-of-bounds offsets, or a grammar mismatch.
///
/// For text inputs, `line`/`column` are 1-based and `context` holds a short
/// source window around the failure.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub context: Option<String>,
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            context: None,
        }
    }

    /// Build a located error from the original source text and the byte
    /// offset where parsing failed.
    pub fn at_offset(message: impl Into<String>, source: &str, offset: usize) -> Self {
        let (line, column) = locate(source, offset);
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
            context: Some(source_window(source, line)),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "parse error at line {line}, column {column}: {}", self.message)?;
            }
            _ => write!(f, "parse error: {}", self.message)?,
        }
        if let Some(ctx) = &self.context {
            write!(f, "\n{ctx}")?;
        }
        Ok(())
    }
}

impl From<String> for ParseError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ParseError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// 1-based (line, column) of a byte offset within `source`.
pub fn locate(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.bytes().filter(|b| *b == b'\n').count() + 1;
    let column = before.rfind('\n').map_or(offset + 1, |nl| offset - nl);
    (line, column)
}

/// A window of up to five source lines centered on `line` (1-based), with a
/// marker on the failing line.
pub fn source_window(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let center = line.saturating_sub(1).min(lines.len() - 1);
    let start = center.saturating_sub(2);
    let end = (center + 3).min(lines.len());
    let mut out = String::new();
    for (i, text) in lines[start..end].iter().enumerate() {
        let n = start + i + 1;
        let marker = if n == line { ">" } else { " " };
        out.push_str(&format!("{marker} {n:>4} | {text}\n"));
    }
    out
}

/// A value that cannot be written in the requested form: unknown root or
/// embedded message type, or a value the declared type cannot represent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SerializationError {
    #[error("unknown root type '{0}'")]
    UnknownRootType(String),

    #[error("unknown message type '{0}' for field '{1}'")]
    UnknownMessageType(String, String),

    #[error("cannot encode {found} as {declared} for field '{field}'")]
    Unrepresentable {
        field: String,
        declared: String,
        found: String,
    },

    #[error("{0}")]
    Other(String),
}

impl From<String> for SerializationError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<CoercionError> for SerializationError {
    fn from(e: CoercionError) -> Self {
        Self::Other(e.to_string())
    }
}

/// A schema invariant or a data/schema mismatch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// The declared type rejects the supplied value.
    #[error("type error at {path}: {detail}")]
    Type { path: String, detail: String },

    /// The schema itself is malformed: duplicate field number or ordinal,
    /// missing required metadata (name, ordinal, file id, root type).
    #[error("invalid schema: {0}")]
    Schema(String),
}

impl ValidationError {
    pub fn type_error(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Type {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn schema(detail: impl Into<String>) -> Self {
        Self::Schema(detail.into())
    }
}

/// A value variant where a different one was required.
#[derive(Debug, Clone, thiserror::Error)]
#[error("expected {expected}, found {actual}")]
pub struct ValueTypeError {
    pub expected: String,
    pub actual: String,
}

impl ValueTypeError {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// A narrowing conversion that does not succeed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot convert {from} to {to}")]
pub struct CoercionError {
    pub from: String,
    pub to: String,
}

impl CoercionError {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_is_one_based() {
        let src = "ab\ncd\nef";
        assert_eq!(locate(src, 0), (1, 1));
        assert_eq!(locate(src, 4), (2, 2));
        assert_eq!(locate(src, 6), (3, 1));
    }

    #[test]
    fn window_marks_the_failing_line() {
        let src = "one\ntwo\nthree\nfour\nfive\nsix\nseven";
        let w = source_window(src, 4);
        assert!(w.contains(">    4 | four"));
        assert!(w.contains("     2 | two"));
        assert!(w.contains("     6 | six"));
        assert!(!w.contains("seven"));
    }
}
