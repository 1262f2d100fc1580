//! The intermediate representation shared by all wire-format codecs.
//!
//! Parsers produce these types, serializers consume them, and the rendering
//! layer turns them into JSON/YAML/textproto. Values are pure data: once a
//! parser returns, nothing mutates the tree.

use crate::error::{CoercionError, ValueTypeError};

/// A leaf value.
///
/// Integers are split into signed and unsigned variants so the full `uint64`
/// range stays representable. Codecs produce `Int` for signed declared types
/// and `UInt` for unsigned ones.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Scalar {
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widening view of either integer variant as `i64`.
    ///
    /// Fails for `UInt` values above `i64::MAX` and for every non-integer
    /// variant.
    pub fn to_i64(&self) -> Result<i64, CoercionError> {
        match self {
            Scalar::Int(n) => Ok(*n),
            Scalar::UInt(n) => i64::try_from(*n).map_err(|_| self.coercion("i64")),
            _ => Err(self.coercion("i64")),
        }
    }

    /// Widening view of either integer variant as `u64`. Fails for negative
    /// `Int` values and non-integer variants.
    pub fn to_u64(&self) -> Result<u64, CoercionError> {
        match self {
            Scalar::UInt(n) => Ok(*n),
            Scalar::Int(n) => u64::try_from(*n).map_err(|_| self.coercion("u64")),
            _ => Err(self.coercion("u64")),
        }
    }

    /// Numeric view as `f64`; accepts both integer variants.
    pub fn to_f64(&self) -> Result<f64, CoercionError> {
        match self {
            Scalar::Float(f) => Ok(*f),
            Scalar::Int(n) => Ok(*n as f64),
            Scalar::UInt(n) => Ok(*n as f64),
            _ => Err(self.coercion("f64")),
        }
    }

    fn coercion(&self, to: &str) -> CoercionError {
        CoercionError::new(self.variant_name(), to)
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Scalar::Str(_) => "Str",
            Scalar::Bytes(_) => "Bytes",
            Scalar::Int(_) => "Int",
            Scalar::UInt(_) => "UInt",
            Scalar::Float(_) => "Float",
            Scalar::Bool(_) => "Bool",
            Scalar::Null => "Null",
        }
    }
}

/// A node in the generic tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Message(Message),
    List(Vec<Value>),
    /// Map entries in insertion order. Keys are always scalars.
    Map(Vec<(Scalar, Value)>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Str(s.into()))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Scalar(Scalar::Bytes(b.into()))
    }

    pub fn int(n: i64) -> Self {
        Self::Scalar(Scalar::Int(n))
    }

    pub fn uint(n: u64) -> Self {
        Self::Scalar(Scalar::UInt(n))
    }

    pub fn float(f: f64) -> Self {
        Self::Scalar(Scalar::Float(f))
    }

    pub fn bool(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }

    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn try_scalar(&self) -> Result<&Scalar, ValueTypeError> {
        match self {
            Value::Scalar(s) => Ok(s),
            _ => Err(self.type_mismatch("Scalar")),
        }
    }

    pub fn try_message(&self) -> Result<&Message, ValueTypeError> {
        match self {
            Value::Message(m) => Ok(m),
            _ => Err(self.type_mismatch("Message")),
        }
    }

    pub fn try_list(&self) -> Result<&[Value], ValueTypeError> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(self.type_mismatch("List")),
        }
    }

    pub fn type_mismatch(&self, expected: impl Into<String>) -> ValueTypeError {
        ValueTypeError::new(expected, self.variant_name())
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.variant_name(),
            Value::Message(_) => "Message",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
}

/// One named entry in a [`Message`].
///
/// Repeated fields appear as multiple entries with the same name; `is_map`
/// marks entries that belong to a proto map field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
    pub is_map: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            is_map: false,
        }
    }

    pub fn map_entry(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            is_map: true,
        }
    }
}

/// An ordered sequence of fields, duplicates allowed.
///
/// Equality is structural and order-sensitive; two messages with the same
/// fields in different order are not equal. This matters for bit-exact
/// round-trips, where emission order must match parse order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field, preserving insertion order.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push(Field::new(name, value));
    }

    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// First field with the given name, if any.
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields with the given name, in order. This is how repeated proto
    /// fields are read back.
    pub fn find_fields(&self, name: &str) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.name == name).collect()
    }

    /// Unique field names in first-seen order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for f in &self.fields {
            if !names.contains(&f.name.as_str()) {
                names.push(&f.name);
            }
        }
        names
    }
}

impl FromIterator<Field> for Message {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
