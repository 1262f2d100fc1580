//! Proto3 schema types.
//!
//! Schemas stay flat: message and enum references are resolved by name at the
//! point of use ([`ProtoSchema::find_message`] / [`find_enum`]) rather than
//! being wired into back-pointers, so sibling and cyclic references cost
//! nothing at construction time.

use serde::Serialize;
use wiretree_core::ValidationError;

/// The 15 proto3 scalar type names.
pub const SCALAR_TYPES: [&str; 15] = [
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Repeated,
    Optional,
    /// Not produced by the proto3 parser; honored by the validator for
    /// forward compatibility.
    Required,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    /// Scalar type name, user type name, or `"map"`.
    pub type_name: String,
    pub number: u32,
    pub label: Option<Label>,
    /// Set only when `type_name == "map"`.
    pub key_type: Option<String>,
    /// Set only when `type_name == "map"`.
    pub value_type: Option<String>,
}

impl FieldDef {
    pub fn is_repeated(&self) -> bool {
        self.label == Some(Label::Repeated)
    }

    pub fn is_map(&self) -> bool {
        self.type_name == "map"
    }

    pub fn is_scalar(&self) -> bool {
        SCALAR_TYPES.contains(&self.type_name.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub nested_messages: Vec<MessageDef>,
    pub nested_enums: Vec<EnumDef>,
}

impl MessageDef {
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.number == number)
    }

    /// Field numbers must be unique and positive within one message.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut seen = Vec::with_capacity(self.fields.len());
        for f in &self.fields {
            if f.number == 0 {
                return Err(ValidationError::schema(format!(
                    "field '{}' in message '{}' has number 0",
                    f.name, self.name
                )));
            }
            if seen.contains(&f.number) {
                return Err(ValidationError::schema(format!(
                    "duplicate field number {} in message '{}'",
                    f.number, self.name
                )));
            }
            seen.push(f.number);
        }
        for m in &self.nested_messages {
            m.check_invariants()?;
        }
        for e in &self.nested_enums {
            e.check_invariants()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumDef {
    pub name: String,
    /// Name/number pairs in declaration order.
    pub values: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == number)
            .map(|(n, _)| n.as_str())
    }

    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut seen = Vec::with_capacity(self.values.len());
        for (name, number) in &self.values {
            if seen.contains(&number) {
                return Err(ValidationError::schema(format!(
                    "duplicate value {number} ('{name}') in enum '{}'",
                    self.name
                )));
            }
            seen.push(number);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtoSchema {
    pub syntax: String,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
}

impl ProtoSchema {
    /// Resolve a message by simple name or dotted path (`Outer.Inner`),
    /// searching top-level definitions first and nested ones depth-first.
    pub fn find_message(&self, name: &str) -> Option<&MessageDef> {
        if let Some((outer, rest)) = name.split_once('.') {
            let m = self.find_message(outer)?;
            return find_nested_message(m, rest);
        }
        find_message_in(&self.messages, name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        if let Some(e) = self.enums.iter().find(|e| e.name == name) {
            return Some(e);
        }
        find_enum_in(&self.messages, name)
    }

    /// The first message in declaration order; the default root for parsing
    /// when no type name is supplied.
    pub fn first_message(&self) -> Option<&MessageDef> {
        self.messages.first()
    }

    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        for m in &self.messages {
            m.check_invariants()?;
        }
        for e in &self.enums {
            e.check_invariants()?;
        }
        Ok(())
    }
}

fn find_nested_message<'a>(def: &'a MessageDef, path: &str) -> Option<&'a MessageDef> {
    match path.split_once('.') {
        Some((head, rest)) => {
            let m = def.nested_messages.iter().find(|m| m.name == head)?;
            find_nested_message(m, rest)
        }
        None => def.nested_messages.iter().find(|m| m.name == path),
    }
}

fn find_message_in<'a>(defs: &'a [MessageDef], name: &str) -> Option<&'a MessageDef> {
    for m in defs {
        if m.name == name {
            return Some(m);
        }
        if let Some(found) = find_message_in(&m.nested_messages, name) {
            return Some(found);
        }
    }
    None
}

fn find_enum_in<'a>(defs: &'a [MessageDef], name: &str) -> Option<&'a EnumDef> {
    for m in defs {
        if let Some(e) = m.nested_enums.iter().find(|e| e.name == name) {
            return Some(e);
        }
        if let Some(found) = find_enum_in(&m.nested_messages, name) {
            return Some(found);
        }
    }
    None
}
