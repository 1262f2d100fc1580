//! Cap'n Proto schema types.
//!
//! Type references stay by-name and are resolved at use through
//! [`CapnpSchema::find_struct`] / [`find_enum`], keeping the schema a flat
//! lookup table even when structs reference siblings or themselves.

use serde::Serialize;
use wiretree_core::{Scalar, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimitiveType {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Data,
    AnyPointer,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Void" => Self::Void,
            "Bool" => Self::Bool,
            "Int8" => Self::Int8,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "UInt8" => Self::UInt8,
            "UInt16" => Self::UInt16,
            "UInt32" => Self::UInt32,
            "UInt64" => Self::UInt64,
            "Float32" => Self::Float32,
            "Float64" => Self::Float64,
            "Text" => Self::Text,
            "Data" => Self::Data,
            "AnyPointer" => Self::AnyPointer,
            _ => return None,
        })
    }
}

/// A field's declared type: a primitive, a `List(T)` (recursive), or a named
/// struct/enum reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldType {
    Primitive(PrimitiveType),
    List(Box<FieldType>),
    Named(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ordinal: u16,
    pub ty: FieldType,
    pub default_value: Option<Scalar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnionDef {
    /// `None` for an anonymous union.
    pub name: Option<String>,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDef {
    pub name: String,
    pub ordinal: u16,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub unions: Vec<UnionDef>,
    pub groups: Vec<GroupDef>,
    pub nested_structs: Vec<StructDef>,
    pub nested_enums: Vec<EnumDef>,
    pub nested_interfaces: Vec<InterfaceDef>,
    pub annotations: Vec<Annotation>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Ordinals are unique across the struct's fields, union members, and
    /// groups; unions must carry at least two members.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut seen: Vec<u16> = Vec::new();
        let mut check = |name: &str, ordinal: u16| -> Result<(), ValidationError> {
            if seen.contains(&ordinal) {
                return Err(ValidationError::schema(format!(
                    "duplicate ordinal @{ordinal} ('{name}') in struct '{}'",
                    self.name
                )));
            }
            seen.push(ordinal);
            Ok(())
        };
        for f in &self.fields {
            check(&f.name, f.ordinal)?;
        }
        for u in &self.unions {
            if u.fields.len() < 2 {
                return Err(ValidationError::schema(format!(
                    "union in struct '{}' has fewer than 2 fields",
                    self.name
                )));
            }
            for f in &u.fields {
                check(&f.name, f.ordinal)?;
            }
        }
        for g in &self.groups {
            check(&g.name, g.ordinal)?;
        }
        for s in &self.nested_structs {
            s.check_invariants()?;
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
    /// Enumerant name/ordinal pairs in declaration order.
    pub enumerants: Vec<(String, u16)>,
}

impl EnumDef {
    pub fn ordinal_of(&self, name: &str) -> Option<u16> {
        self.enumerants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| *o)
    }

    pub fn name_of(&self, ordinal: u16) -> Option<&str> {
        self.enumerants
            .iter()
            .find(|(_, o)| *o == ordinal)
            .map(|(n, _)| n.as_str())
    }

    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut seen = Vec::with_capacity(self.enumerants.len());
        for (name, ordinal) in &self.enumerants {
            if seen.contains(&ordinal) {
                return Err(ValidationError::schema(format!(
                    "duplicate ordinal @{ordinal} ('{name}') in enum '{}'",
                    self.name
                )));
            }
            seen.push(ordinal);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDef {
    pub name: String,
    pub ordinal: u16,
    pub params: Vec<(String, FieldType)>,
    pub results: Vec<(String, FieldType)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceDef {
    pub name: String,
    pub methods: Vec<MethodDef>,
}

impl InterfaceDef {
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut seen = Vec::with_capacity(self.methods.len());
        for m in &self.methods {
            if seen.contains(&m.ordinal) {
                return Err(ValidationError::schema(format!(
                    "duplicate ordinal @{} ('{}') in interface '{}'",
                    m.ordinal, m.name, self.name
                )));
            }
            seen.push(m.ordinal);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstDef {
    pub name: String,
    pub ty: FieldType,
    pub value: Scalar,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsingDef {
    pub alias: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapnpSchema {
    /// The `@0x…` file id, kept as its hex spelling.
    pub file_id: String,
    pub usings: Vec<UsingDef>,
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumDef>,
    pub interfaces: Vec<InterfaceDef>,
    pub constants: Vec<ConstDef>,
}

impl CapnpSchema {
    pub fn find_struct(&self, name: &str) -> Option<&StructDef> {
        find_struct_in(&self.structs, name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        if let Some(e) = self.enums.iter().find(|e| e.name == name) {
            return Some(e);
        }
        find_enum_in(&self.structs, name)
    }

    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if self.file_id.is_empty() {
            return Err(ValidationError::schema("missing @0x file id"));
        }
        for s in &self.structs {
            s.check_invariants()?;
        }
        for e in &self.enums {
            e.check_invariants()?;
        }
        for i in &self.interfaces {
            i.check_invariants()?;
        }
        Ok(())
    }
}

fn find_struct_in<'a>(defs: &'a [StructDef], name: &str) -> Option<&'a StructDef> {
    for s in defs {
        if s.name == name {
            return Some(s);
        }
        if let Some(found) = find_struct_in(&s.nested_structs, name) {
            return Some(found);
        }
    }
    None
}

fn find_enum_in<'a>(defs: &'a [StructDef], name: &str) -> Option<&'a EnumDef> {
    for s in defs {
        if let Some(e) = s.nested_enums.iter().find(|e| e.name == name) {
            return Some(e);
        }
        if let Some(found) = find_enum_in(&s.nested_structs, name) {
            return Some(found);
        }
    }
    None
}
