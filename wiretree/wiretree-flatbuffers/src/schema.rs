//! FlatBuffers schema types.

use serde::Serialize;
use wiretree_core::{Scalar, ValidationError};

/// FlatBuffers scalar types with their inline byte widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarType {
    Bool,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "byte" | "int8" => Self::Byte,
            "ubyte" | "uint8" => Self::UByte,
            "short" | "int16" => Self::Short,
            "ushort" | "uint16" => Self::UShort,
            "int" | "int32" => Self::Int,
            "uint" | "uint32" => Self::UInt,
            "long" | "int64" => Self::Long,
            "ulong" | "uint64" => Self::ULong,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::Byte | Self::UByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Long | Self::ULong | Self::Double => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }
}

/// A field's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FbsType {
    Scalar(ScalarType),
    Str,
    /// Named table, struct, enum, or union reference.
    Named(String),
    Vector(Box<FbsType>),
}

/// `(key: value, flag)` attributes attached to a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: FbsType,
    pub default_value: Option<Scalar>,
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub metadata: Vec<Metadata>,
}

impl TableDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumDef {
    pub name: String,
    pub base: ScalarType,
    /// Name/number pairs; implicit numbers are `previous + 1` from 0.
    pub values: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn number_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn name_of(&self, number: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == number)
            .map(|(n, _)| n.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnionDef {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FbsSchema {
    pub namespace: Option<String>,
    pub includes: Vec<String>,
    pub tables: Vec<TableDef>,
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumDef>,
    pub unions: Vec<UnionDef>,
    pub root_type: Option<String>,
    pub file_identifier: Option<String>,
    pub file_extension: Option<String>,
    pub attributes: Vec<String>,
}

impl FbsSchema {
    pub fn find_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// The table named by `root_type`.
    pub fn root_table(&self) -> Result<&TableDef, ValidationError> {
        let name = self
            .root_type
            .as_deref()
            .ok_or_else(|| ValidationError::schema("schema declares no root_type"))?;
        self.find_table(name).ok_or_else(|| {
            ValidationError::schema(format!("root_type '{name}' is not a declared table"))
        })
    }

    /// Struct fields must be fixed-size: scalars, enums, or nested structs.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if let Some(root) = self.root_type.as_deref() {
            if self.find_table(root).is_none() {
                return Err(ValidationError::schema(format!(
                    "root_type '{root}' is not a declared table"
                )));
            }
        }
        for s in &self.structs {
            for f in &s.fields {
                match &f.ty {
                    FbsType::Scalar(_) => {}
                    FbsType::Named(name)
                        if self.find_struct(name).is_some() || self.find_enum(name).is_some() => {}
                    other => {
                        return Err(ValidationError::schema(format!(
                            "struct '{}' field '{}' has non-fixed-size type {other:?}",
                            s.name, f.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
