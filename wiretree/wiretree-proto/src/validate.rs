//! Schema validation of a decoded (or hand-built) message tree.
//!
//! Issues are collected rather than raised: callers get the full list of
//! problems in one pass. Proto3 treats every field as optional, so presence
//! is only checked for fields explicitly marked required.

use wiretree_core::{Message, Scalar, Value};

use crate::schema::{FieldDef, Label, MessageDef, ProtoSchema};

/// One validation finding, with a dotted path to the offending field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate `message` against the named type; returns all findings.
pub fn validate_message(
    message: &Message,
    schema: &ProtoSchema,
    def: &MessageDef,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_message(message, schema, def, &def.name.clone(), &mut issues);
    issues
}

fn check_message(
    message: &Message,
    schema: &ProtoSchema,
    def: &MessageDef,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in &message.fields {
        let field_path = format!("{path}.{}", field.name);
        let Some(field_def) = def.field_by_name(&field.name) else {
            issues.push(ValidationIssue::new(&field_path, "Unknown field"));
            continue;
        };
        check_value(&field.value, schema, field_def, &field_path, issues);
    }

    for field_def in &def.fields {
        if field_def.label == Some(Label::Required) && message.find_field(&field_def.name).is_none()
        {
            issues.push(ValidationIssue::new(
                &format!("{path}.{}", field_def.name),
                "Missing required field",
            ));
        }
    }
}

fn check_value(
    value: &Value,
    schema: &ProtoSchema,
    field_def: &FieldDef,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match value {
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_value(item, schema, field_def, &format!("{path}[{i}]"), issues);
            }
        }
        Value::Map(_) if field_def.is_map() => {}
        Value::Map(_) => issues.push(ValidationIssue::new(
            path,
            "expected message, got map value",
        )),
        Value::Message(entry) if field_def.is_map() => {
            let key_type = field_def.key_type.as_deref().unwrap_or("string");
            let value_type = field_def.value_type.as_deref().unwrap_or("string");
            if let Some(k) = entry.find_field("key") {
                let key_def = map_part_def("key", key_type);
                check_value(&k.value, schema, &key_def, &format!("{path}.key"), issues);
            }
            if let Some(v) = entry.find_field("value") {
                let value_def = map_part_def("value", value_type);
                check_value(&v.value, schema, &value_def, &format!("{path}.value"), issues);
            }
        }
        Value::Message(m) => match schema.find_message(&field_def.type_name) {
            Some(nested) => check_message(m, schema, nested, path, issues),
            None => issues.push(ValidationIssue::new(
                path,
                format!("Unknown message type '{}'", field_def.type_name),
            )),
        },
        Value::Scalar(s) => check_scalar(s, schema, field_def, path, issues),
    }
}

fn map_part_def(name: &str, type_name: &str) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
        number: if name == "key" { 1 } else { 2 },
        label: None,
        key_type: None,
        value_type: None,
    }
}

fn check_scalar(
    scalar: &Scalar,
    schema: &ProtoSchema,
    field_def: &FieldDef,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let mismatch = |issues: &mut Vec<ValidationIssue>, expected: &str| {
        issues.push(ValidationIssue::new(
            path,
            format!(
                "expected {expected}, got {} value",
                scalar.variant_name()
            ),
        ));
    };

    match field_def.type_name.as_str() {
        "bool" => {
            if scalar.as_bool().is_none() {
                mismatch(issues, "bool");
            }
        }
        "string" => {
            if !matches!(scalar, Scalar::Str(_)) {
                mismatch(issues, "string");
            }
        }
        "bytes" => {
            if !matches!(scalar, Scalar::Bytes(_) | Scalar::Str(_)) {
                mismatch(issues, "bytes");
            }
        }
        "float" | "double" => {
            if scalar.to_f64().is_err() {
                mismatch(issues, "number");
            }
        }
        "int32" | "sint32" | "sfixed32" => check_int_range(scalar, i32::MIN as i64, i32::MAX as i64, path, issues),
        "int64" | "sint64" | "sfixed64" => {
            if scalar.to_i64().is_err() {
                issues.push(ValidationIssue::new(path, "value out of range for int64"));
            }
        }
        "uint32" | "fixed32" => check_uint_range(scalar, u32::MAX as u64, path, issues),
        "uint64" | "fixed64" => {
            if scalar.to_u64().is_err() {
                issues.push(ValidationIssue::new(path, "value out of range for uint64"));
            }
        }
        user_type => {
            if let Some(enum_def) = schema.find_enum(user_type) {
                match scalar {
                    Scalar::Str(name) if enum_def.number_of(name).is_some() => {}
                    Scalar::Str(name) => issues.push(ValidationIssue::new(
                        path,
                        format!("'{name}' is not a value of enum {user_type}"),
                    )),
                    other => {
                        if other.to_i64().is_err() {
                            mismatch(issues, "enum value");
                        }
                    }
                }
            } else if schema.find_message(user_type).is_some() {
                mismatch(issues, "message");
            } else {
                issues.push(ValidationIssue::new(
                    path,
                    format!("Unknown type '{user_type}'"),
                ));
            }
        }
    }
}

fn check_int_range(
    scalar: &Scalar,
    min: i64,
    max: i64,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match scalar.to_i64() {
        Ok(n) if n >= min && n <= max => {}
        Ok(n) => issues.push(ValidationIssue::new(
            path,
            format!("value {n} out of range [{min}, {max}]"),
        )),
        Err(_) => issues.push(ValidationIssue::new(
            path,
            format!("expected integer, got {} value", scalar.variant_name()),
        )),
    }
}

fn check_uint_range(scalar: &Scalar, max: u64, path: &str, issues: &mut Vec<ValidationIssue>) {
    match scalar.to_u64() {
        Ok(n) if n <= max => {}
        Ok(n) => issues.push(ValidationIssue::new(
            path,
            format!("value {n} out of range [0, {max}]"),
        )),
        Err(_) => issues.push(ValidationIssue::new(
            path,
            format!("expected unsigned integer, got {} value", scalar.variant_name()),
        )),
    }
}
