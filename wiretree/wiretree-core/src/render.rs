//! Rendering the generic tree to JSON and YAML.
//!
//! Repeated fields (duplicate names) collapse into a single array under the
//! shared key, and proto map entries collapse into one JSON object, so the
//! output looks like the document a user expects rather than a literal dump
//! of the field sequence.

use serde_json::{json, Map as JsonMap, Number, Value as Json};

use crate::value::{Message, Scalar, Value};

impl Scalar {
    pub fn to_json_value(&self) -> Json {
        match self {
            Scalar::Str(s) => Json::String(s.clone()),
            Scalar::Bytes(b) => Json::Array(b.iter().map(|v| Json::Number((*v).into())).collect()),
            Scalar::Int(n) => Json::Number((*n).into()),
            Scalar::UInt(n) => Json::Number((*n).into()),
            Scalar::Float(f) => Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or_else(|| json!(f.to_string())),
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Null => Json::Null,
        }
    }

    /// Key form for JSON objects (JSON keys must be strings).
    fn to_json_key(&self) -> String {
        match self {
            Scalar::Str(s) => s.clone(),
            Scalar::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Scalar::Int(n) => n.to_string(),
            Scalar::UInt(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Null => "null".to_string(),
        }
    }
}

impl Value {
    pub fn to_json_value(&self) -> Json {
        match self {
            Value::Scalar(s) => s.to_json_value(),
            Value::Message(m) => m.to_json_value(),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json_value).collect()),
            Value::Map(entries) => {
                let mut obj = JsonMap::new();
                for (k, v) in entries {
                    obj.insert(k.to_json_key(), v.to_json_value());
                }
                Json::Object(obj)
            }
        }
    }

    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_else(|_| "null".to_string())
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_json_value()).unwrap_or_else(|_| "null\n".to_string())
    }
}

impl Message {
    pub fn to_json_value(&self) -> Json {
        let mut obj = JsonMap::new();
        for name in self.field_names() {
            let fields = self.find_fields(name);
            let first = fields[0];

            if first.is_map {
                // Collapse `{key, value}` entry messages into one object.
                let mut map = JsonMap::new();
                for f in &fields {
                    match &f.value {
                        Value::Message(entry) => {
                            let key = entry
                                .find_field("key")
                                .map(|kf| json_key_of(&kf.value))
                                .unwrap_or_default();
                            let val = entry
                                .find_field("value")
                                .map(|vf| vf.value.to_json_value())
                                .unwrap_or(Json::Null);
                            map.insert(key, val);
                        }
                        Value::Map(entries) => {
                            for (k, v) in entries {
                                map.insert(k.to_json_key(), v.to_json_value());
                            }
                        }
                        other => {
                            map.insert(String::new(), other.to_json_value());
                        }
                    }
                }
                obj.insert(name.to_string(), Json::Object(map));
            } else if fields.len() == 1 {
                obj.insert(name.to_string(), first.value.to_json_value());
            } else {
                let items = fields.iter().map(|f| f.value.to_json_value()).collect();
                obj.insert(name.to_string(), Json::Array(items));
            }
        }
        Json::Object(obj)
    }

    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_json_value()).unwrap_or_else(|_| "{}\n".to_string())
    }
}

fn json_key_of(value: &Value) -> String {
    match value {
        Value::Scalar(s) => s.to_json_key(),
        other => other.to_json(),
    }
}
