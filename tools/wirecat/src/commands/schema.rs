use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use wiretree::{CapnpSchema, FbsSchema, ProtoSchema};

use crate::{format::SchemaFormat, loader::Schema, output::write_output};

#[derive(Args)]
pub struct SchemaArgs {
    /// Path to the schema file (.proto, .capnp, or .fbs)
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = SchemaFormat::Text)]
    pub format: SchemaFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SchemaArgs {
    pub fn run(self) -> Result<()> {
        let schema = Schema::load(&self.input)?;
        let rendered = match self.format {
            SchemaFormat::Text => text_summary(&schema),
            SchemaFormat::Json => {
                let mut s = match &schema {
                    Schema::Proto(s) => serde_json::to_string_pretty(s)?,
                    Schema::Capnp(s) => serde_json::to_string_pretty(s)?,
                    Schema::Fbs(s) => serde_json::to_string_pretty(s)?,
                };
                s.push('\n');
                s
            }
            SchemaFormat::Yaml => match &schema {
                Schema::Proto(s) => serde_yaml::to_string(s)?,
                Schema::Capnp(s) => serde_yaml::to_string(s)?,
                Schema::Fbs(s) => serde_yaml::to_string(s)?,
            },
        };
        write_output(self.output.as_deref(), rendered.as_bytes())
    }
}

fn text_summary(schema: &Schema) -> String {
    match schema {
        Schema::Proto(s) => proto_summary(s),
        Schema::Capnp(s) => capnp_summary(s),
        Schema::Fbs(s) => fbs_summary(s),
    }
}

fn proto_summary(schema: &ProtoSchema) -> String {
    let mut out = String::new();
    if let Some(package) = &schema.package {
        let _ = writeln!(out, "package {package}");
    }
    for m in &schema.messages {
        let _ = writeln!(out, "message {} ({} fields)", m.name, m.fields.len());
        for f in &m.fields {
            let label = match f.label {
                Some(l) => format!("{l:?} ").to_lowercase(),
                None => String::new(),
            };
            let _ = writeln!(out, "  {label}{} {} = {}", f.type_name, f.name, f.number);
        }
    }
    for e in &schema.enums {
        let _ = writeln!(out, "enum {} ({} values)", e.name, e.values.len());
        for (name, number) in &e.values {
            let _ = writeln!(out, "  {name} = {number}");
        }
    }
    out
}

fn capnp_summary(schema: &CapnpSchema) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "file id {}", schema.file_id);
    for s in &schema.structs {
        let _ = writeln!(out, "struct {} ({} fields)", s.name, s.fields.len());
        for f in &s.fields {
            let _ = writeln!(out, "  {} @{} :{:?}", f.name, f.ordinal, f.ty);
        }
    }
    for e in &schema.enums {
        let _ = writeln!(out, "enum {} ({} values)", e.name, e.enumerants.len());
    }
    for i in &schema.interfaces {
        let _ = writeln!(out, "interface {} ({} methods)", i.name, i.methods.len());
    }
    out
}

fn fbs_summary(schema: &FbsSchema) -> String {
    let mut out = String::new();
    if let Some(namespace) = &schema.namespace {
        let _ = writeln!(out, "namespace {namespace}");
    }
    if let Some(root) = &schema.root_type {
        let _ = writeln!(out, "root_type {root}");
    }
    for t in &schema.tables {
        let _ = writeln!(out, "table {} ({} fields)", t.name, t.fields.len());
        for f in &t.fields {
            let _ = writeln!(out, "  {}: {:?}", f.name, f.ty);
        }
    }
    for s in &schema.structs {
        let _ = writeln!(out, "struct {} ({} fields)", s.name, s.fields.len());
    }
    for e in &schema.enums {
        let _ = writeln!(out, "enum {} ({} values)", e.name, e.values.len());
    }
    for u in &schema.unions {
        let _ = writeln!(out, "union {} ({} members)", u.name, u.members.len());
    }
    out
}
