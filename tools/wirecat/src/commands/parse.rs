use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use wiretree::{to_textproto, Value};

use crate::{format::OutputFormat, loader::Schema, output::write_output};

#[derive(Args)]
pub struct ParseArgs {
    /// Path to the data file
    pub input: PathBuf,

    /// Path to the schema (.proto, .capnp, or .fbs)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Root message type (defaults to the schema's first/root type)
    #[arg(short = 't', long = "type")]
    pub message_type: Option<String>,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl ParseArgs {
    pub fn run(self) -> Result<()> {
        let schema = Schema::load(&self.schema)?;
        let value = schema.parse_data(&self.input, self.message_type.as_deref())?;
        let rendered = render(&value, self.format)?;
        write_output(self.output.as_deref(), rendered.as_bytes())
    }
}

pub fn render(value: &Value, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            let mut s = value.to_json_pretty();
            s.push('\n');
            s
        }
        OutputFormat::Yaml => value.to_yaml(),
        OutputFormat::Textproto => match value {
            Value::Message(m) => to_textproto(m),
            other => bail!("cannot render {} as textproto", other.variant_name()),
        },
    })
}
