use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use wiretree::{serialize_binary, Value};

use crate::{
    commands::parse::render,
    format::{ConvertFormat, OutputFormat},
    loader::Schema,
    output::write_output,
};

#[derive(Args)]
pub struct ConvertArgs {
    /// Path to the data file
    pub input: PathBuf,

    /// Path to the schema (.proto, .capnp, or .fbs)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Target format
    #[arg(long = "to", value_enum)]
    pub to: ConvertFormat,

    /// Root message type (defaults to the schema's first/root type)
    #[arg(short = 't', long = "type")]
    pub message_type: Option<String>,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    pub fn run(self) -> Result<()> {
        let schema = Schema::load(&self.schema)?;
        let value = schema.parse_data(&self.input, self.message_type.as_deref())?;

        match self.to {
            ConvertFormat::Json => {
                let rendered = render(&value, OutputFormat::Json)?;
                write_output(self.output.as_deref(), rendered.as_bytes())
            }
            ConvertFormat::Yaml => {
                let rendered = render(&value, OutputFormat::Yaml)?;
                write_output(self.output.as_deref(), rendered.as_bytes())
            }
            ConvertFormat::Textproto => {
                let rendered = render(&value, OutputFormat::Textproto)?;
                write_output(self.output.as_deref(), rendered.as_bytes())
            }
            ConvertFormat::Binpb => {
                let Schema::Proto(proto) = &schema else {
                    bail!("binpb output requires a .proto schema");
                };
                let Value::Message(message) = &value else {
                    bail!("expected a message at the top level");
                };
                let type_name = match self.message_type.as_deref() {
                    Some(name) => name.to_string(),
                    None => proto
                        .first_message()
                        .context("schema defines no messages")?
                        .name
                        .clone(),
                };
                let bytes = serialize_binary(message, proto, &type_name)?;
                write_output(self.output.as_deref(), &bytes)
            }
        }
    }
}
