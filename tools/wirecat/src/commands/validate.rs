use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use wiretree::{validate_message, Value};

use crate::loader::Schema;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the data file
    pub input: PathBuf,

    /// Path to the schema (.proto)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Message type to validate against (defaults to the first message)
    #[arg(short = 't', long = "type")]
    pub message_type: Option<String>,
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let schema = Schema::load(&self.schema)?;
        let Schema::Proto(proto) = &schema else {
            bail!("validate currently supports .proto schemas only");
        };

        let value = schema.parse_data(&self.input, self.message_type.as_deref())?;
        let Value::Message(message) = &value else {
            bail!("expected a message at the top level");
        };

        let def = match self.message_type.as_deref() {
            Some(name) => proto
                .find_message(name)
                .with_context(|| format!("message type '{name}' not found in schema"))?,
            None => proto.first_message().context("schema defines no messages")?,
        };

        let issues = validate_message(message, proto, def);
        if issues.is_empty() {
            println!("{} is valid", self.input.display());
            return Ok(());
        }
        for issue in &issues {
            eprintln!("{issue}");
        }
        bail!("{} validation issue(s) found", issues.len());
    }
}
