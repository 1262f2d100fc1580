mod commands;
mod format;
mod loader;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    convert::ConvertArgs, parse::ParseArgs, schema::SchemaArgs, validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "wirecat", about = "Inspect, validate, and convert wire-format data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a data file and print it as json/yaml/textproto
    Parse(ParseArgs),
    /// Validate a data file against its schema
    Validate(ValidateArgs),
    /// Convert a data file to json/yaml/textproto/binpb
    Convert(ConvertArgs),
    /// Print a parsed schema
    Schema(SchemaArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Convert(args) => args.run(),
        Commands::Schema(args) => args.run(),
    }
}
