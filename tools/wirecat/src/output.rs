use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;

/// Write the rendered output to the given file, or stdout when absent.
pub fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, bytes)?;
            eprintln!("Written to {}", path.display());
        }
        None => {
            io::stdout().lock().write_all(bytes)?;
        }
    }
    Ok(())
}
