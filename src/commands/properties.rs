use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::cli::PropertiesArgs;
use crate::config::load_config;

pub fn run(args: PropertiesArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let client = super::search_console_client(Path::new(&config.auth.token_path))?;

    info!(config = %args.config.display(), "listing properties");
    let properties = client.list_properties()?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    if properties.is_empty() {
        writeln!(output, "No verified properties found.")?;
    } else {
        writeln!(output, "Available GSC Properties:")?;
        for (index, property) in properties.iter().enumerate() {
            writeln!(output, "  {}. {property}", index + 1)?;
        }
    }
    output.flush()?;

    Ok(())
}
