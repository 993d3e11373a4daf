use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gsc-audit",
    version,
    about = "Search Console audit automation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Audit(AuditArgs),
    Properties(PropertiesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    #[arg(long, default_value = "audit.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub property: Option<String>,

    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PropertiesArgs {
    #[arg(long, default_value = "audit.toml")]
    pub config: PathBuf,
}
