use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devworker")]
#[command(about = "Development server worker supervised by a parent process", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $DEVWORKER_CONFIG or config/devworker.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bind, announce the address on stdout and serve until told to stop
    Run(RunArgs),
    /// Print the address this worker would listen on, as JSON
    Resolve(ResolveArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Identifier distinguishing workers of the same parent
    #[arg(long, default_value_t = 1)]
    pub worker_id: u32,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    #[arg(long, default_value_t = 1)]
    pub worker_id: u32,
}
