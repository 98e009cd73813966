mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use devworker::address::{self, HostEnvironment};
use devworker::app::DefaultApplication;
use devworker::config::Config;
use devworker::link::ParentLink;
use devworker::{fault, observability, runtime};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    observability::init(&config.logging);
    fault::install();

    match cli.command {
        Commands::Run(args) => {
            let app = Arc::new(DefaultApplication::new()?);
            runtime::run(&config, args.worker_id, app, ParentLink::stdio()).await?;
            // The stdin reader cannot be cancelled; leave without waiting on it.
            std::process::exit(0);
        }
        Commands::Resolve(args) => {
            let host = HostEnvironment::detect(&config.channel, args.worker_id);
            let descriptor = address::resolve(&host);
            println!("{}", serde_json::to_string(&descriptor)?);
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
