//! Dataspace CLI: the `dataspace` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Put {
            store,
            entries,
            creator,
            schema_id,
            state,
            json,
        } => commands::put::run(commands::put::Args {
            store,
            entries,
            creator,
            schema_id,
            state,
            json,
        }),

        Commands::Get { store, key, full } => commands::get::run(store, key, full),

        Commands::Inspect { store, json } => commands::inspect::run(store, json),

        Commands::Duplicate { store, json } => commands::duplicate::run(store, json),

        Commands::Expire { store, at, json } => commands::expire::run(store, at, json),

        Commands::Publish {
            store,
            config,
            dry_run,
        } => commands::publish::run(store, config, dry_run),

        Commands::ConfigTemplate { name } => commands::config::run_template(name),

        Commands::ConfigInfo { name } => commands::config::run_info(name),
    }
}
