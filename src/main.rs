// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            name,
            uid,
            remarks,
            output,
            records,
            files,
            no_import,
            delete_on_receive,
        } => commands::cmd_build(
            &config,
            &name,
            uid,
            remarks,
            &output,
            records,
            &files,
            no_import,
            delete_on_receive,
        ),
        Commands::Extract {
            archive,
            root,
            ignore,
        } => commands::cmd_extract(&config, &archive, &root, &ignore),
        Commands::Inspect {
            archive,
            entries,
            json,
        } => commands::cmd_inspect(&archive, entries, json),
        Commands::Check { archive } => commands::cmd_check(&archive),
    }
}
