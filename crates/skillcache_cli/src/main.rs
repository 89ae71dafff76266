//! skc CLI
//!
//! Shell access to the skill result cache.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SharedCommands};
use crate::commands::{check, gc, get, invalidate, list, open_client, put, shared};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(found) => {
            if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs a command. `Ok(false)` means a miss or a stale entry.
fn run(cli: Cli) -> Result<bool> {
    let client = open_client(&cli)?;

    match &cli.command {
        Commands::Get { namespace, key } => get::run_get(&client, namespace, key),
        Commands::Put {
            namespace,
            key,
            payload,
            ttl,
            tracked,
        } => put::run_put(&client, namespace, key, payload.as_deref(), *ttl, tracked).map(|_| true),
        Commands::Check { namespace, key } => check::run_check(&client, namespace, key),
        Commands::Invalidate { namespace, key } => {
            invalidate::run_invalidate(&client, namespace, key.as_deref()).map(|_| true)
        }
        Commands::InvalidateFile { path, namespace } => {
            invalidate::run_invalidate_file(&client, path, namespace.as_deref()).map(|_| true)
        }
        Commands::List { namespace } => list::run_list(&client, namespace.as_deref()).map(|_| true),
        Commands::Shared { command } => match command {
            SharedCommands::Get { name } => shared::run_shared_get(&client, name),
            SharedCommands::Resolve { name } => shared::run_shared_resolve(&client, name).map(|_| true),
        },
        Commands::Gc {
            dry_run,
            stale,
            known_producers,
        } => gc::run_gc(&client, *dry_run, *stale, known_producers).map(|_| true),
    }
}
