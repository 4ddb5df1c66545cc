// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Orion CLI
//!
//! The `orion` binary carries the operator tooling that does not need a
//! running platform:
//!
//! - `orion config show|validate|generate` - Configuration management
//! - `orion network lint <FILE>` - Structural checks of a network spec
//! - `orion model types|probe` - Connector catalog and connection probes
//! - `orion db migrate` - Apply the PostgreSQL schema

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use orion_cli::commands::{self, ConfigCommand, DbCommand, ModelCommand, NetworkCommand};

/// Orion platform tools
#[derive(Parser)]
#[command(name = "orion")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "ORION_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ORION_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Agent network specs
    #[command(name = "network")]
    Network {
        #[command(subcommand)]
        command: NetworkCommand,
    },

    /// AI model connectors
    #[command(name = "model")]
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Database maintenance
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Network { command }) => commands::network::handle_command(command).await,
        Some(Commands::Model { command }) => commands::model::handle_command(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
