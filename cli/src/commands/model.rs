// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AI model connector commands
//!
//! Commands: types, probe

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use orion_core::domain::platform_config::{ConnectorsConfig, PlatformConfig};
use orion_core::infrastructure::bootstrap::builtin_connectors;

use super::read_document;

#[derive(Subcommand)]
pub enum ModelCommand {
    /// List the registered connector types
    Types {
        /// Print the full metadata, including the config schema, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a connector configuration and test the connection
    Probe {
        /// Connector type slug, e.g. llm.openai
        #[arg(long = "type", value_name = "SLUG")]
        model_type: String,

        /// YAML or JSON file with the connector configuration
        #[arg(long, value_name = "FILE")]
        config: PathBuf,

        /// Allow a minimal billable inference call
        #[arg(long)]
        smoke: bool,

        /// Probe timeout in seconds (capped by the platform configuration)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

pub async fn handle_command(command: ModelCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ModelCommand::Types { json } => types(json),
        ModelCommand::Probe {
            model_type,
            config,
            smoke,
            timeout,
        } => {
            let platform = PlatformConfig::load_or_default(config_override).context("Failed to load configuration")?;
            probe(&model_type, config, smoke, probe_timeout(&platform.spec.connectors, timeout)).await
        }
    }
}

fn types(json: bool) -> Result<()> {
    let connectors = builtin_connectors();
    if json {
        let metadata: Vec<_> = connectors.list().into_iter().map(|(_, c)| c.metadata().clone()).collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("{}", "Connector types:".bold());
    for (_, connector) in connectors.list() {
        let meta = connector.metadata();
        println!(
            "  {} ({}) - {} v{}",
            meta.type_slug.bold(),
            meta.category,
            meta.display_name,
            meta.version
        );
    }
    Ok(())
}

async fn probe(model_type: &str, config_path: PathBuf, smoke: bool, timeout: Duration) -> Result<()> {
    let connectors = builtin_connectors();
    let Some(connector) = connectors.get(model_type, None) else {
        bail!("Unknown model type '{}'. Run `orion model types` for the list.", model_type);
    };

    let config = read_document(&config_path)?;
    connector.validate_config(&config).context("Invalid connector configuration")?;
    debug!(config = %connector.redact_config(&config), "Probing connector");

    println!("Testing {} connection...", model_type);
    let result = connector.test_connection(&config, timeout, smoke).await;
    if result.is_ok() {
        println!(
            "{}",
            format!("✓ Connection OK ({} ms{})", result.latency_ms, if result.billable { ", billable" } else { "" })
                .green()
        );
        Ok(())
    } else {
        bail!(
            "Connection failed after {} ms: {}",
            result.latency_ms,
            result.error().unwrap_or("unknown error")
        )
    }
}

fn probe_timeout(limits: &ConnectorsConfig, requested: Option<u64>) -> Duration {
    let max = limits.max_probe_timeout_s.max(1);
    Duration::from_secs(requested.unwrap_or(limits.probe_timeout_s).clamp(1, max))
}
