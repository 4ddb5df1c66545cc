// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Database commands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use orion_core::domain::platform_config::PlatformConfig;
use orion_core::infrastructure::db::Database;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate,
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate => {
            let config = PlatformConfig::load_or_default(config_override).context("Failed to load configuration")?;
            let db = Database::from_config(&config.spec.database)
                .await?
                .context("No database configured; set spec.database.url or DATABASE_URL")?;
            db.migrate().await?;
            println!("{}", "✓ Migrations applied".green());
            Ok(())
        }
    }
}
