// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Orion CLI

pub mod config;
pub mod db;
pub mod model;
pub mod network;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::model::ModelCommand;
pub use self::network::NetworkCommand;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Read a YAML or JSON document. JSON is valid YAML, so one parser covers both.
pub fn read_document(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
