// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent network spec commands
//!
//! `lint` runs every check that does not need a database: node keys, edge
//! endpoints, acyclicity and the swarm settings. References to agents and
//! child networks are only resolved when the network is saved.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;

use orion_core::domain::network::{check_header, NetworkError, NetworkSpec, NetworkType, NetworkValidator};
use orion_swarm::SwarmTopology;

use super::read_document;

#[derive(Subcommand)]
pub enum NetworkCommand {
    /// Check a network spec (YAML or JSON) without saving it
    Lint {
        /// A bare spec, or a network document with `name`, `slug`, `version` and `spec`
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn handle_command(command: NetworkCommand) -> Result<()> {
    match command {
        NetworkCommand::Lint { file } => {
            let document = read_document(&file)?;
            let report = lint(&document).with_context(|| format!("{} is not a valid network", file.display()))?;
            print_report(&report);
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct LintReport {
    pub network_type: NetworkType,
    pub nodes: usize,
    pub edges: usize,
    /// Swarm only: the starting node and each node's handoff targets.
    pub swarm: Option<(String, Vec<(String, Vec<String>)>)>,
}

pub fn lint(document: &Value) -> Result<LintReport, NetworkError> {
    let spec_value = match document.get("spec") {
        Some(spec) => {
            let field = |key: &str| document.get(key).and_then(Value::as_str).unwrap_or_default();
            check_header(field("name"), field("slug"), field("version"))?;
            spec
        }
        None => document,
    };

    let spec = NetworkSpec::from_value(spec_value)?;
    if let Some(declared) = document.get("type").filter(|_| document.get("spec").is_some()) {
        if declared.as_str() != Some(spec.network_type.as_str()) {
            return Err(NetworkError::Invalid(format!(
                "Network type {} does not match spec type '{}'",
                declared, spec.network_type
            )));
        }
    }
    NetworkValidator::validate_structure(&spec)?;

    let swarm = if spec.network_type == NetworkType::Swarm {
        let topology = SwarmTopology::from_spec(&spec)?;
        let routes = topology
            .nodes()
            .iter()
            .map(|node| (node.clone(), topology.destinations(node).to_vec()))
            .collect();
        Some((topology.default_active().to_string(), routes))
    } else {
        None
    };

    Ok(LintReport {
        network_type: spec.network_type,
        nodes: spec.nodes.len(),
        edges: spec.edges.len(),
        swarm,
    })
}

fn print_report(report: &LintReport) {
    println!("{}", "✓ Network spec is valid".green());
    println!("  Type: {}", report.network_type);
    println!("  Nodes: {}", report.nodes);
    println!("  Edges: {}", report.edges);
    if let Some((start, routes)) = &report.swarm {
        println!("  Default active agent: {}", start.bold());
        for (node, targets) in routes {
            if targets.is_empty() {
                println!("    {} -> {}", node, "(no handoffs)".dimmed());
            } else {
                println!("    {} -> {}", node, targets.join(", "));
            }
        }
    }
}
