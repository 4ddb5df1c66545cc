// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod registry;
pub mod connectors;
pub mod tools;
pub mod repositories;
pub mod db;
pub mod secrets;
pub mod datasets;
pub mod bootstrap;

pub use registry::{ConnectorRegistry, Registry, RegistryKey, RuntimeRegistry, ToolAdapterRegistry};
