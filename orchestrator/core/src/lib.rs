// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orion Core
//!
//! Tenant-scoped AI models, tools, agents and agent networks, plus the chat
//! threads that drive them.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services and infrastructure
//!   adapters of the agent platform
//!
//! Start from [`application::PlatformBuilder`]: it assembles every service
//! from a set of repositories, the connector and tool adapter registries, a
//! dataset gateway and a secret cipher.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
