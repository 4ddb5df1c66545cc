// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `orion-swarm`: Handoff-Driven Multi-Agent Runtime
//!
//! Executes `swarm` agent networks. Every node is an agent; agents pass
//! control to each other by calling `transfer_to_<node>` tools until one of
//! them answers without handing off.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SwarmTopology`, handoff texts, output extraction |
//! | [`application`] | Application | `SwarmRuntime`, `HandoffTool` |
//!
//! Register the runtime on a platform with
//! `PlatformBuilder::runtime(NetworkType::Swarm, SwarmRuntime::factory())`.

pub mod domain;
pub mod application;

pub use application::{HandoffTool, SwarmRuntime};
pub use domain::*;
