// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure domain types and ports for the agent platform. No I/O happens here;
//! every collaborator (persistence, secret cipher, dataset execution, chat
//! models) is expressed as a trait implemented in
//! [`crate::infrastructure`].
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`model`] | `AiModel`, `ModelConnector`, `ConnectionTestResult` |
//! | [`llm`] | `ChatModel`, `ChatMessage`, `ChatRequest` |
//! | [`tool`] | `AgentTool`, `ToolAdapter`, `CallableTool` |
//! | [`agent`] | `Agent`, `AgentConfig`, `ToolPolicy` |
//! | [`network`] | `AgentNetwork`, `NetworkSpec`, `NetworkValidator`, `NetworkRuntime` |
//! | [`chat`] | `Chatbot`, `ChatThread`, `ChatMessageRecord` |
//! | [`dataset`] | `DatasetGateway`, `SqlSelectSpec`, `VectorQuerySpec` |
//! | [`repository`] | repository traits and `RepositoryError` |

/// Declares a UUID-backed identifier newtype with the usual constructors.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub mod error;
pub mod tenant;
pub mod redaction;
pub mod secrets;
pub mod llm;
pub mod model;
pub mod dataset;
pub mod tool;
pub mod agent;
pub mod network;
pub mod chat;
pub mod repository;
pub mod platform_config;

pub use error::{Classified, ErrorKind};
pub use tenant::{Principal, TenantId, UserId};
