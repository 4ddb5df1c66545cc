// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ModelRepository` | `AiModel` | `InMemoryModelRepository`, `PostgresModelRepository` |
//! | `ToolRepository` | `AgentTool` | `InMemoryToolRepository`, `PostgresToolRepository` |
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//! | `NetworkRepository` | `AgentNetwork` (+ node/edge/interface rows) | `InMemoryNetworkRepository`, `PostgresNetworkRepository` |
//! | `ChatbotRepository` | `Chatbot` | `InMemoryChatbotRepository`, `PostgresChatbotRepository` |
//! | `ThreadRepository` | `ChatThread` | `InMemoryThreadRepository`, `PostgresThreadRepository` |
//! | `MessageRepository` | `ChatMessageRecord` | `InMemoryMessageRepository`, `PostgresMessageRepository` |
//!
//! ## Common rules
//!
//! - Every read is scoped by tenant and excludes soft-deleted rows. A row
//!   owned by another tenant is reported as absent.
//! - `insert`/`update` return [`RepositoryError::Conflict`] when a uniqueness
//!   constraint among non-deleted rows would be violated.
//! - Soft delete is an `update` that sets `deleted_at`.

use async_trait::async_trait;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{ChatMessageRecord, ChatThread, Chatbot, ChatbotId, ThreadId, ThreadStatus};
use crate::domain::model::{AiModel, ModelCategory, ModelId};
use crate::domain::network::{AgentNetwork, NetworkGraph, NetworkId, NetworkStatus, NetworkType};
use crate::domain::tenant::{TenantId, UserId};
use crate::domain::tool::{AgentTool, ToolId};

/// Limit/offset window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Clamp the limit into `[1, max]`.
    pub fn clamped(self, max: usize) -> Self {
        Self {
            limit: self.limit.clamp(1, max.max(1)),
            offset: self.offset,
        }
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items.iter().skip(self.offset).take(self.limit).cloned().collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub model_type: Option<String>,
    pub category: Option<ModelCategory>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub kind: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub agent_type: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkFilter {
    pub network_type: Option<NetworkType>,
    pub status: Option<NetworkStatus>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ChatbotFilter {
    pub enabled: Option<bool>,
}

#[async_trait]
pub trait ModelRepository: Send + Sync {
    async fn insert(&self, model: &AiModel) -> Result<(), RepositoryError>;

    async fn update(&self, model: &AiModel) -> Result<(), RepositoryError>;

    async fn find(&self, tenant: &TenantId, id: ModelId) -> Result<Option<AiModel>, RepositoryError>;

    async fn list(&self, tenant: &TenantId, filter: &ModelFilter, page: Page) -> Result<(Vec<AiModel>, usize), RepositoryError>;
}

#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn insert(&self, tool: &AgentTool) -> Result<(), RepositoryError>;

    async fn update(&self, tool: &AgentTool) -> Result<(), RepositoryError>;

    async fn find(&self, tenant: &TenantId, id: ToolId) -> Result<Option<AgentTool>, RepositoryError>;

    async fn list(&self, tenant: &TenantId, filter: &ToolFilter, page: Page) -> Result<(Vec<AgentTool>, usize), RepositoryError>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn find(&self, tenant: &TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError>;

    async fn list(&self, tenant: &TenantId, filter: &AgentFilter, page: Page) -> Result<(Vec<Agent>, usize), RepositoryError>;
}

#[async_trait]
pub trait NetworkRepository: Send + Sync {
    /// Insert the network together with its denormalized graph rows.
    async fn insert(&self, network: &AgentNetwork, graph: &NetworkGraph) -> Result<(), RepositoryError>;

    /// Update the header; when `graph` is given the node/edge/interface rows
    /// are replaced.
    async fn update(&self, network: &AgentNetwork, graph: Option<&NetworkGraph>) -> Result<(), RepositoryError>;

    async fn find(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<AgentNetwork>, RepositoryError>;

    async fn list(&self, tenant: &TenantId, filter: &NetworkFilter, page: Page) -> Result<(Vec<AgentNetwork>, usize), RepositoryError>;

    /// Node rows of a non-deleted network.
    async fn graph(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<NetworkGraph>, RepositoryError>;

    /// Whether a live network has a node pointing at `agent`.
    async fn is_agent_referenced(&self, tenant: &TenantId, agent: AgentId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ChatbotRepository: Send + Sync {
    async fn insert(&self, chatbot: &Chatbot) -> Result<(), RepositoryError>;

    async fn update(&self, chatbot: &Chatbot) -> Result<(), RepositoryError>;

    async fn find(&self, tenant: &TenantId, id: ChatbotId) -> Result<Option<Chatbot>, RepositoryError>;

    async fn list(&self, tenant: &TenantId, filter: &ChatbotFilter, page: Page) -> Result<(Vec<Chatbot>, usize), RepositoryError>;

    /// Whether a live chatbot is bound to `network`.
    async fn is_network_referenced(&self, tenant: &TenantId, network: NetworkId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn insert(&self, thread: &ChatThread) -> Result<(), RepositoryError>;

    async fn update(&self, thread: &ChatThread) -> Result<(), RepositoryError>;

    /// Non-deleted thread of `chatbot` owned by `user`.
    async fn find(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        id: ThreadId,
    ) -> Result<Option<ChatThread>, RepositoryError>;

    async fn list(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        status: Option<ThreadStatus>,
        page: Page,
    ) -> Result<(Vec<ChatThread>, usize), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &ChatMessageRecord) -> Result<(), RepositoryError>;

    /// Messages of a thread in creation order.
    async fn list(&self, tenant: &TenantId, thread: ThreadId, page: Page) -> Result<(Vec<ChatMessageRecord>, usize), RepositoryError>;

    /// The newest `limit` messages, returned oldest first.
    async fn recent(&self, tenant: &TenantId, thread: ThreadId, limit: usize) -> Result<Vec<ChatMessageRecord>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
