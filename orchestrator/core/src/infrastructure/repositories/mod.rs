// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! `postgres::*` keep each aggregate as a JSONB document next to the columns
//! that carry uniqueness, tenancy and soft-delete state. Network graphs are
//! additionally denormalized into node, edge and interface tables.
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests and local runs, with the same
//! uniqueness and soft-delete semantics as the database schema.

pub mod postgres;

pub use postgres::{
    PostgresAgentRepository, PostgresChatbotRepository, PostgresMessageRepository, PostgresModelRepository,
    PostgresNetworkRepository, PostgresThreadRepository, PostgresToolRepository,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{ChatMessageRecord, ChatThread, Chatbot, ChatbotId, ThreadId, ThreadStatus};
use crate::domain::model::{AiModel, ModelId};
use crate::domain::network::{AgentNetwork, NetworkGraph, NetworkId};
use crate::domain::repository::{
    AgentFilter, AgentRepository, ChatbotFilter, ChatbotRepository, MessageRepository, ModelFilter,
    ModelRepository, NetworkFilter, NetworkRepository, Page, RepositoryError, ThreadRepository, ToolFilter,
    ToolRepository,
};
use crate::domain::tenant::{TenantId, UserId};
use crate::domain::tool::{AgentTool, ToolId};

pub const AGENT_NAME_CONFLICT: &str = "An agent with this name already exists in the tenant";
pub const TOOL_NAME_CONFLICT: &str = "An agent tool with this name already exists in the tenant";
pub const MODEL_NAME_CONFLICT: &str = "An AI model with this name already exists in the tenant";
pub const NETWORK_VERSION_CONFLICT: &str = "A network with this slug and version already exists in the tenant";
pub const CHATBOT_CONFLICT: &str = "A chatbot with this name or slug already exists in the tenant";

/// Row shape shared by every in-memory table.
trait Record: Clone + Send + Sync {
    type Id: Copy + PartialEq + Send + Sync;

    fn id(&self) -> Self::Id;

    fn tenant(&self) -> &TenantId;

    fn is_deleted(&self) -> bool;

    /// Values that must be unique among the tenant's live rows.
    fn unique_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn conflict_message() -> &'static str {
        "Duplicate record"
    }
}

struct Table<T: Record> {
    rows: RwLock<Vec<T>>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Record> Table<T> {
    fn check_unique(rows: &[T], candidate: &T) -> Result<(), RepositoryError> {
        if candidate.is_deleted() {
            return Ok(());
        }
        let keys = candidate.unique_keys();
        let clash = rows.iter().any(|row| {
            row.id() != candidate.id()
                && !row.is_deleted()
                && row.tenant() == candidate.tenant()
                && row.unique_keys().iter().any(|k| keys.contains(k))
        });
        if clash {
            Err(RepositoryError::Conflict(T::conflict_message().to_string()))
        } else {
            Ok(())
        }
    }

    fn insert(&self, record: &T) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write();
        if rows.iter().any(|r| r.id() == record.id()) {
            return Err(RepositoryError::Conflict(T::conflict_message().to_string()));
        }
        Self::check_unique(&rows, record)?;
        rows.push(record.clone());
        Ok(())
    }

    fn update(&self, record: &T) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write();
        Self::check_unique(&rows, record)?;
        let slot = rows
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| RepositoryError::NotFound("record".to_string()))?;
        *slot = record.clone();
        Ok(())
    }

    fn find(&self, tenant: &TenantId, id: T::Id) -> Option<T> {
        self.rows
            .read()
            .iter()
            .find(|r| r.id() == id && r.tenant() == tenant && !r.is_deleted())
            .cloned()
    }

    /// Live rows of `tenant` matching `keep`, in insertion order.
    fn select(&self, tenant: &TenantId, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .iter()
            .filter(|r| r.tenant() == tenant && !r.is_deleted() && keep(r))
            .cloned()
            .collect()
    }

    fn page(&self, tenant: &TenantId, page: Page, keep: impl Fn(&T) -> bool) -> (Vec<T>, usize) {
        let all = self.select(tenant, keep);
        let total = all.len();
        (page.slice(&all), total)
    }
}

fn name_key(name: &str) -> String {
    format!("name:{}", name)
}

impl Record for AiModel {
    type Id = ModelId;

    fn id(&self) -> ModelId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![name_key(&self.name)]
    }

    fn conflict_message() -> &'static str {
        MODEL_NAME_CONFLICT
    }
}

impl Record for AgentTool {
    type Id = ToolId;

    fn id(&self) -> ToolId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![name_key(&self.name)]
    }

    fn conflict_message() -> &'static str {
        TOOL_NAME_CONFLICT
    }
}

impl Record for Agent {
    type Id = AgentId;

    fn id(&self) -> AgentId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![name_key(&self.name)]
    }

    fn conflict_message() -> &'static str {
        AGENT_NAME_CONFLICT
    }
}

impl Record for AgentNetwork {
    type Id = NetworkId;

    fn id(&self) -> NetworkId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("slug:{}@{}", self.slug, self.version)]
    }

    fn conflict_message() -> &'static str {
        NETWORK_VERSION_CONFLICT
    }
}

impl Record for Chatbot {
    type Id = ChatbotId;

    fn id(&self) -> ChatbotId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![name_key(&self.name), format!("slug:{}", self.slug)]
    }

    fn conflict_message() -> &'static str {
        CHATBOT_CONFLICT
    }
}

impl Record for ChatThread {
    type Id = ThreadId;

    fn id(&self) -> ThreadId {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || self.status == ThreadStatus::Deleted
    }
}

impl Record for ChatMessageRecord {
    type Id = crate::domain::chat::MessageId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        false
    }
}

#[derive(Clone, Default)]
pub struct InMemoryModelRepository {
    table: Arc<Table<AiModel>>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn insert(&self, model: &AiModel) -> Result<(), RepositoryError> {
        self.table.insert(model)
    }

    async fn update(&self, model: &AiModel) -> Result<(), RepositoryError> {
        self.table.update(model)
    }

    async fn find(&self, tenant: &TenantId, id: ModelId) -> Result<Option<AiModel>, RepositoryError> {
        Ok(self.table.find(tenant, id))
    }

    async fn list(&self, tenant: &TenantId, filter: &ModelFilter, page: Page) -> Result<(Vec<AiModel>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |m| {
            filter.model_type.as_ref().is_none_or(|t| &m.model_type == t)
                && filter.category.is_none_or(|c| m.category == c)
                && filter.enabled.is_none_or(|e| m.is_enabled == e)
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryToolRepository {
    table: Arc<Table<AgentTool>>,
}

impl InMemoryToolRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolRepository for InMemoryToolRepository {
    async fn insert(&self, tool: &AgentTool) -> Result<(), RepositoryError> {
        self.table.insert(tool)
    }

    async fn update(&self, tool: &AgentTool) -> Result<(), RepositoryError> {
        self.table.update(tool)
    }

    async fn find(&self, tenant: &TenantId, id: ToolId) -> Result<Option<AgentTool>, RepositoryError> {
        Ok(self.table.find(tenant, id))
    }

    async fn list(&self, tenant: &TenantId, filter: &ToolFilter, page: Page) -> Result<(Vec<AgentTool>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |t| {
            filter.kind.as_ref().is_none_or(|k| &t.kind == k) && filter.enabled.is_none_or(|e| t.is_enabled == e)
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    table: Arc<Table<Agent>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.table.insert(agent)
    }

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.table.update(agent)
    }

    async fn find(&self, tenant: &TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.table.find(tenant, id))
    }

    async fn list(&self, tenant: &TenantId, filter: &AgentFilter, page: Page) -> Result<(Vec<Agent>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |a| {
            filter.agent_type.as_ref().is_none_or(|t| &a.agent_type == t)
                && filter.enabled.is_none_or(|e| a.is_enabled == e)
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNetworkRepository {
    table: Arc<Table<AgentNetwork>>,
    graphs: Arc<RwLock<HashMap<NetworkId, NetworkGraph>>>,
}

impl InMemoryNetworkRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkRepository for InMemoryNetworkRepository {
    async fn insert(&self, network: &AgentNetwork, graph: &NetworkGraph) -> Result<(), RepositoryError> {
        self.table.insert(network)?;
        self.graphs.write().insert(network.id, graph.clone());
        Ok(())
    }

    async fn update(&self, network: &AgentNetwork, graph: Option<&NetworkGraph>) -> Result<(), RepositoryError> {
        self.table.update(network)?;
        if let Some(graph) = graph {
            self.graphs.write().insert(network.id, graph.clone());
        }
        Ok(())
    }

    async fn find(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<AgentNetwork>, RepositoryError> {
        Ok(self.table.find(tenant, id))
    }

    async fn list(&self, tenant: &TenantId, filter: &NetworkFilter, page: Page) -> Result<(Vec<AgentNetwork>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |n| {
            filter.network_type.is_none_or(|t| n.network_type == t)
                && filter.status.is_none_or(|s| n.status == s)
                && filter.enabled.is_none_or(|e| n.is_enabled == e)
        }))
    }

    async fn graph(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<NetworkGraph>, RepositoryError> {
        if self.table.find(tenant, id).is_none() {
            return Ok(None);
        }
        Ok(self.graphs.read().get(&id).cloned())
    }

    async fn is_agent_referenced(&self, tenant: &TenantId, agent: AgentId) -> Result<bool, RepositoryError> {
        let live: Vec<NetworkId> = self.table.select(tenant, |_| true).iter().map(|n| n.id).collect();
        let graphs = self.graphs.read();
        Ok(live.iter().any(|id| {
            graphs
                .get(id)
                .is_some_and(|g| g.nodes.iter().any(|n| n.agent_id == Some(agent)))
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChatbotRepository {
    table: Arc<Table<Chatbot>>,
}

impl InMemoryChatbotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatbotRepository for InMemoryChatbotRepository {
    async fn insert(&self, chatbot: &Chatbot) -> Result<(), RepositoryError> {
        self.table.insert(chatbot)
    }

    async fn update(&self, chatbot: &Chatbot) -> Result<(), RepositoryError> {
        self.table.update(chatbot)
    }

    async fn find(&self, tenant: &TenantId, id: ChatbotId) -> Result<Option<Chatbot>, RepositoryError> {
        Ok(self.table.find(tenant, id))
    }

    async fn list(&self, tenant: &TenantId, filter: &ChatbotFilter, page: Page) -> Result<(Vec<Chatbot>, usize), RepositoryError> {
        Ok(self
            .table
            .page(tenant, page, |c| filter.enabled.is_none_or(|e| c.is_enabled == e)))
    }

    async fn is_network_referenced(&self, tenant: &TenantId, network: NetworkId) -> Result<bool, RepositoryError> {
        Ok(!self.table.select(tenant, |c| c.agent_network_id == network).is_empty())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryThreadRepository {
    table: Arc<Table<ChatThread>>,
}

impl InMemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn insert(&self, thread: &ChatThread) -> Result<(), RepositoryError> {
        self.table.insert(thread)
    }

    async fn update(&self, thread: &ChatThread) -> Result<(), RepositoryError> {
        self.table.update(thread)
    }

    async fn find(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        id: ThreadId,
    ) -> Result<Option<ChatThread>, RepositoryError> {
        Ok(self
            .table
            .find(tenant, id)
            .filter(|t| t.chatbot_id == chatbot && &t.user_id == user))
    }

    async fn list(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        status: Option<ThreadStatus>,
        page: Page,
    ) -> Result<(Vec<ChatThread>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |t| {
            t.chatbot_id == chatbot && &t.user_id == user && status.is_none_or(|s| t.status == s)
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    table: Arc<Table<ChatMessageRecord>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: &ChatMessageRecord) -> Result<(), RepositoryError> {
        self.table.insert(message)
    }

    async fn list(&self, tenant: &TenantId, thread: ThreadId, page: Page) -> Result<(Vec<ChatMessageRecord>, usize), RepositoryError> {
        Ok(self.table.page(tenant, page, |m| m.thread_id == thread))
    }

    async fn recent(&self, tenant: &TenantId, thread: ThreadId, limit: usize) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let all = self.table.select(tenant, |m| m.thread_id == thread);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }
}
