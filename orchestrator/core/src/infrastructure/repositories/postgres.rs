// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Repositories
//!
//! Each aggregate is stored as a JSONB `body` next to the columns that the
//! schema needs for tenancy, uniqueness (partial unique indexes over live
//! rows), filtering and soft delete. See `migrations/0001_init.sql`.
//!
//! Unique violations (SQLSTATE 23505) surface as
//! [`RepositoryError::Conflict`] carrying the aggregate's conflict message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{AGENT_NAME_CONFLICT, CHATBOT_CONFLICT, MODEL_NAME_CONFLICT, NETWORK_VERSION_CONFLICT, TOOL_NAME_CONFLICT};
use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{ChatMessageRecord, ChatThread, Chatbot, ChatbotId, ThreadId, ThreadStatus};
use crate::domain::model::{AiModel, ModelId};
use crate::domain::network::{
    AgentNetwork, NetworkEdgeRow, NetworkGraph, NetworkId, NetworkInterfaceRow, NetworkNodeRow,
};
use crate::domain::repository::{
    AgentFilter, AgentRepository, ChatbotFilter, ChatbotRepository, MessageRepository, ModelFilter,
    ModelRepository, NetworkFilter, NetworkRepository, Page, RepositoryError, ThreadRepository, ToolFilter,
    ToolRepository,
};
use crate::domain::tenant::{TenantId, UserId};
use crate::domain::tool::{AgentTool, ToolId};

/// Bindable column value.
#[derive(Debug, Clone)]
enum Param {
    Text(String),
    OptText(Option<String>),
    Bool(bool),
    Uuid(Uuid),
    OptUuid(Option<Uuid>),
    Time(DateTime<Utc>),
    OptTime(Option<DateTime<Utc>>),
}

fn push_param(qb: &mut QueryBuilder<'_, Postgres>, param: Param) {
    match param {
        Param::Text(v) => qb.push_bind(v),
        Param::OptText(v) => qb.push_bind(v),
        Param::Bool(v) => qb.push_bind(v),
        Param::Uuid(v) => qb.push_bind(v),
        Param::OptUuid(v) => qb.push_bind(v),
        Param::Time(v) => qb.push_bind(v),
        Param::OptTime(v) => qb.push_bind(v),
    };
}

fn conflict_aware(err: sqlx::Error, message: &str) -> RepositoryError {
    match RepositoryError::from(err) {
        RepositoryError::Conflict(_) => RepositoryError::Conflict(message.to_string()),
        other => other,
    }
}

fn body_of<T: Serialize>(value: &T) -> Result<Value, RepositoryError> {
    Ok(serde_json::to_value(value)?)
}

fn decode<T: DeserializeOwned>(row: &PgRow) -> Result<T, RepositoryError> {
    let body: Value = row.try_get("body")?;
    Ok(serde_json::from_value(body)?)
}

fn insert_query(table: &str, id: Uuid, tenant: &TenantId, columns: Vec<(&'static str, Param)>, body: Value) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {} (id, tenant_id, body", table));
    for (name, _) in &columns {
        qb.push(", ").push(*name);
    }
    qb.push(") VALUES (");
    qb.push_bind(id);
    qb.push(", ").push_bind(tenant.as_str().to_string());
    qb.push(", ").push_bind(body);
    for (_, param) in columns {
        qb.push(", ");
        push_param(&mut qb, param);
    }
    qb.push(")");
    qb
}

fn update_query(table: &str, id: Uuid, tenant: &TenantId, columns: Vec<(&'static str, Param)>, body: Value) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET body = ", table));
    qb.push_bind(body);
    for (name, param) in columns {
        qb.push(", ").push(name).push(" = ");
        push_param(&mut qb, param);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" AND tenant_id = ").push_bind(tenant.as_str().to_string());
    qb
}

/// Live rows of `table` for `tenant` with equality conditions, paged by
/// creation order.
async fn list_documents<T: DeserializeOwned>(
    pool: &PgPool,
    table: &str,
    tenant: &TenantId,
    conditions: Vec<(&'static str, Param)>,
    page: Page,
) -> Result<(Vec<T>, usize), RepositoryError> {
    let filtered = |select: &str| {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE tenant_id = ", select, table));
        qb.push_bind(tenant.as_str().to_string());
        qb.push(" AND deleted_at IS NULL");
        for (name, param) in conditions.clone() {
            qb.push(" AND ").push(name).push(" = ");
            push_param(&mut qb, param);
        }
        qb
    };

    let total: i64 = filtered("COUNT(*) AS total").build().fetch_one(pool).await?.try_get("total")?;

    let mut qb = filtered("body");
    qb.push(" ORDER BY created_at ASC, id ASC LIMIT ")
        .push_bind(page.limit as i64)
        .push(" OFFSET ")
        .push_bind(page.offset as i64);
    let rows = qb.build().fetch_all(pool).await?;
    let items = rows.iter().map(decode).collect::<Result<Vec<T>, _>>()?;
    Ok((items, total as usize))
}

async fn find_document<T: DeserializeOwned>(
    pool: &PgPool,
    table: &str,
    tenant: &TenantId,
    id: Uuid,
) -> Result<Option<T>, RepositoryError> {
    let sql = format!(
        "SELECT body FROM {} WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        table
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(decode).transpose()
}

fn ensure_updated(result: sqlx::postgres::PgQueryResult, what: &str) -> Result<(), RepositoryError> {
    if result.rows_affected() == 0 {
        Err(RepositoryError::NotFound(what.to_string()))
    } else {
        Ok(())
    }
}

fn model_columns(m: &AiModel) -> Vec<(&'static str, Param)> {
    vec![
        ("name", Param::Text(m.name.clone())),
        ("model_type", Param::Text(m.model_type.clone())),
        ("category", Param::Text(m.category.as_str().to_string())),
        ("is_enabled", Param::Bool(m.is_enabled)),
        ("created_at", Param::Time(m.created_at)),
        ("updated_at", Param::Time(m.updated_at)),
        ("deleted_at", Param::OptTime(m.deleted_at)),
    ]
}

pub struct PostgresModelRepository {
    pool: PgPool,
}

impl PostgresModelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelRepository for PostgresModelRepository {
    async fn insert(&self, model: &AiModel) -> Result<(), RepositoryError> {
        insert_query("ai_models", model.id.0, &model.tenant_id, model_columns(model), body_of(model)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, MODEL_NAME_CONFLICT))?;
        Ok(())
    }

    async fn update(&self, model: &AiModel) -> Result<(), RepositoryError> {
        let result = update_query("ai_models", model.id.0, &model.tenant_id, model_columns(model), body_of(model)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, MODEL_NAME_CONFLICT))?;
        ensure_updated(result, "ai model")
    }

    async fn find(&self, tenant: &TenantId, id: ModelId) -> Result<Option<AiModel>, RepositoryError> {
        find_document(&self.pool, "ai_models", tenant, id.0).await
    }

    async fn list(&self, tenant: &TenantId, filter: &ModelFilter, page: Page) -> Result<(Vec<AiModel>, usize), RepositoryError> {
        let mut conditions = Vec::new();
        if let Some(t) = &filter.model_type {
            conditions.push(("model_type", Param::Text(t.clone())));
        }
        if let Some(c) = filter.category {
            conditions.push(("category", Param::Text(c.as_str().to_string())));
        }
        if let Some(e) = filter.enabled {
            conditions.push(("is_enabled", Param::Bool(e)));
        }
        list_documents(&self.pool, "ai_models", tenant, conditions, page).await
    }
}

fn tool_columns(t: &AgentTool) -> Vec<(&'static str, Param)> {
    vec![
        ("name", Param::Text(t.name.clone())),
        ("kind", Param::Text(t.kind.clone())),
        ("provider", Param::OptText(t.provider.clone())),
        ("is_enabled", Param::Bool(t.is_enabled)),
        ("created_at", Param::Time(t.created_at)),
        ("updated_at", Param::Time(t.updated_at)),
        ("deleted_at", Param::OptTime(t.deleted_at)),
    ]
}

pub struct PostgresToolRepository {
    pool: PgPool,
}

impl PostgresToolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ToolRepository for PostgresToolRepository {
    async fn insert(&self, tool: &AgentTool) -> Result<(), RepositoryError> {
        insert_query("agent_tools", tool.id.0, &tool.tenant_id, tool_columns(tool), body_of(tool)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, TOOL_NAME_CONFLICT))?;
        Ok(())
    }

    async fn update(&self, tool: &AgentTool) -> Result<(), RepositoryError> {
        let result = update_query("agent_tools", tool.id.0, &tool.tenant_id, tool_columns(tool), body_of(tool)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, TOOL_NAME_CONFLICT))?;
        ensure_updated(result, "agent tool")
    }

    async fn find(&self, tenant: &TenantId, id: ToolId) -> Result<Option<AgentTool>, RepositoryError> {
        find_document(&self.pool, "agent_tools", tenant, id.0).await
    }

    async fn list(&self, tenant: &TenantId, filter: &ToolFilter, page: Page) -> Result<(Vec<AgentTool>, usize), RepositoryError> {
        let mut conditions = Vec::new();
        if let Some(k) = &filter.kind {
            conditions.push(("kind", Param::Text(k.clone())));
        }
        if let Some(e) = filter.enabled {
            conditions.push(("is_enabled", Param::Bool(e)));
        }
        list_documents(&self.pool, "agent_tools", tenant, conditions, page).await
    }
}

fn agent_columns(a: &Agent) -> Vec<(&'static str, Param)> {
    vec![
        ("name", Param::Text(a.name.clone())),
        ("agent_type", Param::Text(a.agent_type.clone())),
        ("model_id", Param::Uuid(a.model_id.0)),
        ("is_enabled", Param::Bool(a.is_enabled)),
        ("created_at", Param::Time(a.created_at)),
        ("updated_at", Param::Time(a.updated_at)),
        ("deleted_at", Param::OptTime(a.deleted_at)),
    ]
}

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError> {
        insert_query("agents", agent.id.0, &agent.tenant_id, agent_columns(agent), body_of(agent)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, AGENT_NAME_CONFLICT))?;
        Ok(())
    }

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let result = update_query("agents", agent.id.0, &agent.tenant_id, agent_columns(agent), body_of(agent)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, AGENT_NAME_CONFLICT))?;
        ensure_updated(result, "agent")
    }

    async fn find(&self, tenant: &TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        find_document(&self.pool, "agents", tenant, id.0).await
    }

    async fn list(&self, tenant: &TenantId, filter: &AgentFilter, page: Page) -> Result<(Vec<Agent>, usize), RepositoryError> {
        let mut conditions = Vec::new();
        if let Some(t) = &filter.agent_type {
            conditions.push(("agent_type", Param::Text(t.clone())));
        }
        if let Some(e) = filter.enabled {
            conditions.push(("is_enabled", Param::Bool(e)));
        }
        list_documents(&self.pool, "agents", tenant, conditions, page).await
    }
}

fn network_columns(n: &AgentNetwork) -> Vec<(&'static str, Param)> {
    vec![
        ("name", Param::Text(n.name.clone())),
        ("slug", Param::Text(n.slug.clone())),
        ("version", Param::Text(n.version.clone())),
        ("network_type", Param::Text(n.network_type.as_str().to_string())),
        ("status", Param::Text(n.status.as_str().to_string())),
        ("is_enabled", Param::Bool(n.is_enabled)),
        ("created_at", Param::Time(n.created_at)),
        ("updated_at", Param::Time(n.updated_at)),
        ("deleted_at", Param::OptTime(n.deleted_at)),
    ]
}

pub struct PostgresNetworkRepository {
    pool: PgPool,
}

impl PostgresNetworkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_graph(tx: &mut sqlx::PgConnection, id: NetworkId, graph: &NetworkGraph) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM agent_network_nodes WHERE network_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM agent_network_edges WHERE network_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM agent_network_interfaces WHERE network_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        for node in &graph.nodes {
            sqlx::query(
                r#"
                INSERT INTO agent_network_nodes (
                    id, network_id, node_key, agent_id, child_network_id,
                    child_network_version, role, config
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(node.id)
            .bind(id.0)
            .bind(&node.node_key)
            .bind(node.agent_id.map(|a| a.0))
            .bind(node.child_network_id.map(|n| n.0))
            .bind(&node.child_network_version)
            .bind(&node.role)
            .bind(&node.config)
            .execute(&mut *tx)
            .await?;
        }
        for edge in &graph.edges {
            sqlx::query(
                r#"
                INSERT INTO agent_network_edges (id, network_id, source_node_key, target_node_key, condition)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(edge.id)
            .bind(id.0)
            .bind(&edge.source_node_key)
            .bind(&edge.target_node_key)
            .bind(&edge.condition)
            .execute(&mut *tx)
            .await?;
        }
        if let Some(interface) = &graph.interface {
            sqlx::query(
                r#"
                INSERT INTO agent_network_interfaces (
                    network_id, version, inputs_schema, outputs_schema, streaming, capabilities
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id.0)
            .bind(&interface.version)
            .bind(&interface.inputs_schema)
            .bind(&interface.outputs_schema)
            .bind(interface.streaming)
            .bind(&interface.capabilities)
            .execute(&mut *tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkRepository for PostgresNetworkRepository {
    async fn insert(&self, network: &AgentNetwork, graph: &NetworkGraph) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_query("agent_networks", network.id.0, &network.tenant_id, network_columns(network), body_of(network)?)
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_aware(e, NETWORK_VERSION_CONFLICT))?;
        Self::write_graph(&mut tx, network.id, graph).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, network: &AgentNetwork, graph: Option<&NetworkGraph>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = update_query("agent_networks", network.id.0, &network.tenant_id, network_columns(network), body_of(network)?)
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_aware(e, NETWORK_VERSION_CONFLICT))?;
        ensure_updated(result, "agent network")?;
        if let Some(graph) = graph {
            Self::write_graph(&mut tx, network.id, graph).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<AgentNetwork>, RepositoryError> {
        find_document(&self.pool, "agent_networks", tenant, id.0).await
    }

    async fn list(&self, tenant: &TenantId, filter: &NetworkFilter, page: Page) -> Result<(Vec<AgentNetwork>, usize), RepositoryError> {
        let mut conditions = Vec::new();
        if let Some(t) = filter.network_type {
            conditions.push(("network_type", Param::Text(t.as_str().to_string())));
        }
        if let Some(s) = filter.status {
            conditions.push(("status", Param::Text(s.as_str().to_string())));
        }
        if let Some(e) = filter.enabled {
            conditions.push(("is_enabled", Param::Bool(e)));
        }
        list_documents(&self.pool, "agent_networks", tenant, conditions, page).await
    }

    async fn graph(&self, tenant: &TenantId, id: NetworkId) -> Result<Option<NetworkGraph>, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM agent_networks WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL)",
        )
        .bind(id.0)
        .bind(tenant.as_str())
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Ok(None);
        }

        let nodes = sqlx::query(
            r#"
            SELECT id, node_key, agent_id, child_network_id, child_network_version, role, config
            FROM agent_network_nodes
            WHERE network_id = $1
            ORDER BY node_key
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| -> Result<NetworkNodeRow, sqlx::Error> {
            Ok(NetworkNodeRow {
                id: row.try_get("id")?,
                network_id: id,
                node_key: row.try_get("node_key")?,
                agent_id: row.try_get::<Option<Uuid>, _>("agent_id")?.map(AgentId),
                child_network_id: row.try_get::<Option<Uuid>, _>("child_network_id")?.map(NetworkId),
                child_network_version: row.try_get("child_network_version")?,
                role: row.try_get("role")?,
                config: row.try_get("config")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        let edges = sqlx::query(
            "SELECT id, source_node_key, target_node_key, condition FROM agent_network_edges WHERE network_id = $1",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| -> Result<NetworkEdgeRow, sqlx::Error> {
            Ok(NetworkEdgeRow {
                id: row.try_get("id")?,
                network_id: id,
                source_node_key: row.try_get("source_node_key")?,
                target_node_key: row.try_get("target_node_key")?,
                condition: row.try_get("condition")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        let interface = sqlx::query(
            r#"
            SELECT version, inputs_schema, outputs_schema, streaming, capabilities
            FROM agent_network_interfaces
            WHERE network_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| -> Result<NetworkInterfaceRow, sqlx::Error> {
            Ok(NetworkInterfaceRow {
                network_id: id,
                version: row.try_get("version")?,
                inputs_schema: row.try_get("inputs_schema")?,
                outputs_schema: row.try_get("outputs_schema")?,
                streaming: row.try_get("streaming")?,
                capabilities: row.try_get("capabilities")?,
            })
        })
        .transpose()?;

        Ok(Some(NetworkGraph { nodes, edges, interface }))
    }

    async fn is_agent_referenced(&self, tenant: &TenantId, agent: AgentId) -> Result<bool, RepositoryError> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM agent_network_nodes n
                JOIN agent_networks a ON a.id = n.network_id
                WHERE a.tenant_id = $1 AND a.deleted_at IS NULL AND n.agent_id = $2
            )
            "#,
        )
        .bind(tenant.as_str())
        .bind(agent.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(referenced)
    }
}

fn chatbot_columns(c: &Chatbot) -> Vec<(&'static str, Param)> {
    vec![
        ("name", Param::Text(c.name.clone())),
        ("slug", Param::Text(c.slug.clone())),
        ("agent_network_id", Param::Uuid(c.agent_network_id.0)),
        ("agent_network_version", Param::Text(c.agent_network_version.clone())),
        ("is_enabled", Param::Bool(c.is_enabled)),
        ("created_at", Param::Time(c.created_at)),
        ("updated_at", Param::Time(c.updated_at)),
        ("deleted_at", Param::OptTime(c.deleted_at)),
    ]
}

pub struct PostgresChatbotRepository {
    pool: PgPool,
}

impl PostgresChatbotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatbotRepository for PostgresChatbotRepository {
    async fn insert(&self, chatbot: &Chatbot) -> Result<(), RepositoryError> {
        insert_query("chatbots", chatbot.id.0, &chatbot.tenant_id, chatbot_columns(chatbot), body_of(chatbot)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, CHATBOT_CONFLICT))?;
        Ok(())
    }

    async fn update(&self, chatbot: &Chatbot) -> Result<(), RepositoryError> {
        let result = update_query("chatbots", chatbot.id.0, &chatbot.tenant_id, chatbot_columns(chatbot), body_of(chatbot)?)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_aware(e, CHATBOT_CONFLICT))?;
        ensure_updated(result, "chatbot")
    }

    async fn find(&self, tenant: &TenantId, id: ChatbotId) -> Result<Option<Chatbot>, RepositoryError> {
        find_document(&self.pool, "chatbots", tenant, id.0).await
    }

    async fn list(&self, tenant: &TenantId, filter: &ChatbotFilter, page: Page) -> Result<(Vec<Chatbot>, usize), RepositoryError> {
        let mut conditions = Vec::new();
        if let Some(e) = filter.enabled {
            conditions.push(("is_enabled", Param::Bool(e)));
        }
        list_documents(&self.pool, "chatbots", tenant, conditions, page).await
    }

    async fn is_network_referenced(&self, tenant: &TenantId, network: NetworkId) -> Result<bool, RepositoryError> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chatbots WHERE tenant_id = $1 AND agent_network_id = $2 AND deleted_at IS NULL)",
        )
        .bind(tenant.as_str())
        .bind(network.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(referenced)
    }
}

fn status_str(status: ThreadStatus) -> &'static str {
    match status {
        ThreadStatus::Active => "active",
        ThreadStatus::Archived => "archived",
        ThreadStatus::Deleted => "deleted",
    }
}

fn thread_columns(t: &ChatThread) -> Vec<(&'static str, Param)> {
    vec![
        ("chatbot_id", Param::Uuid(t.chatbot_id.0)),
        ("user_id", Param::Text(t.user_id.as_str().to_string())),
        ("status", Param::Text(status_str(t.status).to_string())),
        ("last_run_id", Param::OptUuid(t.last_run_id)),
        ("created_at", Param::Time(t.created_at)),
        ("updated_at", Param::Time(t.updated_at)),
        ("deleted_at", Param::OptTime(t.deleted_at)),
    ]
}

pub struct PostgresThreadRepository {
    pool: PgPool,
}

impl PostgresThreadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreadRepository for PostgresThreadRepository {
    async fn insert(&self, thread: &ChatThread) -> Result<(), RepositoryError> {
        insert_query("chat_threads", thread.id.0, &thread.tenant_id, thread_columns(thread), body_of(thread)?)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, thread: &ChatThread) -> Result<(), RepositoryError> {
        let result = update_query("chat_threads", thread.id.0, &thread.tenant_id, thread_columns(thread), body_of(thread)?)
            .build()
            .execute(&self.pool)
            .await?;
        ensure_updated(result, "chat thread")
    }

    async fn find(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        id: ThreadId,
    ) -> Result<Option<ChatThread>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM chat_threads
            WHERE id = $1 AND tenant_id = $2 AND chatbot_id = $3 AND user_id = $4
              AND deleted_at IS NULL AND status <> 'deleted'
            "#,
        )
        .bind(id.0)
        .bind(tenant.as_str())
        .bind(chatbot.0)
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn list(
        &self,
        tenant: &TenantId,
        chatbot: ChatbotId,
        user: &UserId,
        status: Option<ThreadStatus>,
        page: Page,
    ) -> Result<(Vec<ChatThread>, usize), RepositoryError> {
        let mut conditions = vec![
            ("chatbot_id", Param::Uuid(chatbot.0)),
            ("user_id", Param::Text(user.as_str().to_string())),
        ];
        if let Some(s) = status {
            conditions.push(("status", Param::Text(status_str(s).to_string())));
        }
        list_documents(&self.pool, "chat_threads", tenant, conditions, page).await
    }
}

pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn insert(&self, message: &ChatMessageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, tenant_id, thread_id, role, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id.0)
        .bind(message.tenant_id.as_str())
        .bind(message.thread_id.0)
        .bind(message.role.as_str())
        .bind(body_of(message)?)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, tenant: &TenantId, thread: ThreadId, page: Page) -> Result<(Vec<ChatMessageRecord>, usize), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE tenant_id = $1 AND thread_id = $2")
            .bind(tenant.as_str())
            .bind(thread.0)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            r#"
            SELECT body FROM chat_messages
            WHERE tenant_id = $1 AND thread_id = $2
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant.as_str())
        .bind(thread.0)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await?;
        let items = rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total as usize))
    }

    async fn recent(&self, tenant: &TenantId, thread: ThreadId, limit: usize) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM (
                SELECT body, created_at, id FROM chat_messages
                WHERE tenant_id = $1 AND thread_id = $2
                ORDER BY created_at DESC, id DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant.as_str())
        .bind(thread.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode).collect()
    }
}
