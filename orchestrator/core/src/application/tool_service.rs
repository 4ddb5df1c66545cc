// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Tool Service
//!
//! Lifecycle of [`AgentTool`] declarations and the single invocation path used
//! both by direct API calls and by agents (through [`BoundTool`]).
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Adapter lookup, binding validation and tenant-scoped dispatch
//! - **Related:** `domain::tool`, `infrastructure::tools`

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::model_service::AiModelService;
use crate::application::{check_name, Listing, Paging};
use crate::domain::dataset::{DatasetCategory, DatasetGateway, DatasetId};
use crate::domain::model::{ModelCategory, ModelId};
use crate::domain::repository::{ToolFilter, ToolRepository};
use crate::domain::tenant::Principal;
use crate::domain::tool::{
    callable_name, AgentTool, CallableTool, ResourceType, ToolAdapter, ToolBindings, ToolCallFrame, ToolContext,
    ToolError, ToolId, ToolKindInfo, ToolOutcome,
};
use crate::infrastructure::registry::ToolAdapterRegistry;
use crate::infrastructure::tools::{sql_select, vector_search};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateToolRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub bindings: ToolBindings,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// Partial patch; `bindings` and `config` replace the stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateToolRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bindings: Option<ToolBindings>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

pub struct ToolService {
    repo: Arc<dyn ToolRepository>,
    adapters: ToolAdapterRegistry,
    models: Arc<AiModelService>,
    datasets: Arc<dyn DatasetGateway>,
    paging: Paging,
}

impl ToolService {
    pub fn new(
        repo: Arc<dyn ToolRepository>,
        adapters: ToolAdapterRegistry,
        models: Arc<AiModelService>,
        datasets: Arc<dyn DatasetGateway>,
        paging: Paging,
    ) -> Self {
        Self {
            repo,
            adapters,
            models,
            datasets,
            paging,
        }
    }

    pub fn list_kinds(&self) -> Vec<ToolKindInfo> {
        self.adapters
            .list()
            .into_iter()
            .map(|(_, adapter)| adapter.info())
            .collect()
    }

    fn adapter(&self, kind: &str, provider: Option<&str>) -> Result<Arc<dyn ToolAdapter>, ToolError> {
        self.adapters
            .get(kind, provider)
            .ok_or_else(|| ToolError::UnknownKind(kind.to_string()))
    }

    pub async fn create(&self, principal: &Principal, request: CreateToolRequest) -> Result<AgentTool, ToolError> {
        let name = check_name("name", &request.name, 128).map_err(ToolError::Validation)?;
        let kind = request.kind.trim().to_string();
        let adapter = self.adapter(&kind, request.provider.as_deref())?;
        adapter.validate_bindings(&request.bindings)?;
        adapter.validate_config(&request.config)?;
        self.check_binding_targets(principal, &request.bindings).await?;

        let now = Utc::now();
        let tool = AgentTool {
            id: ToolId::new(),
            tenant_id: principal.tenant_id.clone(),
            owner_id: principal.user_id.clone(),
            name,
            description: request.description,
            kind,
            provider: request.provider,
            bindings: request.bindings,
            config: request.config,
            is_enabled: request.is_enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
            created_by: principal.user_id.clone(),
            updated_by: principal.user_id.clone(),
            deleted_at: None,
        };
        self.repo.insert(&tool).await?;
        info!(tool_id = %tool.id, kind = %tool.kind, tenant = %tool.tenant_id, "Agent tool created");
        Ok(tool)
    }

    pub async fn get(&self, principal: &Principal, id: ToolId) -> Result<AgentTool, ToolError> {
        self.find(principal, id).await?.ok_or(ToolError::NotFound)
    }

    /// Tenant-scoped lookup; `None` when absent or deleted.
    pub async fn find(&self, principal: &Principal, id: ToolId) -> Result<Option<AgentTool>, ToolError> {
        Ok(self.repo.find(&principal.tenant_id, id).await?)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &ToolFilter,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<AgentTool>, ToolError> {
        let page = self.paging.page(limit, offset);
        let (items, total) = self.repo.list(&principal.tenant_id, filter, page).await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(&self, principal: &Principal, id: ToolId, request: UpdateToolRequest) -> Result<AgentTool, ToolError> {
        let mut tool = self.get(principal, id).await?;
        if let Some(name) = &request.name {
            tool.name = check_name("name", name, 128).map_err(ToolError::Validation)?;
        }
        if let Some(description) = request.description {
            tool.description = Some(description);
        }
        if let Some(enabled) = request.is_enabled {
            tool.is_enabled = enabled;
        }

        if request.bindings.is_some() || request.config.is_some() {
            let adapter = self.adapter(&tool.kind, tool.provider.as_deref())?;
            if let Some(bindings) = request.bindings {
                adapter.validate_bindings(&bindings)?;
                self.check_binding_targets(principal, &bindings).await?;
                tool.bindings = bindings;
            }
            if let Some(config) = request.config {
                adapter.validate_config(&config)?;
                tool.config = config;
            }
        }

        tool.updated_at = Utc::now();
        tool.updated_by = principal.user_id.clone();
        self.repo.update(&tool).await?;
        info!(tool_id = %tool.id, "Agent tool updated");
        Ok(tool)
    }

    pub async fn delete(&self, principal: &Principal, id: ToolId) -> Result<(), ToolError> {
        let mut tool = self.get(principal, id).await?;
        let now = Utc::now();
        tool.deleted_at = Some(now);
        tool.updated_at = now;
        tool.updated_by = principal.user_id.clone();
        self.repo.update(&tool).await?;
        info!(tool_id = %id, "Agent tool deleted");
        Ok(())
    }

    pub async fn set_enabled(&self, principal: &Principal, id: ToolId, enabled: bool) -> Result<AgentTool, ToolError> {
        self.update(
            principal,
            id,
            UpdateToolRequest {
                is_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Execute a stored tool for `principal`. Agents reach this through
    /// [`BoundTool`], so API and agent calls share every check.
    pub async fn invoke(&self, principal: &Principal, id: ToolId, payload: &Value) -> Result<Value, ToolError> {
        let tool = self.get(principal, id).await?;
        if !tool.is_enabled {
            return Err(ToolError::Disabled);
        }
        let adapter = self.adapter(&tool.kind, tool.provider.as_deref())?;
        adapter.validate_bindings(&tool.bindings)?;

        let ctx = ToolContext {
            principal: principal.clone(),
            datasets: self.datasets.clone(),
            embedder: self.models.clone(),
        };
        metrics::counter!("orion_tool_invocations_total", "kind" => tool.kind.clone()).increment(1);
        debug!(tool_id = %id, kind = %tool.kind, "Invoking agent tool");
        adapter.invoke(&tool, payload, &ctx).await
    }

    /// Callable form of a tool for an agent loop. `Ok(None)` when the tool is
    /// gone, disabled or has no registered adapter; the caller skips it.
    pub async fn callable(self: &Arc<Self>, principal: &Principal, id: ToolId) -> Result<Option<BoundTool>, ToolError> {
        let Some(tool) = self.find(principal, id).await? else {
            return Ok(None);
        };
        if !tool.is_enabled {
            return Ok(None);
        }
        let Some(adapter) = self.adapters.get(&tool.kind, tool.provider.as_deref()) else {
            return Ok(None);
        };
        Ok(Some(BoundTool::new(self.clone(), principal.clone(), &tool, adapter.as_ref())))
    }

    /// Existence, tenancy and category of every bound resource.
    async fn check_binding_targets(&self, principal: &Principal, bindings: &ToolBindings) -> Result<(), ToolError> {
        for binding in &bindings.resources {
            match binding.resource_type {
                ResourceType::Dataset => {
                    let dataset = self
                        .datasets
                        .find(&principal.tenant_id, DatasetId(binding.id))
                        .await?
                        .ok_or_else(|| ToolError::Validation(format!("Bound dataset not found: {}", binding.id)))?;
                    let expected = match binding.role.as_str() {
                        sql_select::PRIMARY_ROLE => Some(DatasetCategory::Sql),
                        vector_search::INDEX_ROLE => Some(DatasetCategory::Vector),
                        _ => None,
                    };
                    if let Some(expected) = expected {
                        if dataset.category != expected {
                            return Err(ToolError::Validation(format!(
                                "Dataset bound as '{}' must be a {} dataset",
                                binding.role, expected
                            )));
                        }
                    }
                }
                ResourceType::AiModel => {
                    let model = self
                        .models
                        .find(principal, ModelId(binding.id))
                        .await?
                        .ok_or_else(|| ToolError::Validation(format!("Bound AI model not found: {}", binding.id)))?;
                    if binding.role == vector_search::EMBEDDING_ROLE && model.category != ModelCategory::Embedding {
                        return Err(ToolError::Validation(format!(
                            "Model bound as '{}' must be an embedding model",
                            binding.role
                        )));
                    }
                }
                ResourceType::Datasource => {
                    debug!(id = %binding.id, "Datasource binding accepted without lookup");
                }
            }
        }
        Ok(())
    }
}

/// A stored tool exposed to the model. Calls go back through
/// [`ToolService::invoke`] with the invoking principal.
pub struct BoundTool {
    service: Arc<ToolService>,
    principal: Principal,
    tool_id: ToolId,
    name: String,
    description: String,
    parameters: Value,
}

impl BoundTool {
    fn new(service: Arc<ToolService>, principal: Principal, tool: &AgentTool, adapter: &dyn ToolAdapter) -> Self {
        let description = tool
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(tool.name.as_str())
            .to_string();
        Self {
            service,
            principal,
            tool_id: tool.id,
            name: callable_name(&tool.name, tool.id),
            description,
            parameters: adapter.parameters_schema(),
        }
    }

    pub fn tool_id(&self) -> ToolId {
        self.tool_id
    }
}

#[async_trait]
impl CallableTool for BoundTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, args: Value, frame: &ToolCallFrame<'_>) -> Result<ToolOutcome, ToolError> {
        debug!(tool = %self.name, agent = frame.agent_name, call_id = frame.call_id, "Agent tool call");
        self.service
            .invoke(&self.principal, self.tool_id, &args)
            .await
            .map(ToolOutcome::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{Classified, ErrorKind};
    use crate::domain::platform_config::ConnectorsConfig;
    use crate::domain::tenant::TenantId;
    use crate::infrastructure::connectors::ScriptedConnector;
    use crate::infrastructure::datasets::InMemoryDatasetGateway;
    use crate::infrastructure::registry::ConnectorRegistry;
    use crate::infrastructure::repositories::{InMemoryModelRepository, InMemoryToolRepository};
    use crate::infrastructure::secrets::AesGcmCipher;
    use crate::infrastructure::tools::{SqlSelectAdapter, VectorSearchAdapter};
    use serde_json::json;

    struct Fixture {
        service: Arc<ToolService>,
        datasets: Arc<InMemoryDatasetGateway>,
        principal: Principal,
    }

    fn fixture() -> Fixture {
        let connectors = ConnectorRegistry::builder("connectors")
            .register("embedding.scripted", None, Arc::new(ScriptedConnector::embeddings(4)))
            .build();
        let models = Arc::new(AiModelService::new(
            Arc::new(InMemoryModelRepository::new()),
            connectors,
            Arc::new(AesGcmCipher::new("k").unwrap()),
            Paging::default(),
            ConnectorsConfig::default(),
        ));
        let adapters = ToolAdapterRegistry::builder("tools")
            .register(sql_select::KIND, None, Arc::new(SqlSelectAdapter::new()))
            .register(vector_search::KIND, None, Arc::new(VectorSearchAdapter::new()))
            .build();
        let datasets = Arc::new(InMemoryDatasetGateway::new());
        let service = Arc::new(ToolService::new(
            Arc::new(InMemoryToolRepository::new()),
            adapters,
            models,
            datasets.clone(),
            Paging::default(),
        ));
        Fixture {
            service,
            datasets,
            principal: Principal::new("u1", "t1"),
        }
    }

    fn rows() -> Vec<serde_json::Map<String, Value>> {
        (1..=5)
            .map(|i| json!({"id": i, "status": if i % 2 == 0 { "open" } else { "closed" }}))
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    fn sql_tool(dataset: DatasetId) -> CreateToolRequest {
        CreateToolRequest {
            name: "Orders lookup".into(),
            description: Some("Look up orders".into()),
            kind: sql_select::KIND.into(),
            provider: None,
            bindings: serde_json::from_value(json!({
                "resources": [{"type": "dataset", "id": dataset.0, "role": "primary"}]
            }))
            .unwrap(),
            config: json!({"max_rows": 2}),
            is_enabled: None,
        }
    }

    #[tokio::test]
    async fn test_invoke_clamps_limit_and_scopes_tenant() {
        let f = fixture();
        let dataset = f.datasets.add_sql(&f.principal.tenant_id, "orders", rows());
        let tool = f.service.create(&f.principal, sql_tool(dataset)).await.unwrap();

        let out = f
            .service
            .invoke(&f.principal, tool.id, &json!({"limit": 100}))
            .await
            .unwrap();
        assert_eq!(out["row_count"], 2);

        let other = Principal::new("u2", "t2");
        let err = f.service.invoke(&other, tool.id, &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_disabled_tool_refuses_invocation() {
        let f = fixture();
        let dataset = f.datasets.add_sql(&f.principal.tenant_id, "orders", rows());
        let tool = f.service.create(&f.principal, sql_tool(dataset)).await.unwrap();
        f.service.set_enabled(&f.principal, tool.id, false).await.unwrap();
        let err = f.service.invoke(&f.principal, tool.id, &json!({})).await.unwrap_err();
        assert_eq!(err.code(), "AGENT_TOOL_DISABLED");
        assert!(f.service.callable(&f.principal, tool.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_and_binding_checks() {
        let f = fixture();
        let mut request = sql_tool(DatasetId::new());
        request.kind = "http.fetch".into();
        let err = f.service.create(&f.principal, request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCapability);

        let err = f.service.create(&f.principal, sql_tool(DatasetId::new())).await.unwrap_err();
        assert!(err.to_string().starts_with("Bound dataset not found"));

        let vector = f.datasets.add_vector(&f.principal.tenant_id, "docs", Vec::new());
        let err = f.service.create(&f.principal, sql_tool(vector)).await.unwrap_err();
        assert_eq!(err.to_string(), "Dataset bound as 'primary' must be a sql dataset");

        let foreign = f.datasets.add_sql(&TenantId::new("t2"), "orders", rows());
        let err = f.service.create(&f.principal, sql_tool(foreign)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    }

    #[tokio::test]
    async fn test_callable_routes_through_invoke() {
        let f = fixture();
        let dataset = f.datasets.add_sql(&f.principal.tenant_id, "orders", rows());
        let tool = f.service.create(&f.principal, sql_tool(dataset)).await.unwrap();
        let callable = f.service.callable(&f.principal, tool.id).await.unwrap().unwrap();
        assert_eq!(callable.name(), "Orders_lookup");
        assert_eq!(callable.description(), "Look up orders");
        assert!(callable.parameters()["properties"].get("where").is_some());

        let frame = ToolCallFrame {
            call_id: "call_1",
            agent_name: "agent",
            transcript: &[],
        };
        let outcome = callable
            .call(json!({"where": {"status": "open"}}), &frame)
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Output(value) => assert_eq!(value["row_count"], 2),
            ToolOutcome::Handoff(_) => panic!("unexpected handoff"),
        }
    }
}
