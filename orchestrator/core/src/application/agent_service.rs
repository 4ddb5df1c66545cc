// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Service
//!
//! Agent lifecycle plus the construction path that turns a stored [`Agent`]
//! into a [`PreparedAgent`] ready to run.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Resolve model, connector and tools for an agent, then drive
//!   one bounded invocation
//! - **Related:** `application::agent_executor`, `application::standalone`,
//!   `orion-swarm`
//!
//! Every invocation re-resolves the agent, its model and its tools. Nothing
//! built here is cached between calls.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::application::agent_executor::{last_ai_text, LlmParams, PreparedAgent, RunStats};
use crate::application::model_service::AiModelService;
use crate::application::tool_service::ToolService;
use crate::application::{check_name, Listing, Paging, ValidationStatus};
use crate::domain::agent::{
    render_prompt, resolve_allowed_tools, Agent, AgentBindings, AgentConfig, AgentError, AgentId, AgentInvocation,
    AgentRunResult, ToolOverrides, DEFAULT_AGENT_TYPE,
};
use crate::domain::llm::{ChatMessage, ChatModel};
use crate::domain::model::{AiModel, ModelCategory, ModelError, ModelId};
use crate::domain::network::RuntimeOverrides;
use crate::domain::repository::{AgentFilter, AgentRepository, NetworkRepository};
use crate::domain::tenant::Principal;
use crate::domain::tool::{CallableTool, ToolId};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default, rename = "type")]
    pub agent_type: Option<String>,
    pub model_id: ModelId,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub config_schema_version: Option<String>,
    #[serde(default)]
    pub bindings: AgentBindings,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub model_id: Option<ModelId>,
    /// Replaces the whole config.
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub bindings: Option<AgentBindings>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// Per-invocation overrides applied while building an agent.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides<'a> {
    pub tool_overrides: Option<&'a ToolOverrides>,
    pub llm_overrides: Option<&'a Map<String, Value>>,
}

impl<'a> From<&'a RuntimeOverrides> for BuildOverrides<'a> {
    fn from(overrides: &'a RuntimeOverrides) -> Self {
        Self {
            tool_overrides: overrides.tool_overrides.as_ref(),
            llm_overrides: overrides.llm_overrides.as_ref(),
        }
    }
}

pub struct AgentService {
    repo: Arc<dyn AgentRepository>,
    networks: Arc<dyn NetworkRepository>,
    models: Arc<AiModelService>,
    tools: Arc<ToolService>,
    paging: Paging,
}

impl AgentService {
    pub fn new(
        repo: Arc<dyn AgentRepository>,
        networks: Arc<dyn NetworkRepository>,
        models: Arc<AiModelService>,
        tools: Arc<ToolService>,
        paging: Paging,
    ) -> Self {
        Self {
            repo,
            networks,
            models,
            tools,
            paging,
        }
    }

    pub async fn create(&self, principal: &Principal, request: CreateAgentRequest) -> Result<Agent, AgentError> {
        let name = check_name("name", &request.name, 128).map_err(AgentError::ConfigInvalid)?;
        let config = AgentConfig::from_value(&request.config)?;
        self.check_model(principal, request.model_id).await?;
        self.check_tools(principal, &request.bindings.tools).await?;

        let now = Utc::now();
        let agent = Agent {
            id: AgentId::new(),
            tenant_id: principal.tenant_id.clone(),
            owner_id: principal.user_id.clone(),
            name,
            description: request.description,
            tags: request.tags,
            agent_type: request
                .agent_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
            model_id: request.model_id,
            config,
            config_schema_version: request.config_schema_version,
            bindings: request.bindings,
            is_enabled: request.is_enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
            created_by: principal.user_id.clone(),
            updated_by: principal.user_id.clone(),
            deleted_at: None,
        };
        self.repo.insert(&agent).await?;
        info!(agent_id = %agent.id, tenant = %agent.tenant_id, tools = agent.bindings.tools.len(), "Agent created");
        Ok(agent)
    }

    pub async fn get(&self, principal: &Principal, id: AgentId) -> Result<Agent, AgentError> {
        self.find(principal, id).await?.ok_or(AgentError::NotFound)
    }

    pub async fn find(&self, principal: &Principal, id: AgentId) -> Result<Option<Agent>, AgentError> {
        Ok(self.repo.find(&principal.tenant_id, id).await?)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &AgentFilter,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<Agent>, AgentError> {
        let page = self.paging.page(limit, offset);
        let (items, total) = self.repo.list(&principal.tenant_id, filter, page).await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(&self, principal: &Principal, id: AgentId, request: UpdateAgentRequest) -> Result<Agent, AgentError> {
        let mut agent = self.get(principal, id).await?;
        if let Some(name) = &request.name {
            agent.name = check_name("name", name, 128).map_err(AgentError::ConfigInvalid)?;
        }
        if let Some(description) = request.description {
            agent.description = Some(description);
        }
        if let Some(tags) = request.tags {
            agent.tags = Some(tags);
        }
        if let Some(config) = &request.config {
            agent.config = AgentConfig::from_value(config)?;
        }
        if let Some(model_id) = request.model_id {
            self.check_model(principal, model_id).await?;
            agent.model_id = model_id;
        }
        if let Some(bindings) = request.bindings {
            self.check_tools(principal, &bindings.tools).await?;
            agent.bindings = bindings;
        }
        if let Some(enabled) = request.is_enabled {
            agent.is_enabled = enabled;
        }
        agent.updated_at = Utc::now();
        agent.updated_by = principal.user_id.clone();
        self.repo.update(&agent).await?;
        info!(agent_id = %agent.id, "Agent updated");
        Ok(agent)
    }

    /// Soft delete; refused while a live network node points at the agent.
    pub async fn delete(&self, principal: &Principal, id: AgentId) -> Result<(), AgentError> {
        let mut agent = self.get(principal, id).await?;
        if self.networks.is_agent_referenced(&principal.tenant_id, id).await? {
            return Err(AgentError::Conflict(
                "Agent is referenced by an agent network".to_string(),
            ));
        }
        let now = Utc::now();
        agent.deleted_at = Some(now);
        agent.updated_at = now;
        agent.updated_by = principal.user_id.clone();
        self.repo.update(&agent).await?;
        info!(agent_id = %id, "Agent deleted");
        Ok(())
    }

    pub async fn set_enabled(&self, principal: &Principal, id: AgentId, enabled: bool) -> Result<Agent, AgentError> {
        self.update(
            principal,
            id,
            UpdateAgentRequest {
                is_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Config bounds, model and tools of a stored agent.
    pub async fn validate(&self, principal: &Principal, id: AgentId) -> Result<ValidationStatus, AgentError> {
        let agent = self.get(principal, id).await?;
        agent.config.validate()?;
        self.check_model(principal, agent.model_id).await?;
        self.check_tools(principal, &agent.bindings.tools).await?;
        Ok(ValidationStatus::ok())
    }

    pub async fn invoke(
        &self,
        principal: &Principal,
        id: AgentId,
        invocation: AgentInvocation,
    ) -> Result<AgentRunResult, AgentError> {
        let started = Instant::now();
        let outcome = self.run(principal, id, invocation, started).await;
        let latency_ms = started.elapsed().as_millis() as f64;
        let label = match &outcome {
            Ok(result) => result.finish_reason.as_str(),
            Err(_) => "error",
        };
        metrics::counter!("orion_agent_invocations_total", "outcome" => label).increment(1);
        metrics::histogram!("orion_agent_invocation_latency_ms").record(latency_ms);
        if let Err(e) = &outcome {
            error!(agent_id = %id, error = %e, "Agent invocation failed");
        }
        outcome
    }

    async fn run(
        &self,
        principal: &Principal,
        id: AgentId,
        invocation: AgentInvocation,
        started: Instant,
    ) -> Result<AgentRunResult, AgentError> {
        let agent = self.get(principal, id).await?;
        let overrides = BuildOverrides {
            tool_overrides: invocation.tool_overrides.as_ref(),
            llm_overrides: invocation.llm_overrides.as_ref(),
        };
        let prepared = self.prepare(principal, &agent, Vec::new(), None, &overrides).await?;

        let template = agent.config.prompt_template.as_deref().unwrap_or_default();
        let prompt = render_prompt(template, &invocation.input, &invocation.variables);
        let mut transcript = invocation.history;
        transcript.push(ChatMessage::human(prompt));

        info!(agent_id = %id, tools = prepared.tools.len(), "Agent invocation started");
        let mut stats = RunStats::default();
        let end = prepared.run_turn(&mut transcript, &mut stats, u32::MAX).await?;
        let result = AgentRunResult {
            output: last_ai_text(&transcript),
            steps: stats.steps,
            tool_calls: stats.tool_calls,
            tokens: stats.tokens,
            latency_ms: started.elapsed().as_millis() as u64,
            finish_reason: end.finish_reason(),
        };
        info!(
            agent_id = %id,
            steps = result.steps,
            tool_calls = result.tool_calls,
            finish_reason = result.finish_reason.as_str(),
            "Agent invocation finished"
        );
        Ok(result)
    }

    /// Shared construction path: resolve the agent's model and permitted
    /// tools, append `extra_tools`, and name the result `name` (defaults to
    /// the agent name).
    pub async fn build_agent(
        &self,
        principal: &Principal,
        agent_id: AgentId,
        extra_tools: Vec<Arc<dyn CallableTool>>,
        name: Option<&str>,
        overrides: &BuildOverrides<'_>,
    ) -> Result<PreparedAgent, AgentError> {
        let agent = self.get(principal, agent_id).await?;
        self.prepare(principal, &agent, extra_tools, name, overrides).await
    }

    async fn prepare(
        &self,
        principal: &Principal,
        agent: &Agent,
        extra_tools: Vec<Arc<dyn CallableTool>>,
        name: Option<&str>,
        overrides: &BuildOverrides<'_>,
    ) -> Result<PreparedAgent, AgentError> {
        if !agent.is_enabled {
            return Err(AgentError::Disabled);
        }
        let model = self.chat_model(principal, agent.model_id).await?;

        let permitted = resolve_allowed_tools(&agent.bindings.tools, &agent.config.tool_policy, overrides.tool_overrides);
        let mut tools: Vec<Arc<dyn CallableTool>> = Vec::with_capacity(permitted.len() + extra_tools.len());
        for tool_id in permitted {
            match self.tools.callable(principal, tool_id).await? {
                Some(tool) => tools.push(Arc::new(tool)),
                None => warn!(agent_id = %agent.id, tool_id = %tool_id, "Skipping unresolved agent tool"),
            }
        }
        tools.extend(extra_tools);

        Ok(PreparedAgent {
            name: name.unwrap_or(&agent.name).to_string(),
            model,
            system_prompt: agent.config.system_prompt().to_string(),
            tools,
            params: LlmParams::resolve(&agent.config, overrides.llm_overrides),
            limits: agent.config.runtime_limits,
            max_tool_calls: agent.config.tool_policy.max_tool_calls,
        })
    }

    async fn chat_model(&self, principal: &Principal, model_id: ModelId) -> Result<Arc<dyn ChatModel>, AgentError> {
        let model = self.check_model(principal, model_id).await?;
        if !model.is_enabled {
            return Err(AgentError::ConfigInvalid("Referenced AI model is disabled".to_string()));
        }
        let connector = self
            .models
            .connector(&model.model_type)
            .ok_or_else(|| AgentError::ConfigInvalid("LLM connector not implemented".to_string()))?;
        let config = self.models.decrypt_config(&model)?;
        connector.chat_model(&config).map_err(|e| match e {
            ModelError::NotImplemented(_) => AgentError::ConfigInvalid("LLM connector not implemented".to_string()),
            other => AgentError::Model(other),
        })
    }

    async fn check_model(&self, principal: &Principal, model_id: ModelId) -> Result<AiModel, AgentError> {
        let model = self
            .models
            .find(principal, model_id)
            .await?
            .ok_or_else(|| AgentError::ConfigInvalid("Referenced AI model not found in tenant".to_string()))?;
        if model.category != ModelCategory::Llm {
            return Err(AgentError::ConfigInvalid("Agent requires an LLM category model".to_string()));
        }
        Ok(model)
    }

    async fn check_tools(&self, principal: &Principal, ids: &[ToolId]) -> Result<(), AgentError> {
        let mut missing = Vec::new();
        for id in ids {
            let usable = self
                .tools
                .find(principal, *id)
                .await?
                .is_some_and(|t| t.is_enabled);
            if !usable {
                missing.push(id.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::ConfigInvalid(format!(
                "Unknown/disabled tools referenced: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{fixture, llm_model};
    use crate::domain::agent::RunFinish;
    use crate::domain::error::{Classified, ErrorKind};
    use crate::domain::llm::MessageRole;
    use crate::infrastructure::connectors::ScriptedReply;
    use serde_json::json;

    fn agent_request(model_id: ModelId, config: Value) -> CreateAgentRequest {
        CreateAgentRequest {
            name: "Support".into(),
            description: None,
            tags: None,
            agent_type: None,
            model_id,
            config,
            config_schema_version: None,
            bindings: AgentBindings::default(),
            is_enabled: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_and_model_checks() {
        let f = fixture();
        let model = llm_model(&f).await;
        let agent = f
            .platform
            .agents
            .create(&f.principal, agent_request(model, json!({})))
            .await
            .unwrap();
        assert_eq!(agent.agent_type, DEFAULT_AGENT_TYPE);
        assert!(agent.is_enabled);

        let err = f
            .platform
            .agents
            .create(&f.principal, agent_request(ModelId::new(), json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Referenced AI model not found in tenant");
        assert_eq!(err.code(), "AGENT_CONFIG_INVALID");

        let err = f
            .platform
            .agents
            .create(&f.principal, agent_request(model, json!({"runtime_limits": {"max_steps": 0}})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);

        let mut request = agent_request(model, json!({}));
        request.bindings.tools.push(ToolId::new());
        let err = f.platform.agents.create(&f.principal, request).await.unwrap_err();
        assert!(err.to_string().starts_with("Unknown/disabled tools referenced"));
    }

    #[tokio::test]
    async fn test_invoke_renders_prompt_and_reports_usage() {
        let f = fixture();
        let model = llm_model(&f).await;
        let agent = f
            .platform
            .agents
            .create(
                &f.principal,
                agent_request(
                    model,
                    json!({"prompt_template": "Reply in {{variables.lang}}: {{input}}", "system_prompt": "Be brief."}),
                ),
            )
            .await
            .unwrap();
        f.chat.push(ScriptedReply::text("Bonjour"));

        let result = f
            .platform
            .agents
            .invoke(
                &f.principal,
                agent.id,
                AgentInvocation {
                    input: "hello".into(),
                    variables: json!({"lang": "French"}).as_object().cloned().unwrap(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.output, "Bonjour");
        assert_eq!(result.steps, 1);
        assert_eq!(result.finish_reason, RunFinish::Stop);

        let request = f.chat.requests().pop().unwrap();
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].text(), "Be brief.");
        assert_eq!(request.messages[1].text(), "Reply in French: hello");
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_disabled_agent_and_model() {
        let f = fixture();
        let model = llm_model(&f).await;
        let agent = f.platform.agents.create(&f.principal, agent_request(model, json!({}))).await.unwrap();

        f.platform.models.set_enabled(&f.principal, model, false).await.unwrap();
        let err = f
            .platform
            .agents
            .invoke(&f.principal, agent.id, AgentInvocation::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Referenced AI model is disabled");

        f.platform.agents.set_enabled(&f.principal, agent.id, false).await.unwrap();
        let err = f
            .platform
            .agents
            .invoke(&f.principal, agent.id, AgentInvocation::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disabled);
    }

    #[tokio::test]
    async fn test_validate_and_tenant_isolation() {
        let f = fixture();
        let model = llm_model(&f).await;
        let agent = f.platform.agents.create(&f.principal, agent_request(model, json!({}))).await.unwrap();
        assert_eq!(
            f.platform.agents.validate(&f.principal, agent.id).await.unwrap(),
            ValidationStatus::ok()
        );

        let stranger = Principal::new("u9", "t9");
        let err = f.platform.agents.get(&stranger, agent.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
