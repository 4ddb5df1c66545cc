// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent
//!
//! The `Agent` aggregate: an LLM-backed actor bound to one LLM-category model
//! and an ordered list of tools, plus the value objects that shape one
//! invocation (prompt rendering, tool policy, runtime limits).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agent configuration and invocation contracts
//! - **Related:** `application::agent_service`, `application::agent_executor`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{Classified, ErrorKind};
use crate::domain::llm::{ChatMessage, TokenUsage};
use crate::domain::model::{ModelError, ModelId};
use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{TenantId, UserId};
use crate::domain::tool::{ToolError, ToolId};

entity_id!(
    /// Unique identifier for an [`Agent`].
    AgentId
);

pub const DEFAULT_AGENT_TYPE: &str = "langgraph.single";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI agent.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<Value>,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub model_id: ModelId,
    #[serde(default)]
    pub config: AgentConfig,
    pub config_schema_version: Option<String>,
    #[serde(default)]
    pub bindings: AgentBindings,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentBindings {
    /// Ordered; the order is preserved through tool policy filtering.
    #[serde(default)]
    pub tools: Vec<ToolId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub llm_params: Map<String, Value>,
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    #[serde(default)]
    pub runtime_limits: RuntimeLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// `None`: every bound tool. `Some([])`: none.
    #[serde(default)]
    pub allowed_tools: Option<Vec<ToolId>>,
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            allowed_tools: None,
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLimits {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_max_duration_s")]
    pub max_duration_s: u32,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_duration_s: default_max_duration_s(),
        }
    }
}

fn default_max_tool_calls() -> u32 {
    8
}

fn default_max_steps() -> u32 {
    16
}

fn default_max_duration_s() -> u32 {
    60
}

impl AgentConfig {
    /// Parse a raw config object. A `null` config is the default config.
    pub fn from_value(value: &Value) -> Result<Self, AgentError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: AgentConfig = serde_json::from_value(value.clone())
            .map_err(|e| AgentError::ConfigInvalid(format!("Invalid agent config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        let limits = &self.runtime_limits;
        if !(1..=64).contains(&limits.max_steps) {
            return Err(AgentError::ConfigInvalid(
                "runtime_limits.max_steps out of bounds".to_string(),
            ));
        }
        if !(1..=300).contains(&limits.max_duration_s) {
            return Err(AgentError::ConfigInvalid(
                "runtime_limits.max_duration_s out of bounds".to_string(),
            ));
        }
        if self.tool_policy.max_tool_calls > 32 {
            return Err(AgentError::ConfigInvalid(
                "tool_policy.max_tool_calls out of bounds".to_string(),
            ));
        }
        Ok(())
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

/// Per-invocation replacement of the tool policy's allow-list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOverrides {
    #[serde(default)]
    pub allowed_tools: Option<Vec<ToolId>>,
}

/// Bound tools permitted for one invocation, in binding order.
pub fn resolve_allowed_tools(
    bound: &[ToolId],
    policy: &ToolPolicy,
    overrides: Option<&ToolOverrides>,
) -> Vec<ToolId> {
    let allowed = overrides
        .and_then(|o| o.allowed_tools.as_ref())
        .or(policy.allowed_tools.as_ref());
    match allowed {
        None => bound.to_vec(),
        Some(list) => bound.iter().filter(|id| list.contains(id)).copied().collect(),
    }
}

/// Literal substitution of `{{input}}` and `{{variables.<key>}}`. An empty
/// template renders to the input.
pub fn render_prompt(template: &str, input: &str, variables: &Map<String, Value>) -> String {
    let template = template.trim();
    let input = input.trim();
    if template.is_empty() {
        return input.to_string();
    }
    let mut rendered = template.replace("{{input}}", input);
    for (key, value) in variables {
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&format!("{{{{variables.{}}}}}", key), &replacement);
    }
    rendered
}

/// Input of one agent invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInvocation {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub tool_overrides: Option<ToolOverrides>,
    #[serde(default)]
    pub llm_overrides: Option<Map<String, Value>>,
    /// Prior conversation replayed before the rendered prompt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFinish {
    Stop,
    MaxSteps,
    DeadlineExceeded,
}

impl RunFinish {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFinish::Stop => "stop",
            RunFinish::MaxSteps => "max_steps",
            RunFinish::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub output: String,
    pub steps: u32,
    pub tool_calls: u32,
    pub tokens: TokenUsage,
    pub latency_ms: u64,
    pub finish_reason: RunFinish,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Agent is disabled")]
    Disabled,

    #[error("{0}")]
    ConfigInvalid(String),

    #[error("Model call failed: {0}")]
    Llm(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl Classified for AgentError {
    fn kind(&self) -> ErrorKind {
        match self {
            AgentError::NotFound => ErrorKind::NotFound,
            AgentError::Conflict(_) | AgentError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            AgentError::Disabled => ErrorKind::Disabled,
            AgentError::ConfigInvalid(_) | AgentError::Llm(_) => ErrorKind::ValidationInvalid,
            AgentError::Model(e) => e.kind(),
            AgentError::Tool(e) => e.kind(),
            AgentError::Repository(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AgentError::NotFound => "AGENT_NOT_FOUND",
            AgentError::Disabled => "AGENT_DISABLED",
            AgentError::ConfigInvalid(_) | AgentError::Llm(_) => "AGENT_CONFIG_INVALID",
            _ => match self.kind() {
                ErrorKind::NotFound => "AGENT_NOT_FOUND",
                ErrorKind::Conflict => "AGENT_CONFLICT",
                ErrorKind::Disabled => "AGENT_DISABLED",
                ErrorKind::ValidationInvalid => "AGENT_CONFIG_INVALID",
                ErrorKind::UnknownCapability => "AGENT_UNKNOWN_CAPABILITY",
                ErrorKind::NotImplemented => "AGENT_NOT_IMPLEMENTED",
                ErrorKind::Internal => "AGENT_INTERNAL",
            },
        }
    }
}
