// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Tool
//!
//! Tool declarations, the per-kind [`ToolAdapter`] contract and the
//! [`CallableTool`] shape used inside an agent's tool-calling loop.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Kind-agnostic tool model; adapters live in `infrastructure::tools`
//!
//! An [`AgentTool`] is pure data: `kind` selects the adapter, `bindings` name
//! the datasets/models it may touch and `config` carries the adapter's bounds.
//! Nothing here executes queries; adapters go through the
//! [`DatasetGateway`] and [`TextEmbedder`] handed in a [`ToolContext`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use crate::domain::dataset::{DatasetError, DatasetGateway};
use crate::domain::error::{Classified, ErrorKind};
use crate::domain::llm::{ChatMessage, ToolSpec};
use crate::domain::model::{ModelError, TextEmbedder};
use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{Principal, TenantId, UserId};

entity_id!(
    /// Unique identifier for an [`AgentTool`].
    ToolId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Dataset,
    AiModel,
    Datasource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBinding {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolBindings {
    #[serde(default)]
    pub resources: Vec<ResourceBinding>,
}

impl ToolBindings {
    /// First resource bound under `role` with the given type.
    pub fn find(&self, role: &str, resource_type: ResourceType) -> Option<&ResourceBinding> {
        self.resources
            .iter()
            .find(|r| r.role == role && r.resource_type == resource_type)
    }

    /// Like [`ToolBindings::find`] but produces the structural validation error.
    pub fn require(&self, role: &str, resource_type: ResourceType) -> Result<&ResourceBinding, ToolError> {
        self.find(role, resource_type).ok_or_else(|| {
            ToolError::Validation(format!(
                "Missing required binding: role '{}' of type '{}'",
                role,
                resource_type.as_str()
            ))
        })
    }
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Dataset => "dataset",
            ResourceType::AiModel => "ai_model",
            ResourceType::Datasource => "datasource",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTool {
    pub id: ToolId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub provider: Option<String>,
    #[serde(default)]
    pub bindings: ToolBindings,
    #[serde(default)]
    pub config: Value,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// One entry of the "kinds" listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolKindInfo {
    pub kind: String,
    pub provider: Option<String>,
    pub display_name: String,
    pub json_schema: Value,
}

/// Collaborators available to an adapter while it executes.
#[derive(Clone)]
pub struct ToolContext {
    pub principal: Principal,
    pub datasets: Arc<dyn DatasetGateway>,
    pub embedder: Arc<dyn TextEmbedder>,
}

/// Behaviour for one tool kind (optionally specialised per provider).
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn kind(&self) -> &str;

    fn provider(&self) -> Option<&str> {
        None
    }

    fn display_name(&self) -> &str;

    /// JSON schema of the tool `config`.
    fn config_schema(&self) -> Value;

    /// JSON schema of the invocation payload, offered to the model as the
    /// tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Structural presence of the required roles/types. Existence and tenancy
    /// of the bound resources are checked by the service.
    fn validate_bindings(&self, bindings: &ToolBindings) -> Result<(), ToolError>;

    fn validate_config(&self, config: &Value) -> Result<(), ToolError>;

    async fn invoke(&self, tool: &AgentTool, payload: &Value, ctx: &ToolContext) -> Result<Value, ToolError>;

    fn info(&self) -> ToolKindInfo {
        ToolKindInfo {
            kind: self.kind().to_string(),
            provider: self.provider().map(str::to_string),
            display_name: self.display_name().to_string(),
            json_schema: self.config_schema(),
        }
    }
}

/// Read-only view of the running conversation handed to a tool call.
pub struct ToolCallFrame<'a> {
    pub call_id: &'a str,
    pub agent_name: &'a str,
    pub transcript: &'a [ChatMessage],
}

/// Control transfer requested by a handoff tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub destination: String,
    /// Appended to the transcript in order; the first one answers the call.
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Output(Value),
    Handoff(Handoff),
}

/// A tool as the model sees it: name, description, parameters and a call.
#[async_trait]
pub trait CallableTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Value;

    async fn call(&self, args: Value, frame: &ToolCallFrame<'_>) -> Result<ToolOutcome, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("Invalid tool name regex"));

/// Model-facing function name for a tool display name.
pub fn callable_name(display_name: &str, id: ToolId) -> String {
    let sanitized = INVALID_NAME_CHARS.replace_all(display_name.trim(), "_");
    let truncated: String = sanitized.chars().take(64).collect();
    if truncated.is_empty() {
        let simple = id.0.simple().to_string();
        format!("tool_{}", &simple[..8])
    } else {
        truncated
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Agent tool not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Agent tool is disabled")]
    Disabled,

    #[error("Unknown tool kind: {0}")]
    UnknownKind(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl Classified for ToolError {
    fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound => ErrorKind::NotFound,
            ToolError::Conflict(_) | ToolError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            ToolError::Validation(_) => ErrorKind::ValidationInvalid,
            ToolError::Disabled => ErrorKind::Disabled,
            ToolError::UnknownKind(_) => ErrorKind::UnknownCapability,
            ToolError::NotImplemented(_) => ErrorKind::NotImplemented,
            ToolError::Dataset(e) => e.kind(),
            ToolError::Model(e) => e.kind(),
            ToolError::Repository(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "AGENT_TOOL_NOT_FOUND",
            ErrorKind::Conflict => "AGENT_TOOL_CONFLICT",
            ErrorKind::ValidationInvalid => "AGENT_TOOL_VALIDATION_ERROR",
            ErrorKind::Disabled => "AGENT_TOOL_DISABLED",
            ErrorKind::UnknownCapability => "AGENT_TOOL_UNKNOWN_KIND",
            ErrorKind::NotImplemented => "AGENT_TOOL_NOT_IMPLEMENTED",
            ErrorKind::Internal => "AGENT_TOOL_INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_callable_name_sanitizes_and_truncates() {
        let id = ToolId::new();
        assert_eq!(callable_name("Orders lookup (v2)", id), "Orders_lookup__v2_");
        assert_eq!(callable_name(&"x".repeat(80), id).len(), 64);
    }

    #[test]
    fn test_callable_name_falls_back_to_id_prefix() {
        let id = ToolId::from_string("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap();
        assert_eq!(callable_name("   ", id), "tool_1b4e28ba");
    }

    #[test]
    fn test_bindings_lookup_by_role_and_type() {
        let bindings: ToolBindings = serde_json::from_value(json!({
            "resources": [
                {"type": "dataset", "id": Uuid::new_v4(), "role": "vector_index"},
                {"type": "ai_model", "id": Uuid::new_v4(), "role": "embedding_model"}
            ]
        }))
        .unwrap();
        assert!(bindings.find("embedding_model", ResourceType::AiModel).is_some());
        assert!(bindings.find("embedding_model", ResourceType::Dataset).is_none());
        let err = bindings.require("primary", ResourceType::Dataset).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    }

    #[test]
    fn test_dataset_errors_keep_their_kind() {
        let err = ToolError::from(DatasetError::NotImplemented("blob".into()));
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert_eq!(err.code(), "AGENT_TOOL_NOT_IMPLEMENTED");
    }
}
