// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AI Model Aggregate and Connector Contract
//!
//! An [`AiModel`] is a tenant-owned, encrypted provider configuration
//! (`llm.openai`, `embedding.openai`, ...). The behaviour behind a type slug is
//! a [`ModelConnector`], looked up in the connector registry.
//!
//! Connectivity problems are operational, not exceptional:
//! [`ModelConnector::test_connection`] always returns a
//! [`ConnectionTestResult`] whose `status` the caller inspects, and
//! [`ModelConnector::get_capabilities`] degrades to an unknown capability set
//! instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::{Classified, ErrorKind};
use crate::domain::llm::ChatModel;
use crate::domain::redaction::RedactionMap;
use crate::domain::repository::RepositoryError;
use crate::domain::secrets::CipherError;
use crate::domain::tenant::{Principal, TenantId, UserId};

entity_id!(
    /// Unique identifier for an [`AiModel`].
    ModelId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Llm,
    Embedding,
}

impl ModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::Llm => "llm",
            ModelCategory::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "llm" => Ok(ModelCategory::Llm),
            "embedding" => Ok(ModelCategory::Embedding),
            other => Err(ModelError::Validation(format!(
                "Unknown model category '{}'; expected llm or embedding",
                other
            ))),
        }
    }
}

/// Tenant-owned model configuration. `config_encrypted` is the only place the
/// plaintext configuration is kept, and only in encrypted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    pub id: ModelId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub category: ModelCategory,
    pub description: Option<String>,
    pub tags: Option<Value>,
    pub is_enabled: bool,
    #[serde(with = "crate::domain::model::base64_bytes")]
    pub config_encrypted: Vec<u8>,
    pub config_schema_version: Option<String>,
    #[serde(default)]
    pub redaction_map: RedactionMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorSource {
    Builtin,
    Plugin,
}

/// Static description of a connector, also served as the "types" listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    #[serde(rename = "type")]
    pub type_slug: String,
    pub display_name: String,
    pub category: ModelCategory,
    pub version: String,
    pub json_schema: Value,
    pub source: ConnectorSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub status: ConnectionStatus,
    pub latency_ms: u64,
    /// True when a (billable) inference call was made.
    pub billable: bool,
    /// `{"endpoint": ...}` on success, `{"error": "auth_failed" | "rate_limited"
    /// | "timeout" | "request_error" | "status_<code>", ...}` on failure.
    pub details: Value,
}

impl ConnectionTestResult {
    pub fn is_ok(&self) -> bool {
        self.status == ConnectionStatus::Ok
    }

    /// Classified failure detail, when the probe failed.
    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<BTreeMap<String, u32>>,
    pub api_style: String,
}

impl ModelCapabilities {
    pub fn unknown() -> Self {
        Self {
            models: Vec::new(),
            embedding_dimensions: None,
            api_style: "unknown".to_string(),
        }
    }
}

/// Behaviour for one model type slug.
#[async_trait]
pub trait ModelConnector: Send + Sync {
    fn metadata(&self) -> &ConnectorMetadata;

    /// Cheap, local structural and semantic check. Called on every
    /// create/update.
    fn validate_config(&self, config: &Value) -> Result<(), ModelError>;

    /// Deep copy with secret keys replaced by the redaction sentinel.
    fn redact_config(&self, config: &Value) -> Value;

    /// Short connectivity/auth probe. Non-billable unless
    /// `allow_smoke_inference` is set.
    async fn test_connection(
        &self,
        config: &Value,
        timeout: Duration,
        allow_smoke_inference: bool,
    ) -> ConnectionTestResult;

    /// Best-effort introspection; never fails.
    async fn get_capabilities(&self, config: &Value) -> ModelCapabilities;

    async fn embed_texts(&self, _config: &Value, _texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Err(ModelError::NotImplemented(format!(
            "Connector '{}' does not support embeddings",
            self.metadata().type_slug
        )))
    }

    fn chat_model(&self, _config: &Value) -> Result<Arc<dyn ChatModel>, ModelError> {
        Err(ModelError::NotImplemented(format!(
            "Connector '{}' does not support chat",
            self.metadata().type_slug
        )))
    }
}

/// Embedding capability as seen by tool adapters. Implemented by the model
/// service, which enforces tenancy, enabled flag and category.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_texts(
        &self,
        principal: &Principal,
        model_id: ModelId,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("AI Model not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("AI Model is disabled")]
    Disabled,

    #[error("Unknown AI model type: {0}")]
    UnknownType(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Secret handling failed: {0}")]
    Cipher(#[from] CipherError),
}

impl Classified for ModelError {
    fn kind(&self) -> ErrorKind {
        match self {
            ModelError::NotFound => ErrorKind::NotFound,
            ModelError::Conflict(_) => ErrorKind::Conflict,
            ModelError::Validation(_) | ModelError::Provider(_) => ErrorKind::ValidationInvalid,
            ModelError::Disabled => ErrorKind::Disabled,
            ModelError::UnknownType(_) => ErrorKind::UnknownCapability,
            ModelError::NotImplemented(_) => ErrorKind::NotImplemented,
            ModelError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            ModelError::Repository(_) | ModelError::Cipher(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "AIMODEL_NOT_FOUND",
            ErrorKind::Conflict => "AIMODEL_CONFLICT",
            ErrorKind::ValidationInvalid => "AIMODEL_VALIDATION_ERROR",
            ErrorKind::Disabled => "AIMODEL_DISABLED",
            ErrorKind::UnknownCapability => "AIMODEL_UNKNOWN_TYPE",
            ErrorKind::NotImplemented => "AIMODEL_NOT_IMPLEMENTED",
            ErrorKind::Internal => "AIMODEL_INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("llm".parse::<ModelCategory>().unwrap(), ModelCategory::Llm);
        assert_eq!(" embedding ".parse::<ModelCategory>().unwrap(), ModelCategory::Embedding);
        let err = "vision".parse::<ModelCategory>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    }

    #[test]
    fn test_unknown_type_is_unknown_capability() {
        let err = ModelError::UnknownType("llm.mystery".into());
        assert_eq!(err.kind(), ErrorKind::UnknownCapability);
        assert_eq!(err.code(), "AIMODEL_UNKNOWN_TYPE");
    }
}
