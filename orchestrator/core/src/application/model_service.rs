// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AI Model Service
//!
//! CRUD and operational use cases for tenant-owned model configurations.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates connector lookup, config validation, encryption
//!   at rest and redaction for [`AiModel`]
//! - **Related:** `domain::model`, `domain::redaction`, `infrastructure::connectors`
//!
//! Plaintext configuration exists only inside a single call. Everything
//! persisted goes through the [`SecretCipher`]; everything returned is masked
//! with the stored [`RedactionMap`](crate::domain::redaction::RedactionMap).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::application::{check_name, Listing, Paging};
use crate::domain::model::{
    AiModel, ConnectionTestResult, ConnectorMetadata, ModelCapabilities, ModelCategory, ModelConnector, ModelError,
    ModelId, TextEmbedder,
};
use crate::domain::platform_config::ConnectorsConfig;
use crate::domain::redaction::{apply_redaction, merge_partial_config, RedactionMap};
use crate::domain::repository::{ModelFilter, ModelRepository};
use crate::domain::secrets::SecretCipher;
use crate::domain::tenant::Principal;
use crate::infrastructure::registry::ConnectorRegistry;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    /// Must agree with the connector's category when given.
    #[serde(default)]
    pub category: Option<ModelCategory>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub config_schema_version: Option<String>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// Partial patch. `config` is deep-merged into the stored configuration;
/// secret values sent back as the redaction sentinel are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateModelRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub config_schema_version: Option<String>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// Read model of an [`AiModel`]; `config` is always masked.
#[derive(Debug, Clone, Serialize)]
pub struct AiModelView {
    pub id: ModelId,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub category: ModelCategory,
    pub description: Option<String>,
    pub tags: Option<Value>,
    pub is_enabled: bool,
    pub config: Value,
    pub config_schema_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct AiModelService {
    repo: Arc<dyn ModelRepository>,
    connectors: ConnectorRegistry,
    cipher: Arc<dyn SecretCipher>,
    paging: Paging,
    probes: ConnectorsConfig,
}

impl AiModelService {
    pub fn new(
        repo: Arc<dyn ModelRepository>,
        connectors: ConnectorRegistry,
        cipher: Arc<dyn SecretCipher>,
        paging: Paging,
        probes: ConnectorsConfig,
    ) -> Self {
        Self {
            repo,
            connectors,
            cipher,
            paging,
            probes,
        }
    }

    pub fn connector(&self, model_type: &str) -> Option<Arc<dyn ModelConnector>> {
        self.connectors.get(model_type, None)
    }

    fn require_connector(&self, model_type: &str) -> Result<Arc<dyn ModelConnector>, ModelError> {
        self.connector(model_type)
            .ok_or_else(|| ModelError::UnknownType(model_type.to_string()))
    }

    /// Registered connector metadata ordered by type slug.
    pub fn list_types(&self) -> Vec<ConnectorMetadata> {
        self.connectors
            .list()
            .into_iter()
            .map(|(_, connector)| connector.metadata().clone())
            .collect()
    }

    pub async fn create(&self, principal: &Principal, request: CreateModelRequest) -> Result<AiModelView, ModelError> {
        let name = check_name("name", &request.name, 128).map_err(ModelError::Validation)?;
        let connector = self.require_connector(request.model_type.trim())?;
        let metadata = connector.metadata();
        if let Some(category) = request.category {
            if category != metadata.category {
                return Err(ModelError::Validation(format!(
                    "Model type '{}' is a {} connector, not {}",
                    metadata.type_slug, metadata.category, category
                )));
            }
        }

        connector.validate_config(&request.config)?;
        let redacted = connector.redact_config(&request.config);
        let redaction_map = RedactionMap::from_redacted(&redacted);
        let config_encrypted = self.cipher.encrypt(&request.config)?;

        let now = Utc::now();
        let model = AiModel {
            id: ModelId::new(),
            tenant_id: principal.tenant_id.clone(),
            owner_id: principal.user_id.clone(),
            name,
            model_type: metadata.type_slug.clone(),
            category: metadata.category,
            description: request.description,
            tags: request.tags,
            is_enabled: request.is_enabled.unwrap_or(true),
            config_encrypted,
            config_schema_version: request.config_schema_version,
            redaction_map,
            created_at: now,
            updated_at: now,
            created_by: principal.user_id.clone(),
            updated_by: principal.user_id.clone(),
            deleted_at: None,
        };
        self.repo.insert(&model).await?;
        info!(
            model_id = %model.id,
            tenant = %model.tenant_id,
            model_type = %model.model_type,
            secret_paths = model.redaction_map.secret_paths.len(),
            "AI model created"
        );
        Ok(Self::view(&model, redacted))
    }

    pub async fn get(&self, principal: &Principal, id: ModelId) -> Result<AiModelView, ModelError> {
        let model = self.load(principal, id).await?;
        self.masked_view(&model)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &ModelFilter,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<AiModelView>, ModelError> {
        let page = self.paging.page(limit, offset);
        let (models, total) = self.repo.list(&principal.tenant_id, filter, page).await?;
        let items = models
            .iter()
            .map(|m| self.masked_view(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: ModelId,
        request: UpdateModelRequest,
    ) -> Result<AiModelView, ModelError> {
        let mut model = self.load(principal, id).await?;

        if let Some(name) = &request.name {
            model.name = check_name("name", name, 128).map_err(ModelError::Validation)?;
        }
        if let Some(description) = request.description {
            model.description = Some(description);
        }
        if let Some(tags) = request.tags {
            model.tags = Some(tags);
        }
        if let Some(version) = request.config_schema_version {
            model.config_schema_version = Some(version);
        }
        if let Some(enabled) = request.is_enabled {
            model.is_enabled = enabled;
        }

        let redacted = match &request.config {
            Some(patch) => {
                let connector = self.require_connector(&model.model_type)?;
                let current = self.cipher.decrypt(&model.config_encrypted)?;
                let merged = merge_partial_config(&current, patch);
                connector.validate_config(&merged)?;
                let redacted = connector.redact_config(&merged);
                model.redaction_map = RedactionMap::from_redacted(&redacted);
                model.config_encrypted = self.cipher.encrypt(&merged)?;
                Some(redacted)
            }
            None => None,
        };

        model.updated_at = Utc::now();
        model.updated_by = principal.user_id.clone();
        self.repo.update(&model).await?;
        info!(model_id = %model.id, config_changed = redacted.is_some(), "AI model updated");

        match redacted {
            Some(redacted) => Ok(Self::view(&model, redacted)),
            None => self.masked_view(&model),
        }
    }

    pub async fn delete(&self, principal: &Principal, id: ModelId) -> Result<(), ModelError> {
        let mut model = self.load(principal, id).await?;
        let now = Utc::now();
        model.deleted_at = Some(now);
        model.updated_at = now;
        model.updated_by = principal.user_id.clone();
        self.repo.update(&model).await?;
        info!(model_id = %id, "AI model deleted");
        Ok(())
    }

    pub async fn set_enabled(&self, principal: &Principal, id: ModelId, enabled: bool) -> Result<AiModelView, ModelError> {
        self.update(
            principal,
            id,
            UpdateModelRequest {
                is_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Probe a stored model. `timeout_s` defaults to the configured probe
    /// timeout and is capped at the configured maximum.
    pub async fn test_connection(
        &self,
        principal: &Principal,
        id: ModelId,
        timeout_s: Option<u64>,
        allow_smoke_inference: bool,
    ) -> Result<ConnectionTestResult, ModelError> {
        let model = self.load(principal, id).await?;
        let connector = self.require_connector(&model.model_type)?;
        let config = self.cipher.decrypt(&model.config_encrypted)?;
        let timeout = self.probe_timeout(timeout_s);
        let result = connector.test_connection(&config, timeout, allow_smoke_inference).await;
        info!(
            model_id = %id,
            ok = result.is_ok(),
            latency_ms = result.latency_ms,
            billable = result.billable,
            error = result.error().unwrap_or(""),
            "AI model connection tested"
        );
        Ok(result)
    }

    /// Probe an unsaved configuration (validated first).
    pub async fn probe_config(
        &self,
        model_type: &str,
        config: &Value,
        timeout_s: Option<u64>,
        allow_smoke_inference: bool,
    ) -> Result<ConnectionTestResult, ModelError> {
        let connector = self.require_connector(model_type)?;
        connector.validate_config(config)?;
        Ok(connector
            .test_connection(config, self.probe_timeout(timeout_s), allow_smoke_inference)
            .await)
    }

    pub async fn capabilities(&self, principal: &Principal, id: ModelId) -> Result<ModelCapabilities, ModelError> {
        let model = self.load(principal, id).await?;
        let connector = self.require_connector(&model.model_type)?;
        let config = self.cipher.decrypt(&model.config_encrypted)?;
        Ok(connector.get_capabilities(&config).await)
    }

    /// Raw tenant-scoped lookup for other services; `None` when absent.
    pub async fn find(&self, principal: &Principal, id: ModelId) -> Result<Option<AiModel>, ModelError> {
        Ok(self.repo.find(&principal.tenant_id, id).await?)
    }

    /// Plaintext configuration for an inference call. Never log the result.
    pub fn decrypt_config(&self, model: &AiModel) -> Result<Value, ModelError> {
        Ok(self.cipher.decrypt(&model.config_encrypted)?)
    }

    fn probe_timeout(&self, requested: Option<u64>) -> Duration {
        let max = self.probes.max_probe_timeout_s.max(1);
        let secs = requested.unwrap_or(self.probes.probe_timeout_s).clamp(1, max);
        Duration::from_secs(secs)
    }

    async fn load(&self, principal: &Principal, id: ModelId) -> Result<AiModel, ModelError> {
        self.repo
            .find(&principal.tenant_id, id)
            .await?
            .ok_or(ModelError::NotFound)
    }

    fn masked_view(&self, model: &AiModel) -> Result<AiModelView, ModelError> {
        let plain = self.cipher.decrypt(&model.config_encrypted)?;
        Ok(Self::view(model, apply_redaction(&plain, &model.redaction_map)))
    }

    fn view(model: &AiModel, masked_config: Value) -> AiModelView {
        AiModelView {
            id: model.id,
            name: model.name.clone(),
            model_type: model.model_type.clone(),
            category: model.category,
            description: model.description.clone(),
            tags: model.tags.clone(),
            is_enabled: model.is_enabled,
            config: masked_config,
            config_schema_version: model.config_schema_version.clone(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl TextEmbedder for AiModelService {
    async fn embed_texts(
        &self,
        principal: &Principal,
        model_id: ModelId,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        let model = self.load(principal, model_id).await?;
        if model.category != ModelCategory::Embedding {
            return Err(ModelError::Validation(
                "Bound model is not an embedding model".to_string(),
            ));
        }
        if !model.is_enabled {
            return Err(ModelError::Disabled);
        }
        let connector = self.require_connector(&model.model_type)?;
        let config = self.cipher.decrypt(&model.config_encrypted)?;
        debug!(model_id = %model_id, texts = texts.len(), "Embedding texts");
        connector.embed_texts(&config, texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{Classified, ErrorKind};
    use crate::domain::redaction::REDACTED;
    use crate::infrastructure::connectors::{OpenAiChatConnector, ScriptedConnector};
    use crate::infrastructure::repositories::InMemoryModelRepository;
    use crate::infrastructure::secrets::AesGcmCipher;
    use serde_json::json;

    fn service() -> (AiModelService, Arc<InMemoryModelRepository>) {
        let repo = Arc::new(InMemoryModelRepository::new());
        let connectors = ConnectorRegistry::builder("connectors")
            .register("llm.openai", None, Arc::new(OpenAiChatConnector::new()))
            .register("embedding.scripted", None, Arc::new(ScriptedConnector::embeddings(4)))
            .build();
        let cipher = Arc::new(AesGcmCipher::new("test-secret").unwrap());
        let service = AiModelService::new(
            repo.clone(),
            connectors,
            cipher,
            Paging::default(),
            ConnectorsConfig::default(),
        );
        (service, repo)
    }

    fn openai(name: &str) -> CreateModelRequest {
        CreateModelRequest {
            name: name.to_string(),
            model_type: "llm.openai".to_string(),
            category: None,
            description: None,
            tags: None,
            config: json!({"api_key": "sk-live-xxx", "default_model": "gpt-4o"}),
            config_schema_version: None,
            is_enabled: None,
        }
    }

    #[tokio::test]
    async fn test_create_encrypts_and_masks() {
        let (service, repo) = service();
        let principal = Principal::new("u1", "t1");
        let view = service.create(&principal, openai("gpt")).await.unwrap();
        assert_eq!(view.config["api_key"], REDACTED);
        assert_eq!(view.config["default_model"], "gpt-4o");
        assert_eq!(view.category, ModelCategory::Llm);

        let stored = repo.find(&principal.tenant_id, view.id).await.unwrap().unwrap();
        let raw = String::from_utf8_lossy(&stored.config_encrypted).to_string();
        assert!(!raw.contains("sk-live-xxx"));
        assert_eq!(stored.redaction_map.secret_paths, vec!["api_key".to_string()]);
    }

    #[tokio::test]
    async fn test_update_keeps_secret_when_sentinel_resubmitted() {
        let (service, _) = service();
        let principal = Principal::new("u1", "t1");
        let view = service.create(&principal, openai("gpt")).await.unwrap();

        let patch = UpdateModelRequest {
            config: Some(json!({"api_key": REDACTED, "default_model": "gpt-4o-mini"})),
            ..Default::default()
        };
        let updated = service.update(&principal, view.id, patch).await.unwrap();
        assert_eq!(updated.config["default_model"], "gpt-4o-mini");

        let model = service.find(&principal, view.id).await.unwrap().unwrap();
        let plain = service.decrypt_config(&model).unwrap();
        assert_eq!(plain["api_key"], "sk-live-xxx");
    }

    #[tokio::test]
    async fn test_unknown_type_and_invalid_config() {
        let (service, _) = service();
        let principal = Principal::new("u1", "t1");

        let mut request = openai("m");
        request.model_type = "llm.mystery".into();
        let err = service.create(&principal, request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCapability);

        let mut request = openai("m");
        request.config = json!({"api_key": ""});
        let err = service.create(&principal, request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    }

    #[tokio::test]
    async fn test_duplicate_name_and_cross_tenant() {
        let (service, _) = service();
        let principal = Principal::new("u1", "t1");
        let view = service.create(&principal, openai("gpt")).await.unwrap();
        let err = service.create(&principal, openai("gpt")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let other = Principal::new("u2", "t2");
        let err = service.get(&other, view.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        service.delete(&principal, view.id).await.unwrap();
        assert_eq!(service.get(&principal, view.id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(service.create(&principal, openai("gpt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_embedder_checks_category_and_enabled() {
        let (service, _) = service();
        let principal = Principal::new("u1", "t1");
        let llm = service.create(&principal, openai("gpt")).await.unwrap();
        let err = service
            .embed_texts(&principal, llm.id, &["hi".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);

        let embedder = service
            .create(
                &principal,
                CreateModelRequest {
                    name: "emb".into(),
                    model_type: "embedding.scripted".into(),
                    category: Some(ModelCategory::Embedding),
                    description: None,
                    tags: None,
                    config: json!({}),
                    config_schema_version: None,
                    is_enabled: None,
                },
            )
            .await
            .unwrap();
        let vectors = service
            .embed_texts(&principal, embedder.id, &["hi".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0].len(), 4);

        service.set_enabled(&principal, embedder.id, false).await.unwrap();
        let err = service
            .embed_texts(&principal, embedder.id, &["hi".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disabled);
    }

    #[test]
    fn test_probe_timeout_is_capped() {
        let (service, _) = service();
        assert_eq!(service.probe_timeout(None), Duration::from_secs(10));
        assert_eq!(service.probe_timeout(Some(300)), Duration::from_secs(30));
        assert_eq!(service.probe_timeout(Some(0)), Duration::from_secs(1));
    }
}
