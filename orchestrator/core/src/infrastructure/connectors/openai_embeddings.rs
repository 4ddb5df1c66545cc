// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Embeddings Connector (`embedding.openai`)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::openai_common::{self, OpenAiSettings, SmokeCall};
use crate::domain::model::{
    ConnectionTestResult, ConnectorMetadata, ConnectorSource, ModelCapabilities, ModelCategory,
    ModelConnector, ModelError,
};

pub const TYPE_SLUG: &str = "embedding.openai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const EMBEDDINGS_PATH: &str = "embeddings";
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Known output sizes, reported as capability hints.
const DIMENSION_HINTS: &[(&str, u32)] = &[
    ("text-embedding-3-large", 3072),
    ("text-embedding-3-small", 1536),
];

pub struct OpenAiEmbeddingsConnector {
    metadata: ConnectorMetadata,
}

impl OpenAiEmbeddingsConnector {
    pub fn new() -> Self {
        Self {
            metadata: ConnectorMetadata {
                type_slug: TYPE_SLUG.to_string(),
                display_name: "OpenAI Embeddings".to_string(),
                category: ModelCategory::Embedding,
                version: "1.0.0".to_string(),
                json_schema: openai_common::config_schema("OpenAI Embeddings Connector Config", true),
                source: ConnectorSource::Builtin,
            },
        }
    }
}

impl Default for OpenAiEmbeddingsConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn model_for(settings: &OpenAiSettings) -> String {
    settings
        .default_model
        .clone()
        .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())
}

fn expected_dimension(config: &Value) -> Option<usize> {
    config
        .get("expected_dimension")
        .and_then(Value::as_u64)
        .map(|d| d as usize)
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl ModelConnector for OpenAiEmbeddingsConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    fn validate_config(&self, config: &Value) -> Result<(), ModelError> {
        openai_common::validate_config(&self.metadata.json_schema, config)?;
        if let Some(dim) = config.get("expected_dimension").filter(|v| !v.is_null()) {
            if !dim.as_u64().is_some_and(|d| d > 0) {
                return Err(ModelError::Validation(
                    "'expected_dimension' must be a positive integer".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn redact_config(&self, config: &Value) -> Value {
        openai_common::redact_config(config)
    }

    async fn test_connection(&self, config: &Value, timeout: Duration, allow_smoke_inference: bool) -> ConnectionTestResult {
        let settings = OpenAiSettings::from_config(config);
        let smoke = allow_smoke_inference.then(|| {
            let model = model_for(&settings);
            SmokeCall {
                path: EMBEDDINGS_PATH,
                body: json!({"model": model, "input": ["ping"]}),
                model,
            }
        });
        openai_common::probe(&settings, timeout, smoke).await
    }

    async fn get_capabilities(&self, config: &Value) -> ModelCapabilities {
        let settings = OpenAiSettings::from_config(config);
        match openai_common::list_model_ids(&settings).await {
            Ok(ids) if settings.is_azure() => ModelCapabilities {
                models: ids,
                embedding_dimensions: None,
                api_style: "azure".to_string(),
            },
            Ok(ids) => {
                let models: Vec<String> = ids.into_iter().filter(|id| id.contains("embedding")).collect();
                let dims: BTreeMap<String, u32> = DIMENSION_HINTS
                    .iter()
                    .filter(|(name, _)| models.iter().any(|m| m == name))
                    .map(|(name, dim)| (name.to_string(), *dim))
                    .collect();
                ModelCapabilities {
                    models,
                    embedding_dimensions: (!dims.is_empty()).then_some(dims),
                    api_style: "openai".to_string(),
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Capability listing failed");
                ModelCapabilities::unknown()
            }
        }
    }

    async fn embed_texts(&self, config: &Value, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let settings = OpenAiSettings::from_config(config);
        let model = model_for(&settings);
        let client = openai_common::http_client(EMBED_TIMEOUT).map_err(|e| ModelError::Provider(e.to_string()))?;

        let response = client
            .post(settings.inference_url(&model, EMBEDDINGS_PATH))
            .headers(settings.headers(true))
            .query(&settings.query())
            .json(&json!({"model": model, "input": texts}))
            .send()
            .await
            .map_err(|e| ModelError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Provider(format!(
                "OpenAI embeddings failed with status {}",
                status.as_u16()
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|_| ModelError::Provider("Malformed embeddings response".to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(ModelError::Provider("Malformed embeddings response".to_string()));
        }
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|item| item.embedding).collect();

        if let Some(expected) = expected_dimension(config) {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(ModelError::Provider(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    expected,
                    bad.len()
                )));
            }
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_dimension_validation() {
        let connector = OpenAiEmbeddingsConnector::new();
        assert!(connector
            .validate_config(&json!({"api_key": "sk", "expected_dimension": 1536}))
            .is_ok());
        assert!(connector
            .validate_config(&json!({"api_key": "sk", "expected_dimension": null}))
            .is_ok());
        assert!(connector
            .validate_config(&json!({"api_key": "sk", "expected_dimension": 0}))
            .is_err());
    }

    #[test]
    fn test_metadata() {
        let connector = OpenAiEmbeddingsConnector::new();
        let meta = connector.metadata();
        assert_eq!(meta.type_slug, "embedding.openai");
        assert_eq!(meta.category, ModelCategory::Embedding);
        assert!(meta.json_schema["properties"]["expected_dimension"].is_object());
    }
}
