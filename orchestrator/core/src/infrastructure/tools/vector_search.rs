// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// `vector.similarity_search`: nearest neighbours in a vector dataset, either
// from a caller-supplied vector or from text embedded by the bound model.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{parse_config, schema_of};
use crate::domain::dataset::{DatasetId, VectorQuerySpec};
use crate::domain::model::ModelId;
use crate::domain::tool::{AgentTool, ResourceType, ToolAdapter, ToolBindings, ToolContext, ToolError};

pub const KIND: &str = "vector.similarity_search";
pub const INDEX_ROLE: &str = "vector_index";
pub const EMBEDDING_ROLE: &str = "embedding_model";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VectorSearchConfig {
    #[schemars(description = "Upper bound on returned matches", range(min = 1, max = 1000))]
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_true")]
    pub include_metadata: bool,

    #[serde(default)]
    pub include_values: bool,

    #[serde(default)]
    pub namespace: Option<String>,

    #[schemars(description = "Metadata keys allowed in `filter`; empty allows all")]
    #[serde(default)]
    pub allowed_metadata_fields: Option<Vec<String>>,

    #[schemars(description = "Text longer than this is truncated before embedding", range(min = 1, max = 100000))]
    #[serde(default = "default_embed_text_max_chars")]
    pub embed_text_max_chars: u32,
}

fn default_top_k() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_embed_text_max_chars() -> u32 {
    8000
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            include_metadata: true,
            include_values: false,
            namespace: None,
            allowed_metadata_fields: None,
            embed_text_max_chars: default_embed_text_max_chars(),
        }
    }
}

impl VectorSearchConfig {
    fn check_bounds(&self) -> Result<(), ToolError> {
        if !(1..=1000).contains(&self.top_k) {
            return Err(ToolError::Validation("top_k must be between 1 and 1000".to_string()));
        }
        if !(1..=100_000).contains(&self.embed_text_max_chars) {
            return Err(ToolError::Validation(
                "embed_text_max_chars must be between 1 and 100000".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct VectorSearchPayload {
    #[schemars(description = "Query vector; alternative to `text`")]
    #[serde(default)]
    pub vector: Option<Vec<f32>>,

    #[schemars(description = "Query text, embedded with the bound model")]
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub top_k: Option<u32>,

    #[schemars(description = "Metadata equality filter")]
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,

    #[serde(default)]
    pub include_values: Option<bool>,

    #[serde(default)]
    pub include_metadata: Option<bool>,

    #[serde(default)]
    pub namespace: Option<String>,
}

/// What the query needs before the gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Vector(Vec<f32>),
    Text(String),
}

/// Resolve the query source, clamp `top_k` and check filter keys. The vector
/// is left empty when text still has to be embedded.
pub fn plan_query(config: &VectorSearchConfig, payload: VectorSearchPayload) -> Result<(QueryInput, VectorQuerySpec), ToolError> {
    let input = match (payload.vector, payload.text) {
        (Some(vector), _) if !vector.is_empty() => QueryInput::Vector(vector),
        (_, Some(text)) if !text.trim().is_empty() => {
            let limit = config.embed_text_max_chars as usize;
            QueryInput::Text(text.chars().take(limit).collect())
        }
        _ => {
            return Err(ToolError::Validation(
                "Either 'vector' or 'text' is required".to_string(),
            ))
        }
    };

    let allowed = config.allowed_metadata_fields.as_deref().unwrap_or_default();
    if let Some(filter) = &payload.filter {
        if !allowed.is_empty() {
            if let Some(key) = filter.keys().find(|k| !allowed.contains(k)) {
                return Err(ToolError::Validation(format!(
                    "Filter on disallowed metadata field: {}",
                    key
                )));
            }
        }
    }

    let spec = VectorQuerySpec {
        vector: match &input {
            QueryInput::Vector(v) => v.clone(),
            QueryInput::Text(_) => Vec::new(),
        },
        top_k: payload.top_k.map(|k| k.clamp(1, config.top_k)).unwrap_or(config.top_k),
        filter: payload.filter,
        include_values: payload.include_values.unwrap_or(config.include_values),
        include_metadata: payload.include_metadata.unwrap_or(config.include_metadata),
        namespace: payload.namespace.or_else(|| config.namespace.clone()),
    };
    Ok((input, spec))
}

#[derive(Default)]
pub struct VectorSearchAdapter;

impl VectorSearchAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolAdapter for VectorSearchAdapter {
    fn kind(&self) -> &str {
        KIND
    }

    fn display_name(&self) -> &str {
        "Vector Similarity Search"
    }

    fn config_schema(&self) -> Value {
        schema_of::<VectorSearchConfig>()
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<VectorSearchPayload>()
    }

    fn validate_bindings(&self, bindings: &ToolBindings) -> Result<(), ToolError> {
        bindings.require(INDEX_ROLE, ResourceType::Dataset)?;
        bindings.require(EMBEDDING_ROLE, ResourceType::AiModel)?;
        Ok(())
    }

    fn validate_config(&self, config: &Value) -> Result<(), ToolError> {
        parse_config::<VectorSearchConfig>(config)?.check_bounds()
    }

    async fn invoke(&self, tool: &AgentTool, payload: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let config = parse_config::<VectorSearchConfig>(&tool.config)?;
        config.check_bounds()?;
        let index = tool.bindings.require(INDEX_ROLE, ResourceType::Dataset)?;
        let embedding_model = tool.bindings.require(EMBEDDING_ROLE, ResourceType::AiModel)?;

        let payload: VectorSearchPayload = if payload.is_null() {
            VectorSearchPayload::default()
        } else {
            serde_json::from_value(payload.clone())
                .map_err(|e| ToolError::Validation(format!("Invalid vector search payload: {}", e)))?
        };
        let (input, mut spec) = plan_query(&config, payload)?;

        if let QueryInput::Text(text) = input {
            debug!(chars = text.chars().count(), "Embedding query text");
            let mut vectors = ctx
                .embedder
                .embed_texts(&ctx.principal, ModelId(embedding_model.id), &[text])
                .await?;
            spec.vector = vectors
                .pop()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ToolError::Validation("Embedding model returned no vector".to_string()))?;
        }

        let result = ctx
            .datasets
            .vector_query(&ctx.principal.tenant_id, DatasetId(index.id), &spec)
            .await?;
        Ok(json!(result))
    }
}
