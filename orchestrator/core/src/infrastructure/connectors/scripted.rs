// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Scripted connectors (`llm.scripted`, `embedding.scripted`)
//
// Offline stand-ins for tests and local runs. The chat model
// pops queued replies and falls back to echoing the last human message; the
// embedder hashes text into fixed-size unit vectors.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::llm::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, FinishReason, LLMError, MessageRole, TokenUsage,
    ToolCall,
};
use crate::domain::model::{
    ConnectionStatus, ConnectionTestResult, ConnectorMetadata, ConnectorSource, ModelCapabilities,
    ModelCategory, ModelConnector, ModelError,
};
use crate::domain::redaction::redact_keys;

pub const CHAT_TYPE_SLUG: &str = "llm.scripted";
pub const EMBEDDING_TYPE_SLUG: &str = "embedding.scripted";
pub const DEFAULT_DIMENSION: usize = 8;

/// One queued model turn.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Fail(String),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Text(text.into())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        ScriptedReply::ToolCalls(vec![ToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }])
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    requests: Vec<ChatRequest>,
}

/// Cloning shares the script, so a test can keep a handle after
/// registering the connector.
#[derive(Clone)]
pub struct ScriptedConnector {
    metadata: Arc<ConnectorMetadata>,
    script: Arc<Mutex<Script>>,
    dimension: usize,
}

impl ScriptedConnector {
    pub fn chat() -> Self {
        Self::with_metadata(CHAT_TYPE_SLUG, "Scripted Chat", ModelCategory::Llm, DEFAULT_DIMENSION)
    }

    pub fn embeddings(dimension: usize) -> Self {
        Self::with_metadata(
            EMBEDDING_TYPE_SLUG,
            "Scripted Embeddings",
            ModelCategory::Embedding,
            dimension.max(1),
        )
    }

    fn with_metadata(slug: &str, display: &str, category: ModelCategory, dimension: usize) -> Self {
        Self {
            metadata: Arc::new(ConnectorMetadata {
                type_slug: slug.to_string(),
                display_name: display.to_string(),
                category,
                version: "1.0.0".to_string(),
                json_schema: json!({
                    "type": "object",
                    "properties": {
                        "api_key": {"type": "string", "secret": true},
                        "default_model": {"type": ["string", "null"]}
                    }
                }),
                source: ConnectorSource::Builtin,
            }),
            script: Arc::new(Mutex::new(Script::default())),
            dimension,
        }
    }

    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.script.lock().replies.push_back(reply);
        self
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script.lock().requests.clone()
    }

    fn next_reply(&self, request: &ChatRequest) -> Option<ScriptedReply> {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script.replies.pop_front()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let raw: Vec<f32> = (0..self.dimension)
            .map(|i| f32::from(digest[i % digest.len()]) - 127.5)
            .collect();
        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
        raw.into_iter().map(|x| x / norm).collect()
    }
}

#[async_trait]
impl ModelConnector for ScriptedConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    fn validate_config(&self, config: &Value) -> Result<(), ModelError> {
        if config.is_object() {
            Ok(())
        } else {
            Err(ModelError::Validation("Configuration must be an object".to_string()))
        }
    }

    fn redact_config(&self, config: &Value) -> Value {
        redact_keys(config, &["api_key"])
    }

    async fn test_connection(&self, _config: &Value, _timeout: Duration, allow_smoke_inference: bool) -> ConnectionTestResult {
        ConnectionTestResult {
            status: ConnectionStatus::Ok,
            latency_ms: 0,
            billable: allow_smoke_inference,
            details: json!({"endpoint": "scripted"}),
        }
    }

    async fn get_capabilities(&self, _config: &Value) -> ModelCapabilities {
        ModelCapabilities {
            models: vec!["scripted".to_string()],
            embedding_dimensions: None,
            api_style: "scripted".to_string(),
        }
    }

    async fn embed_texts(&self, _config: &Value, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if self.metadata.category != ModelCategory::Embedding {
            return Err(ModelError::NotImplemented(format!(
                "Connector '{}' does not support embeddings",
                self.metadata.type_slug
            )));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn chat_model(&self, _config: &Value) -> Result<Arc<dyn ChatModel>, ModelError> {
        if self.metadata.category != ModelCategory::Llm {
            return Err(ModelError::NotImplemented(format!(
                "Connector '{}' does not support chat",
                self.metadata.type_slug
            )));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ChatModel for ScriptedConnector {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let (message, finish_reason) = match self.next_reply(request) {
            Some(ScriptedReply::Text(text)) => (ChatMessage::ai(text), FinishReason::Stop),
            Some(ScriptedReply::ToolCalls(calls)) => {
                (ChatMessage::ai("").with_tool_calls(calls), FinishReason::ToolCalls)
            }
            Some(ScriptedReply::Fail(reason)) => return Err(LLMError::Provider(reason)),
            None => {
                let last = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::Human)
                    .map(ChatMessage::text)
                    .unwrap_or_default();
                (ChatMessage::ai(format!("echo: {}", last)), FinishReason::Stop)
            }
        };
        let completion = message.text().split_whitespace().count() as u32;
        let prompt: u32 = request
            .messages
            .iter()
            .map(|m| m.text().split_whitespace().count() as u32)
            .sum();
        Ok(ChatResponse {
            message,
            usage: TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            },
            model: request.model.clone().unwrap_or_else(|| "scripted".to_string()),
            finish_reason,
        })
    }
}
