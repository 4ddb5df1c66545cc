// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Chat Connector (`llm.openai`)
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also works with Azure OpenAI and other OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::openai_common::{self, OpenAiSettings, SmokeCall};
use crate::domain::llm::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, FinishReason, LLMError, MessageContent,
    MessageRole, TokenUsage, ToolCall,
};
use crate::domain::model::{
    ConnectionTestResult, ConnectorMetadata, ConnectorSource, ModelCapabilities, ModelCategory,
    ModelConnector, ModelError,
};

pub const TYPE_SLUG: &str = "llm.openai";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const CHAT_PATH: &str = "chat/completions";
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiChatConnector {
    metadata: ConnectorMetadata,
}

impl OpenAiChatConnector {
    pub fn new() -> Self {
        Self {
            metadata: ConnectorMetadata {
                type_slug: TYPE_SLUG.to_string(),
                display_name: "OpenAI GPT".to_string(),
                category: ModelCategory::Llm,
                version: "1.0.0".to_string(),
                json_schema: openai_common::config_schema("OpenAI GPT Connector Config", false),
                source: ConnectorSource::Builtin,
            },
        }
    }
}

impl Default for OpenAiChatConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn model_for(settings: &OpenAiSettings) -> String {
    settings
        .default_model
        .clone()
        .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string())
}

#[async_trait]
impl ModelConnector for OpenAiChatConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    fn validate_config(&self, config: &Value) -> Result<(), ModelError> {
        openai_common::validate_config(&self.metadata.json_schema, config)
    }

    fn redact_config(&self, config: &Value) -> Value {
        openai_common::redact_config(config)
    }

    async fn test_connection(&self, config: &Value, timeout: Duration, allow_smoke_inference: bool) -> ConnectionTestResult {
        let settings = OpenAiSettings::from_config(config);
        let smoke = allow_smoke_inference.then(|| {
            let model = model_for(&settings);
            SmokeCall {
                path: CHAT_PATH,
                body: json!({
                    "model": model,
                    "messages": [{"role": "user", "content": "ping"}],
                    "max_tokens": 1,
                    "temperature": 0
                }),
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
            Ok(ids) => ModelCapabilities {
                models: ids.into_iter().filter(|id| id.starts_with("gpt-")).collect(),
                embedding_dimensions: None,
                api_style: "openai".to_string(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Capability listing failed");
                ModelCapabilities::unknown()
            }
        }
    }

    fn chat_model(&self, config: &Value) -> Result<Arc<dyn ChatModel>, ModelError> {
        let settings = OpenAiSettings::from_config(config);
        let client = openai_common::http_client(CHAT_TIMEOUT)
            .map_err(|e| ModelError::Provider(e.to_string()))?;
        Ok(Arc::new(OpenAiChatModel { client, settings }))
    }
}

/// Chat completions client bound to one decrypted configuration.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

#[derive(Serialize)]
struct WireToolDef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef<'a>,
}

#[derive(Serialize)]
struct WireFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

fn wire_content(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Parts(_) => serde_json::to_value(content).unwrap_or(Value::Null),
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let mut out = Map::new();
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::Human => "user",
        MessageRole::Ai => "assistant",
        MessageRole::Tool => "tool",
    };
    out.insert("role".into(), json!(role));
    out.insert("content".into(), wire_content(&message.content));
    if let Some(name) = &message.name {
        if message.role != MessageRole::Tool {
            out.insert("name".into(), json!(name));
        }
    }
    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.name, "arguments": call.arguments.to_string()}
                })
            })
            .collect();
        out.insert("tool_calls".into(), Value::Array(calls));
    }
    if let Some(id) = &message.tool_call_id {
        out.insert("tool_call_id".into(), json!(id));
    }
    Value::Object(out)
}

impl OpenAiChatModel {
    fn body(&self, model: &str, request: &ChatRequest) -> Value {
        let mut body = openai_common::passthrough_params(&request.extra);
        body.insert("model".into(), json!(model));
        body.insert(
            "messages".into(),
            Value::Array(request.messages.iter().map(wire_message).collect()),
        );
        body.insert("temperature".into(), json!(request.temperature.unwrap_or(0.0)));
        if let Some(max_tokens) = request.max_tokens {
            body.insert("max_tokens".into(), json!(max_tokens));
        }
        if !request.tools.is_empty() {
            let tools: Vec<WireToolDef> = request
                .tools
                .iter()
                .map(|t| WireToolDef {
                    kind: "function",
                    function: WireFunctionDef {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect();
            body.insert("tools".into(), json!(tools));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let model = request
            .model
            .clone()
            .or_else(|| self.settings.default_model.clone())
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let url = self.settings.inference_url(&model, CHAT_PATH);

        let response = self
            .client
            .post(&url)
            .headers(self.settings.headers(true))
            .query(&self.settings.query())
            .json(&self.body(&model, request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(model)
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
                name: call.function.name,
            })
            .collect();

        let usage = wire
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            message: ChatMessage::ai(choice.message.content.unwrap_or_default()).with_tool_calls(tool_calls),
            usage,
            model: wire.model.unwrap_or(model),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_provider)
                .unwrap_or(FinishReason::Stop),
        })
    }
}
