// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Chat model port and the message types exchanged inside an agent loop.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between the agent loop and provider APIs

// The wire protocol of a provider never leaks past this module: connectors in
// infrastructure/connectors translate ChatRequest/ChatResponse to and from
// their own JSON shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::AddAssign;

/// Domain interface for a tool-augmented chat completion endpoint.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One model call: full message list (system prompt included) and the
    /// tools offered for this step in, a single assistant message out.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Human,
    Ai,
    Tool,
}

/// A single part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text view; text parts are concatenated, other parts dropped.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
    /// Author name; agents stamp their node key on AI messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, text)
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::Human, text)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::Ai, text)
    }

    pub fn tool(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut msg = Self::plain(MessageRole::Tool, text);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

/// Tool declaration offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Provider model id; `None` lets the connector use its configured default.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Remaining provider parameters passed through untouched.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message (role `Ai`).
    pub message: ChatMessage,

    pub usage: TokenUsage,

    /// Model that served the request (e.g., "gpt-4o-mini")
    pub model: String,

    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Model asked for tool calls
    ToolCalls,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

impl FinishReason {
    pub fn from_provider(value: &str) -> Self {
        match value {
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parts_content_joins_text_only() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "Hello, "},
            {"type": "image_url", "image_url": {"url": "https://x"}},
            {"type": "text", "text": "world"}
        ]))
        .unwrap();
        assert_eq!(content.as_text(), "Hello, world");
    }

    #[test]
    fn test_message_serializes_role_lowercase() {
        let msg = ChatMessage::ai("done").with_name("billing");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "ai");
        assert_eq!(value["content"], "done");
        assert_eq!(value["name"], "billing");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 };
        total += TokenUsage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 };
        assert_eq!(total.total_tokens, 7);
    }
}
