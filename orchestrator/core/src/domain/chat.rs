// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Chatbots, Threads and Messages
//!
//! A [`Chatbot`] pins one agent network version. Users talk to it through
//! [`ChatThread`]s; every turn is persisted as [`ChatMessageRecord`]s so that
//! later turns can replay the history into the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::error::{Classified, ErrorKind};
use crate::domain::llm::{ChatMessage, TokenUsage};
use crate::domain::network::{NetworkError, NetworkId};
use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{TenantId, UserId};

entity_id!(ChatbotId);
entity_id!(ThreadId);
entity_id!(MessageId);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: ChatbotId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub visibility: Option<String>,
    pub is_enabled: bool,
    pub agent_network_id: NetworkId,
    pub agent_network_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: ThreadId,
    pub tenant_id: TenantId,
    pub chatbot_id: ChatbotId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub status: ThreadStatus,
    pub tags: Option<Value>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_run_id: Option<Uuid>,
    #[serde(default)]
    pub token_usage: TokenUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
            ChatRole::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub thread_id: ThreadId,
    pub role: ChatRole,
    pub content: Value,
    pub citations: Option<Vec<Value>>,
    pub run_id: Option<Uuid>,
    pub token_counts: Option<TokenUsage>,
    pub latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    /// Plain text of the stored content: a string, `{"text": ...}`, or a
    /// list of text parts.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
            Value::Array(items) => {
                let joined: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("text").and_then(Value::as_str))
                    .collect();
                (!joined.is_empty()).then(|| joined.join(""))
            }
            _ => None,
        }
    }

    /// Replay form for the agent loop. System/tool rows and rows without text
    /// are not replayed.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        let text = self.text().filter(|t| !t.trim().is_empty())?;
        match self.role {
            ChatRole::User => Some(ChatMessage::human(text)),
            ChatRole::Assistant => Some(ChatMessage::ai(text)),
            ChatRole::System | ChatRole::Tool => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chatbot not found")]
    NotFound,

    #[error("Thread not found or access denied")]
    ThreadNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl Classified for ChatError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChatError::NotFound | ChatError::ThreadNotFound => ErrorKind::NotFound,
            ChatError::Conflict(_) | ChatError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            ChatError::Invalid(_) => ErrorKind::ValidationInvalid,
            ChatError::Network(e) => e.kind(),
            ChatError::Repository(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ChatError::NotFound => "CHATBOT_NOT_FOUND",
            ChatError::ThreadNotFound => "CHAT_THREAD_NOT_FOUND",
            ChatError::Conflict(_) | ChatError::Repository(RepositoryError::Conflict(_)) => "CHATBOT_CONFLICT",
            ChatError::Invalid(_) => "CHATBOT_INVALID",
            ChatError::Network(e) => e.code(),
            ChatError::Repository(_) => "CHATBOT_INTERNAL",
        }
    }
}
