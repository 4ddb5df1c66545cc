// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chatbot and Chat Thread Services
//!
//! A chatbot is a tenant-facing binding to one pinned agent network version.
//! Threads hold a single user's conversation with a chatbot; each turn is
//! persisted step by step and the recent history is replayed into the network
//! on the next turn.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Chatbot bindings and the per-turn thread orchestration
//! - **Related:** `domain::chat`, `application::network_service`
//!
//! Writes are not transactional across a turn: the user message is stored
//! before the network runs, so a failed run leaves it without a reply.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::network_service::AgentNetworkService;
use crate::application::{check_name, Listing, Paging};
use crate::domain::chat::{
    ChatError, ChatMessageRecord, ChatRole, ChatThread, Chatbot, ChatbotId, MessageId, ThreadId, ThreadStatus,
};
use crate::domain::llm::{ChatMessage, TokenUsage};
use crate::domain::network::{NetworkError, NetworkId, NetworkInvocation, NetworkRunResult, NetworkStatus};
use crate::domain::repository::{ChatbotFilter, ChatbotRepository, MessageRepository, ThreadRepository};
use crate::domain::tenant::Principal;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatbotRequest {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub agent_network_id: Option<NetworkId>,
    #[serde(default)]
    pub agent_network_version: Option<String>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChatbotRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub agent_network_id: Option<NetworkId>,
    #[serde(default)]
    pub agent_network_version: Option<String>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// One chat turn against a chatbot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatInvokeRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Stored verbatim as the user message; defaults to `{"text": input}`.
    #[serde(default)]
    pub content: Option<Value>,
}

pub struct ChatbotService {
    repo: Arc<dyn ChatbotRepository>,
    networks: Arc<AgentNetworkService>,
    paging: Paging,
}

impl ChatbotService {
    pub fn new(repo: Arc<dyn ChatbotRepository>, networks: Arc<AgentNetworkService>, paging: Paging) -> Self {
        Self { repo, networks, paging }
    }

    pub async fn create(&self, principal: &Principal, request: CreateChatbotRequest) -> Result<Chatbot, ChatError> {
        let name = check_name("name", &request.name, 128).map_err(ChatError::Invalid)?;
        let slug = check_name("slug", &request.slug, 128).map_err(ChatError::Invalid)?;
        let (network_id, version) = match (request.agent_network_id, request.agent_network_version) {
            (Some(id), Some(version)) if !version.trim().is_empty() => (id, version.trim().to_string()),
            _ => {
                return Err(ChatError::Invalid(
                    "agent_network_id and agent_network_version are required".to_string(),
                ))
            }
        };
        self.check_binding(principal, network_id, &version).await?;

        let now = Utc::now();
        let chatbot = Chatbot {
            id: ChatbotId::new(),
            tenant_id: principal.tenant_id.clone(),
            owner_id: principal.user_id.clone(),
            name,
            slug,
            description: request.description,
            visibility: request.visibility,
            is_enabled: request.is_enabled.unwrap_or(true),
            agent_network_id: network_id,
            agent_network_version: version,
            created_at: now,
            updated_at: now,
            created_by: principal.user_id.clone(),
            updated_by: principal.user_id.clone(),
            deleted_at: None,
        };
        self.repo.insert(&chatbot).await?;
        info!(chatbot_id = %chatbot.id, network_id = %network_id, "Chatbot created");
        Ok(chatbot)
    }

    pub async fn get(&self, principal: &Principal, id: ChatbotId) -> Result<Chatbot, ChatError> {
        self.repo
            .find(&principal.tenant_id, id)
            .await?
            .ok_or(ChatError::NotFound)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &ChatbotFilter,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<Chatbot>, ChatError> {
        let page = self.paging.page(limit, offset);
        let (items, total) = self.repo.list(&principal.tenant_id, filter, page).await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(&self, principal: &Principal, id: ChatbotId, request: UpdateChatbotRequest) -> Result<Chatbot, ChatError> {
        let mut chatbot = self.get(principal, id).await?;
        if let Some(name) = &request.name {
            chatbot.name = check_name("name", name, 128).map_err(ChatError::Invalid)?;
        }
        if let Some(slug) = &request.slug {
            chatbot.slug = check_name("slug", slug, 128).map_err(ChatError::Invalid)?;
        }
        if let Some(description) = request.description {
            chatbot.description = Some(description);
        }
        if let Some(visibility) = request.visibility {
            chatbot.visibility = Some(visibility);
        }
        if request.agent_network_id.is_some() || request.agent_network_version.is_some() {
            let network_id = request.agent_network_id.unwrap_or(chatbot.agent_network_id);
            let version = request
                .agent_network_version
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| chatbot.agent_network_version.clone());
            self.check_binding(principal, network_id, &version).await?;
            chatbot.agent_network_id = network_id;
            chatbot.agent_network_version = version;
        }
        if let Some(enabled) = request.is_enabled {
            chatbot.is_enabled = enabled;
        }
        chatbot.updated_at = Utc::now();
        chatbot.updated_by = principal.user_id.clone();
        self.repo.update(&chatbot).await?;
        info!(chatbot_id = %id, "Chatbot updated");
        Ok(chatbot)
    }

    pub async fn delete(&self, principal: &Principal, id: ChatbotId) -> Result<(), ChatError> {
        let mut chatbot = self.get(principal, id).await?;
        let now = Utc::now();
        chatbot.deleted_at = Some(now);
        chatbot.updated_at = now;
        chatbot.updated_by = principal.user_id.clone();
        self.repo.update(&chatbot).await?;
        info!(chatbot_id = %id, "Chatbot deleted");
        Ok(())
    }

    pub async fn set_enabled(&self, principal: &Principal, id: ChatbotId, enabled: bool) -> Result<Chatbot, ChatError> {
        self.update(
            principal,
            id,
            UpdateChatbotRequest {
                is_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Ephemeral run: nothing is persisted.
    pub async fn invoke(
        &self,
        principal: &Principal,
        id: ChatbotId,
        request: ChatInvokeRequest,
    ) -> Result<NetworkRunResult, ChatError> {
        let chatbot = self.get(principal, id).await?;
        let invocation = NetworkInvocation {
            input: request.input,
            variables: request.variables,
            ..Default::default()
        };
        self.run(principal, &chatbot, &invocation).await
    }

    /// Re-checks the binding, then runs the bound network version.
    async fn run(
        &self,
        principal: &Principal,
        chatbot: &Chatbot,
        invocation: &NetworkInvocation,
    ) -> Result<NetworkRunResult, ChatError> {
        if !chatbot.is_enabled {
            return Err(ChatError::Invalid("Chatbot is disabled".to_string()));
        }
        self.check_binding(principal, chatbot.agent_network_id, &chatbot.agent_network_version)
            .await?;
        Ok(self
            .networks
            .invoke(principal, chatbot.agent_network_id, invocation)
            .await?)
    }

    async fn check_binding(&self, principal: &Principal, network_id: NetworkId, version: &str) -> Result<(), ChatError> {
        let network = match self.networks.get(principal, network_id).await {
            Ok(network) => Some(network),
            Err(NetworkError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let network = network
            .filter(|n| n.version == version && n.is_enabled)
            .ok_or_else(|| {
                ChatError::Invalid("Referenced agent network id/version not found or not enabled".to_string())
            })?;
        if network.status == NetworkStatus::Deprecated {
            return Err(ChatError::Invalid(
                "Referenced agent network version is deprecated".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub status: Option<ThreadStatus>,
}

/// Persisted outcome of one thread turn.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadTurn {
    pub user_message: ChatMessageRecord,
    pub assistant_message: ChatMessageRecord,
    pub run: NetworkRunResult,
}

pub struct ChatThreadService {
    threads: Arc<dyn ThreadRepository>,
    messages: Arc<dyn MessageRepository>,
    chatbots: Arc<ChatbotService>,
    history_window: usize,
    paging: Paging,
}

impl ChatThreadService {
    pub fn new(
        threads: Arc<dyn ThreadRepository>,
        messages: Arc<dyn MessageRepository>,
        chatbots: Arc<ChatbotService>,
        history_window: usize,
        paging: Paging,
    ) -> Self {
        Self {
            threads,
            messages,
            chatbots,
            history_window,
            paging,
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        request: CreateThreadRequest,
    ) -> Result<ChatThread, ChatError> {
        self.chatbots.get(principal, chatbot_id).await?;
        let now = Utc::now();
        let thread = ChatThread {
            id: ThreadId::new(),
            tenant_id: principal.tenant_id.clone(),
            chatbot_id,
            user_id: principal.user_id.clone(),
            title: request.title,
            status: ThreadStatus::Active,
            tags: request.tags,
            last_message_at: None,
            last_run_id: None,
            token_usage: TokenUsage::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.threads.insert(&thread).await?;
        info!(thread_id = %thread.id, chatbot_id = %chatbot_id, "Chat thread created");
        Ok(thread)
    }

    /// Threads are only visible to the user that created them.
    pub async fn get(&self, principal: &Principal, chatbot_id: ChatbotId, id: ThreadId) -> Result<ChatThread, ChatError> {
        self.threads
            .find(&principal.tenant_id, chatbot_id, &principal.user_id, id)
            .await?
            .ok_or(ChatError::ThreadNotFound)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        status: Option<ThreadStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<ChatThread>, ChatError> {
        let page = self.paging.page(limit, offset);
        let (items, total) = self
            .threads
            .list(&principal.tenant_id, chatbot_id, &principal.user_id, status, page)
            .await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        id: ThreadId,
        request: UpdateThreadRequest,
    ) -> Result<ChatThread, ChatError> {
        let mut thread = self.get(principal, chatbot_id, id).await?;
        if let Some(title) = request.title {
            thread.title = Some(title);
        }
        if let Some(tags) = request.tags {
            thread.tags = Some(tags);
        }
        if let Some(status) = request.status {
            if status == ThreadStatus::Deleted {
                return Err(ChatError::Invalid("Use delete to remove a thread".to_string()));
            }
            thread.status = status;
        }
        thread.updated_at = Utc::now();
        self.threads.update(&thread).await?;
        Ok(thread)
    }

    pub async fn archive(&self, principal: &Principal, chatbot_id: ChatbotId, id: ThreadId) -> Result<ChatThread, ChatError> {
        self.set_status(principal, chatbot_id, id, ThreadStatus::Archived).await
    }

    pub async fn restore(&self, principal: &Principal, chatbot_id: ChatbotId, id: ThreadId) -> Result<ChatThread, ChatError> {
        self.set_status(principal, chatbot_id, id, ThreadStatus::Active).await
    }

    async fn set_status(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        id: ThreadId,
        status: ThreadStatus,
    ) -> Result<ChatThread, ChatError> {
        self.update(
            principal,
            chatbot_id,
            id,
            UpdateThreadRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, principal: &Principal, chatbot_id: ChatbotId, id: ThreadId) -> Result<(), ChatError> {
        let mut thread = self.get(principal, chatbot_id, id).await?;
        let now = Utc::now();
        thread.status = ThreadStatus::Deleted;
        thread.deleted_at = Some(now);
        thread.updated_at = now;
        self.threads.update(&thread).await?;
        info!(thread_id = %id, "Chat thread deleted");
        Ok(())
    }

    /// Store a user message without running the network.
    pub async fn create_user_message(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        id: ThreadId,
        content: Value,
    ) -> Result<ChatMessageRecord, ChatError> {
        let mut thread = self.get(principal, chatbot_id, id).await?;
        self.append(&mut thread, ChatRole::User, content).await
    }

    /// Messages in creation order.
    pub async fn list_messages(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        id: ThreadId,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<ChatMessageRecord>, ChatError> {
        self.get(principal, chatbot_id, id).await?;
        let page = self.paging.page(limit, offset);
        let (items, total) = self.messages.list(&principal.tenant_id, id, page).await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn invoke(
        &self,
        principal: &Principal,
        chatbot_id: ChatbotId,
        id: ThreadId,
        request: ChatInvokeRequest,
    ) -> Result<ThreadTurn, ChatError> {
        let mut thread = self.get(principal, chatbot_id, id).await?;
        let chatbot = self.chatbots.get(principal, chatbot_id).await?;

        let history: Vec<ChatMessage> = self
            .messages
            .recent(&principal.tenant_id, id, self.history_window)
            .await?
            .iter()
            .filter_map(ChatMessageRecord::to_chat_message)
            .collect();

        let content = request
            .content
            .clone()
            .unwrap_or_else(|| json!({"text": request.input}));
        let user_message = self.append(&mut thread, ChatRole::User, content).await?;

        let invocation = NetworkInvocation {
            input: request.input,
            variables: request.variables,
            history,
            thread_id: Some(id.0),
            ..Default::default()
        };
        let run = match self.chatbots.run(principal, &chatbot, &invocation).await {
            Ok(run) => run,
            Err(e) => {
                warn!(thread_id = %id, error = %e, "Chat turn failed; user message left without reply");
                return Err(e);
            }
        };

        let now = Utc::now();
        let assistant_message = ChatMessageRecord {
            id: MessageId::new(),
            tenant_id: principal.tenant_id.clone(),
            thread_id: id,
            role: ChatRole::Assistant,
            content: json!({"text": run.output}),
            citations: Some(run.citations.clone()),
            run_id: Some(run.run_id),
            token_counts: Some(run.tokens),
            latency_ms: Some(run.latency_ms),
            created_at: now,
        };
        self.messages.insert(&assistant_message).await?;
        thread.last_message_at = Some(now);
        thread.last_run_id = Some(run.run_id);
        thread.token_usage += run.tokens;
        thread.updated_at = now;
        self.threads.update(&thread).await?;

        info!(thread_id = %id, run_id = %run.run_id, history = invocation.history.len(), "Chat turn completed");
        Ok(ThreadTurn {
            user_message,
            assistant_message,
            run,
        })
    }

    async fn append(&self, thread: &mut ChatThread, role: ChatRole, content: Value) -> Result<ChatMessageRecord, ChatError> {
        let now = Utc::now();
        let record = ChatMessageRecord {
            id: MessageId::new(),
            tenant_id: thread.tenant_id.clone(),
            thread_id: thread.id,
            role,
            content,
            citations: None,
            run_id: None,
            token_counts: None,
            latency_ms: None,
            created_at: now,
        };
        self.messages.insert(&record).await?;
        thread.last_message_at = Some(now);
        thread.updated_at = now;
        self.threads.update(thread).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::network_service::UpdateNetworkRequest;
    use crate::application::testing::{fixture, simple_agent, standalone_request, Fixture};
    use crate::domain::error::{Classified, ErrorKind};
    use crate::domain::llm::MessageRole;
    use crate::infrastructure::connectors::ScriptedReply;

    async fn chatbot(f: &Fixture) -> (Chatbot, NetworkId) {
        let agent = simple_agent(f, "Helper").await;
        let network = f
            .platform
            .networks
            .create(&f.principal, standalone_request("helper", "1.0", agent))
            .await
            .unwrap();
        let bot = f
            .platform
            .chatbots
            .create(
                &f.principal,
                CreateChatbotRequest {
                    name: "Helpdesk".into(),
                    slug: "helpdesk".into(),
                    description: None,
                    visibility: None,
                    agent_network_id: Some(network.id),
                    agent_network_version: Some("1.0".into()),
                    is_enabled: None,
                },
            )
            .await
            .unwrap();
        (bot, network.id)
    }

    #[tokio::test]
    async fn test_binding_checks() {
        let f = fixture();
        let (bot, network) = chatbot(&f).await;

        let err = f
            .platform
            .chatbots
            .update(
                &f.principal,
                bot.id,
                UpdateChatbotRequest {
                    agent_network_version: Some("2.0".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Referenced agent network id/version not found or not enabled");
        assert_eq!(err.code(), "CHATBOT_INVALID");

        f.platform
            .networks
            .update(
                &f.principal,
                network,
                UpdateNetworkRequest {
                    status: Some(NetworkStatus::Deprecated),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = f
            .platform
            .chatbots
            .invoke(&f.principal, bot.id, ChatInvokeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Referenced agent network version is deprecated");

        let err = f.platform.networks.delete(&f.principal, network).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_binding_fields() {
        let f = fixture();
        let err = f
            .platform
            .chatbots
            .create(
                &f.principal,
                CreateChatbotRequest {
                    name: "Bot".into(),
                    slug: "bot".into(),
                    description: None,
                    visibility: None,
                    agent_network_id: None,
                    agent_network_version: Some("1".into()),
                    is_enabled: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "agent_network_id and agent_network_version are required");
    }

    #[tokio::test]
    async fn test_thread_turns_replay_history() {
        let f = fixture();
        let (bot, _) = chatbot(&f).await;
        let threads = &f.platform.threads;
        let thread = threads
            .create(&f.principal, bot.id, CreateThreadRequest::default())
            .await
            .unwrap();

        f.chat.push(ScriptedReply::text("first answer"));
        let turn = threads
            .invoke(
                &f.principal,
                bot.id,
                thread.id,
                ChatInvokeRequest {
                    input: "first question".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(turn.assistant_message.text().as_deref(), Some("first answer"));
        assert_eq!(turn.assistant_message.run_id, Some(turn.run.run_id));

        f.chat.push(ScriptedReply::text("second answer"));
        threads
            .invoke(
                &f.principal,
                bot.id,
                thread.id,
                ChatInvokeRequest {
                    input: "second question".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let request = f.chat.requests().pop().unwrap();
        let replayed: Vec<(MessageRole, String)> = request
            .messages
            .iter()
            .skip(1)
            .map(|m| (m.role, m.text()))
            .collect();
        assert_eq!(
            replayed,
            vec![
                (MessageRole::Human, "first question".to_string()),
                (MessageRole::Ai, "first answer".to_string()),
                (MessageRole::Human, "second question".to_string()),
            ]
        );

        let messages = threads
            .list_messages(&f.principal, bot.id, thread.id, None, None)
            .await
            .unwrap();
        assert_eq!(messages.total, 4);
        assert_eq!(messages.items[0].role, ChatRole::User);
        assert_eq!(messages.items[3].role, ChatRole::Assistant);

        let stored = threads.get(&f.principal, bot.id, thread.id).await.unwrap();
        assert!(stored.last_run_id.is_some());
        assert!(stored.last_message_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_message() {
        let f = fixture();
        let (bot, _) = chatbot(&f).await;
        let threads = &f.platform.threads;
        let thread = threads
            .create(&f.principal, bot.id, CreateThreadRequest::default())
            .await
            .unwrap();
        f.chat.push(ScriptedReply::Fail("upstream down".into()));
        assert!(threads
            .invoke(&f.principal, bot.id, thread.id, ChatInvokeRequest::default())
            .await
            .is_err());
        let messages = threads
            .list_messages(&f.principal, bot.id, thread.id, None, None)
            .await
            .unwrap();
        assert_eq!(messages.total, 1);
        assert_eq!(messages.items[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn test_threads_are_private_and_archivable() {
        let f = fixture();
        let (bot, _) = chatbot(&f).await;
        let threads = &f.platform.threads;
        let thread = threads
            .create(&f.principal, bot.id, CreateThreadRequest::default())
            .await
            .unwrap();

        let colleague = Principal::new("u2", "t1");
        let err = threads.get(&colleague, bot.id, thread.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Thread not found or access denied");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        threads.archive(&f.principal, bot.id, thread.id).await.unwrap();
        let archived = threads
            .list(&f.principal, bot.id, Some(ThreadStatus::Archived), None, None)
            .await
            .unwrap();
        assert_eq!(archived.total, 1);
        threads.restore(&f.principal, bot.id, thread.id).await.unwrap();

        threads.delete(&f.principal, bot.id, thread.id).await.unwrap();
        assert!(threads.get(&f.principal, bot.id, thread.id).await.is_err());
    }
}
