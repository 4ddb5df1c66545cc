// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared fixtures for the application service tests.

use serde_json::json;
use std::sync::Arc;

use crate::application::agent_service::CreateAgentRequest;
use crate::application::model_service::CreateModelRequest;
use crate::application::network_service::CreateNetworkRequest;
use crate::application::platform::{Platform, PlatformBuilder};
use crate::domain::agent::{AgentBindings, AgentId};
use crate::domain::model::ModelId;
use crate::domain::tenant::Principal;
use crate::infrastructure::bootstrap::builtin_tool_adapters;
use crate::infrastructure::connectors::scripted::{CHAT_TYPE_SLUG, EMBEDDING_TYPE_SLUG};
use crate::infrastructure::connectors::ScriptedConnector;
use crate::infrastructure::datasets::InMemoryDatasetGateway;
use crate::infrastructure::registry::ConnectorRegistry;
use crate::infrastructure::secrets::AesGcmCipher;

pub(crate) struct Fixture {
    pub platform: Platform,
    /// Shares its script with the connector registered in `platform`.
    pub chat: ScriptedConnector,
    pub datasets: Arc<InMemoryDatasetGateway>,
    pub principal: Principal,
}

pub(crate) fn fixture() -> Fixture {
    let chat = ScriptedConnector::chat();
    let connectors = ConnectorRegistry::builder("connectors")
        .register(CHAT_TYPE_SLUG, None, Arc::new(chat.clone()))
        .register(EMBEDDING_TYPE_SLUG, None, Arc::new(ScriptedConnector::embeddings(4)))
        .build();
    let datasets = Arc::new(InMemoryDatasetGateway::new());
    let platform = PlatformBuilder::new(Arc::new(AesGcmCipher::new("fixture-secret").unwrap()))
        .connectors(connectors)
        .tool_adapters(builtin_tool_adapters())
        .datasets(datasets.clone())
        .build();
    Fixture {
        platform,
        chat,
        datasets,
        principal: Principal::new("u1", "t1"),
    }
}

pub(crate) async fn llm_model(f: &Fixture) -> ModelId {
    f.platform
        .models
        .create(
            &f.principal,
            CreateModelRequest {
                name: format!("chat-{}", uuid::Uuid::new_v4().simple()),
                model_type: CHAT_TYPE_SLUG.into(),
                category: None,
                description: None,
                tags: None,
                config: json!({"api_key": "sk-test"}),
                config_schema_version: None,
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

pub(crate) async fn simple_agent(f: &Fixture, name: &str) -> AgentId {
    let model_id = llm_model(f).await;
    f.platform
        .agents
        .create(
            &f.principal,
            CreateAgentRequest {
                name: name.into(),
                description: Some(format!("{} agent", name)),
                tags: None,
                agent_type: None,
                model_id,
                config: json!({}),
                config_schema_version: None,
                bindings: AgentBindings::default(),
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

pub(crate) fn standalone_request(slug: &str, version: &str, agent: AgentId) -> CreateNetworkRequest {
    CreateNetworkRequest {
        name: slug.to_string(),
        slug: slug.to_string(),
        version: version.to_string(),
        network_type: None,
        description: None,
        tags: None,
        status: None,
        spec: json!({"type": "standalone", "nodes": [{"node_key": slug, "agent_id": agent}]}),
        is_enabled: None,
    }
}
