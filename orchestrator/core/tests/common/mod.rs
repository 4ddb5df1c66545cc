// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared platform harness for the integration tests.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::sync::Arc;

use orion_core::application::agent_service::CreateAgentRequest;
use orion_core::application::model_service::CreateModelRequest;
use orion_core::application::network_service::CreateNetworkRequest;
use orion_core::application::platform::{Platform, PlatformBuilder};
use orion_core::domain::agent::{AgentBindings, AgentId};
use orion_core::domain::model::ModelId;
use orion_core::domain::tenant::Principal;
use orion_core::domain::tool::ToolId;
use orion_core::infrastructure::bootstrap::builtin_tool_adapters;
use orion_core::infrastructure::connectors::scripted::{CHAT_TYPE_SLUG, EMBEDDING_TYPE_SLUG};
use orion_core::infrastructure::connectors::ScriptedConnector;
use orion_core::infrastructure::datasets::InMemoryDatasetGateway;
use orion_core::infrastructure::registry::ConnectorRegistry;
use orion_core::infrastructure::secrets::AesGcmCipher;

pub struct TestPlatform {
    pub platform: Platform,
    pub chat: ScriptedConnector,
    pub datasets: Arc<InMemoryDatasetGateway>,
    pub alice: Principal,
    pub mallory: Principal,
}

pub fn platform() -> TestPlatform {
    let chat = ScriptedConnector::chat();
    let connectors = ConnectorRegistry::builder("connectors")
        .register(CHAT_TYPE_SLUG, None, Arc::new(chat.clone()))
        .register(EMBEDDING_TYPE_SLUG, None, Arc::new(ScriptedConnector::embeddings(3)))
        .build();
    let datasets = Arc::new(InMemoryDatasetGateway::new());
    let platform = PlatformBuilder::new(Arc::new(AesGcmCipher::new("integration-secret").unwrap()))
        .connectors(connectors)
        .tool_adapters(builtin_tool_adapters())
        .datasets(datasets.clone())
        .build();
    TestPlatform {
        platform,
        chat,
        datasets,
        alice: Principal::new("alice", "acme"),
        mallory: Principal::new("mallory", "globex"),
    }
}

pub async fn chat_model(t: &TestPlatform, name: &str) -> ModelId {
    t.platform
        .models
        .create(
            &t.alice,
            CreateModelRequest {
                name: name.to_string(),
                model_type: CHAT_TYPE_SLUG.into(),
                category: None,
                description: None,
                tags: None,
                config: json!({"api_key": "sk-live-123", "default_model": "scripted-1"}),
                config_schema_version: None,
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

pub async fn agent(t: &TestPlatform, name: &str, config: Value, tools: Vec<ToolId>) -> AgentId {
    let model_id = chat_model(t, &format!("{}-model", name)).await;
    t.platform
        .agents
        .create(
            &t.alice,
            CreateAgentRequest {
                name: name.to_string(),
                description: None,
                tags: None,
                agent_type: None,
                model_id,
                config,
                config_schema_version: None,
                bindings: AgentBindings { tools },
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

pub fn network_request(slug: &str, version: &str, spec: Value) -> CreateNetworkRequest {
    CreateNetworkRequest {
        name: format!("{} network", slug),
        slug: slug.to_string(),
        version: version.to_string(),
        network_type: None,
        description: None,
        tags: None,
        status: None,
        spec,
        is_enabled: None,
    }
}

pub fn standalone_spec(agent: AgentId) -> Value {
    json!({"type": "standalone", "nodes": [{"node_key": "assistant", "agent_id": agent}]})
}

pub fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}
