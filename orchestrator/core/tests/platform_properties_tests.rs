// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end behaviour of the assembled platform: models, tools, agents,
//! networks and chat threads wired together over in-memory repositories.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use orion_core::application::chat_service::{ChatInvokeRequest, CreateChatbotRequest, CreateThreadRequest};
use orion_core::application::model_service::{CreateModelRequest, UpdateModelRequest};
use orion_core::application::network_service::UpdateNetworkRequest;
use orion_core::application::platform::PlatformBuilder;
use orion_core::application::tool_service::CreateToolRequest;
use orion_core::domain::agent::{AgentId, AgentInvocation, ToolOverrides};
use orion_core::domain::chat::ChatRole;
use orion_core::domain::error::{Classified, ErrorKind};
use orion_core::domain::llm::MessageRole;
use orion_core::domain::network::{NetworkId, NetworkInvocation, NetworkStatus};
use orion_core::domain::redaction::REDACTED;
use orion_core::domain::tenant::Principal;
use orion_core::domain::tool::{ResourceBinding, ResourceType, ToolBindings, ToolId};
use orion_core::infrastructure::connectors::{openai_chat, ScriptedReply};
use orion_core::infrastructure::secrets::AesGcmCipher;

use common::{agent, network_request, platform, row, standalone_spec, TestPlatform};

async fn orders_tool(t: &TestPlatform, max_rows: u32) -> ToolId {
    let rows = (1..=5)
        .map(|i| row(&[("id", json!(i)), ("status", json!("open"))]))
        .collect();
    let dataset = t.datasets.add_sql(&t.alice.tenant_id, "orders", rows);
    t.platform
        .tools
        .create(
            &t.alice,
            CreateToolRequest {
                name: "orders".into(),
                description: Some("Open orders".into()),
                kind: "sql.select".into(),
                provider: None,
                bindings: ToolBindings {
                    resources: vec![ResourceBinding {
                        resource_type: ResourceType::Dataset,
                        id: dataset.0,
                        role: "primary".into(),
                    }],
                },
                config: json!({"max_rows": max_rows}),
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

async fn standalone_network(t: &TestPlatform, slug: &str, agent_id: AgentId) -> NetworkId {
    t.platform
        .networks
        .create(&t.alice, network_request(slug, "1.0.0", standalone_spec(agent_id)))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_node_must_reference_exactly_one_target() {
    let t = platform();
    let agent_id = agent(&t, "writer", json!({}), Vec::new()).await;
    let spec = json!({
        "type": "standalone",
        "nodes": [{"node_key": "n", "agent_id": agent_id, "child_network_id": NetworkId::new()}]
    });
    let err = t
        .platform
        .networks
        .create(&t.alice, network_request("both", "1", spec))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    assert!(err
        .to_string()
        .contains("Node must reference exactly one of agent_id or child_network_id"));
}

#[tokio::test]
async fn test_cycles_rejected_unless_swarm() {
    let t = platform();
    let a = agent(&t, "a", json!({}), Vec::new()).await;
    let b = agent(&t, "b", json!({}), Vec::new()).await;
    let graph = |network_type: &str| {
        json!({
            "type": network_type,
            "nodes": [{"node_key": "a", "agent_id": a}, {"node_key": "b", "agent_id": b}],
            "edges": [
                {"source_node_key": "a", "target_node_key": "b"},
                {"source_node_key": "b", "target_node_key": "a"}
            ]
        })
    };

    let err = t
        .platform
        .networks
        .create(&t.alice, network_request("loop", "1", graph("supervised")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AGENT_NETWORK_INVALID");

    let swarm = t
        .platform
        .networks
        .create(&t.alice, network_request("loop", "2", graph("swarm")))
        .await
        .unwrap();
    assert_eq!(swarm.spec.edges.len(), 2);
}

#[tokio::test]
async fn test_tool_policy_controls_offered_tools() {
    let t = platform();
    let tool = orders_tool(&t, 50).await;
    let agent_id = agent(&t, "clerk", json!({}), vec![tool]).await;

    t.platform
        .agents
        .invoke(&t.alice, agent_id, AgentInvocation { input: "hi".into(), ..Default::default() })
        .await
        .unwrap();
    t.platform
        .agents
        .invoke(
            &t.alice,
            agent_id,
            AgentInvocation {
                input: "hi".into(),
                tool_overrides: Some(ToolOverrides { allowed_tools: Some(Vec::new()) }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requests = t.chat.requests();
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "orders");
    assert!(requests[1].tools.is_empty());
}

#[tokio::test]
async fn test_agent_sql_call_is_capped_by_tool_config() {
    let t = platform();
    let tool = orders_tool(&t, 2).await;
    let agent_id = agent(&t, "clerk", json!({"system_prompt": "You look up orders."}), vec![tool]).await;

    t.chat.push(ScriptedReply::tool_call("orders", json!({"limit": 1000})));
    t.chat.push(ScriptedReply::text("Two open orders."));

    let result = t
        .platform
        .agents
        .invoke(&t.alice, agent_id, AgentInvocation { input: "List orders".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(result.output, "Two open orders.");
    assert_eq!(result.tool_calls, 1);
    assert_eq!(result.steps, 2);

    let second = &t.chat.requests()[1];
    let tool_message = second.messages.iter().find(|m| m.role == MessageRole::Tool).unwrap();
    let payload: Value = serde_json::from_str(&tool_message.text()).unwrap();
    assert_eq!(payload["row_count"], 2);
}

#[tokio::test]
async fn test_model_secrets_survive_masked_round_trip() {
    let t = platform();
    let model_id = common::chat_model(&t, "primary").await;

    let view = t.platform.models.get(&t.alice, model_id).await.unwrap();
    assert_eq!(view.config["api_key"], REDACTED);

    let updated = t
        .platform
        .models
        .update(
            &t.alice,
            model_id,
            UpdateModelRequest {
                config: Some(json!({"api_key": REDACTED, "default_model": "scripted-2"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.config["api_key"], REDACTED);
    assert_eq!(updated.config["default_model"], "scripted-2");

    let stored = t.platform.models.find(&t.alice, model_id).await.unwrap().unwrap();
    let config = t.platform.models.decrypt_config(&stored).unwrap();
    assert_eq!(config["api_key"], "sk-live-123");
    assert_eq!(config["default_model"], "scripted-2");

    let err = t.platform.models.get(&t.mallory, model_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_masked_update_still_authenticates_with_provider() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer sk-live-123")
        .with_status(200)
        .with_body(r#"{"data": [{"id": "gpt-4o-mini"}]}"#)
        .expect(2)
        .create_async()
        .await;

    let platform = PlatformBuilder::new(Arc::new(AesGcmCipher::new("integration-secret").unwrap())).build();
    let alice = Principal::new("alice", "acme");
    let created = platform
        .models
        .create(
            &alice,
            CreateModelRequest {
                name: "openai".to_string(),
                model_type: openai_chat::TYPE_SLUG.into(),
                category: None,
                description: None,
                tags: None,
                config: json!({"api_key": "sk-live-123", "base_url": server.url()}),
                config_schema_version: None,
                is_enabled: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.config["api_key"], REDACTED);

    let before = platform.models.test_connection(&alice, created.id, Some(5), false).await.unwrap();
    assert!(before.is_ok());

    let updated = platform
        .models
        .update(
            &alice,
            created.id,
            UpdateModelRequest {
                config: Some(json!({"api_key": REDACTED, "default_model": "gpt-4o-mini"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.config["api_key"], REDACTED);
    assert_eq!(updated.config["default_model"], "gpt-4o-mini");

    // An unmatched Authorization header would get mockito's 501 and fail here.
    let after = platform.models.test_connection(&alice, created.id, Some(5), false).await.unwrap();
    assert!(after.is_ok(), "{:?}", after.details);
    assert!(!after.billable);
    listing.assert_async().await;
}

#[tokio::test]
async fn test_slug_and_version_are_unique() {
    let t = platform();
    let agent_id = agent(&t, "writer", json!({}), Vec::new()).await;
    standalone_network(&t, "writer", agent_id).await;

    let err = t
        .platform
        .networks
        .create(&t.alice, network_request("writer", "1.0.0", standalone_spec(agent_id)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    t.platform
        .networks
        .create(&t.alice, network_request("writer", "1.1.0", standalone_spec(agent_id)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deleted_agent_cannot_be_referenced() {
    let t = platform();
    let agent_id = agent(&t, "ghost", json!({}), Vec::new()).await;
    t.platform.agents.delete(&t.alice, agent_id).await.unwrap();

    let err = t
        .platform
        .networks
        .create(&t.alice, network_request("ghost", "1", standalone_spec(agent_id)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    assert_eq!(err.to_string(), format!("Referenced agent not found: {}", agent_id));
}

#[tokio::test]
async fn test_references_block_deletion() {
    let t = platform();
    let agent_id = agent(&t, "writer", json!({}), Vec::new()).await;
    let network_id = standalone_network(&t, "writer", agent_id).await;
    t.platform
        .chatbots
        .create(
            &t.alice,
            CreateChatbotRequest {
                name: "Helper".into(),
                slug: "helper".into(),
                description: None,
                visibility: None,
                agent_network_id: Some(network_id),
                agent_network_version: Some("1.0.0".into()),
                is_enabled: None,
            },
        )
        .await
        .unwrap();

    let err = t.platform.agents.delete(&t.alice, agent_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = t.platform.networks.delete(&t.alice, network_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_chat_thread_conversation() {
    let t = platform();
    let agent_id = agent(&t, "concierge", json!({"system_prompt": "You are a concierge."}), Vec::new()).await;
    let network_id = standalone_network(&t, "concierge", agent_id).await;
    let chatbot = t
        .platform
        .chatbots
        .create(
            &t.alice,
            CreateChatbotRequest {
                name: "Concierge".into(),
                slug: "concierge".into(),
                description: None,
                visibility: None,
                agent_network_id: Some(network_id),
                agent_network_version: Some("1.0.0".into()),
                is_enabled: None,
            },
        )
        .await
        .unwrap();
    let thread = t
        .platform
        .threads
        .create(&t.alice, chatbot.id, CreateThreadRequest::default())
        .await
        .unwrap();

    t.chat.push(ScriptedReply::text("Sunny, 21 degrees."));
    t.chat.push(ScriptedReply::text("Rain is expected."));
    for input in ["Weather today?", "And tomorrow?"] {
        t.platform
            .threads
            .invoke(
                &t.alice,
                chatbot.id,
                thread.id,
                ChatInvokeRequest {
                    input: input.into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let second = &t.chat.requests()[1];
    let texts: Vec<String> = second.messages.iter().map(|m| m.text()).collect();
    assert_eq!(
        texts,
        vec!["You are a concierge.", "Weather today?", "Sunny, 21 degrees.", "And tomorrow?"]
    );

    let messages = t
        .platform
        .threads
        .list_messages(&t.alice, chatbot.id, thread.id, None, None)
        .await
        .unwrap();
    let roles: Vec<ChatRole> = messages.items.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]);
    assert_eq!(messages.items[3].text().as_deref(), Some("Rain is expected."));
    assert!(messages.items[3].run_id.is_some());

    let err = t
        .platform
        .threads
        .get(&t.mallory, chatbot.id, thread.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    t.platform
        .networks
        .update(
            &t.alice,
            network_id,
            UpdateNetworkRequest {
                status: Some(NetworkStatus::Deprecated),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = t
        .platform
        .threads
        .invoke(&t.alice, chatbot.id, thread.id, ChatInvokeRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Referenced agent network version is deprecated");
}

#[tokio::test]
async fn test_network_invocation_counts_tokens() {
    let t = platform();
    let agent_id = agent(&t, "echo", json!({}), Vec::new()).await;
    let network_id = standalone_network(&t, "echo", agent_id).await;

    let run = t
        .platform
        .networks
        .invoke(
            &t.alice,
            network_id,
            &NetworkInvocation {
                input: "  hello there  ".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(run.output, "echo: hello there");
    assert_eq!(run.active_agent.as_deref(), Some("assistant"));
    assert!(run.tokens.total_tokens > 0);
}
