// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::{json, Value};
use std::sync::Arc;

use orion_core::application::agent_service::CreateAgentRequest;
use orion_core::application::model_service::CreateModelRequest;
use orion_core::application::network_service::CreateNetworkRequest;
use orion_core::application::platform::{Platform, PlatformBuilder};
use orion_core::domain::agent::{AgentBindings, AgentId, RunFinish};
use orion_core::domain::llm::{ChatMessage, MessageRole};
use orion_core::domain::network::{NetworkId, NetworkInvocation, NetworkType};
use orion_core::domain::tenant::Principal;
use orion_core::infrastructure::connectors::scripted::CHAT_TYPE_SLUG;
use orion_core::infrastructure::connectors::{ScriptedConnector, ScriptedReply};
use orion_core::infrastructure::registry::ConnectorRegistry;
use orion_core::infrastructure::secrets::AesGcmCipher;
use orion_swarm::SwarmRuntime;

struct Harness {
    platform: Platform,
    chat: ScriptedConnector,
    principal: Principal,
}

fn harness() -> Harness {
    let chat = ScriptedConnector::chat();
    let connectors = ConnectorRegistry::builder("connectors")
        .register(CHAT_TYPE_SLUG, None, Arc::new(chat.clone()))
        .build();
    let platform = PlatformBuilder::new(Arc::new(AesGcmCipher::new("swarm-tests").unwrap()))
        .connectors(connectors)
        .runtime(NetworkType::Swarm, SwarmRuntime::factory())
        .build();
    Harness {
        platform,
        chat,
        principal: Principal::new("u1", "t1"),
    }
}

async fn agent(h: &Harness, name: &str, description: &str) -> AgentId {
    let model_id = h
        .platform
        .models
        .create(
            &h.principal,
            CreateModelRequest {
                name: format!("{}-model", name),
                model_type: CHAT_TYPE_SLUG.into(),
                category: None,
                description: None,
                tags: None,
                config: json!({}),
                config_schema_version: None,
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id;
    h.platform
        .agents
        .create(
            &h.principal,
            CreateAgentRequest {
                name: name.into(),
                description: Some(description.into()),
                tags: None,
                agent_type: None,
                model_id,
                config: json!({"system_prompt": format!("You are the {} agent.", name)}),
                config_schema_version: None,
                bindings: AgentBindings::default(),
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

async fn swarm(h: &Harness, nodes: &[(&str, AgentId)], extra: Value) -> NetworkId {
    let mut spec = json!({
        "type": "swarm",
        "nodes": nodes
            .iter()
            .map(|(key, id)| json!({"node_key": key, "agent_id": id}))
            .collect::<Vec<_>>(),
    });
    if let (Some(target), Some(source)) = (spec.as_object_mut(), extra.as_object()) {
        target.extend(source.clone());
    }
    h.platform
        .networks
        .create(
            &h.principal,
            CreateNetworkRequest {
                name: "Support swarm".into(),
                slug: "support".into(),
                version: "1.0.0".into(),
                network_type: Some(NetworkType::Swarm),
                description: None,
                tags: None,
                status: None,
                spec,
                is_enabled: None,
            },
        )
        .await
        .unwrap()
        .id
}

fn offered_tools(request: &orion_core::domain::llm::ChatRequest) -> Vec<String> {
    request.tools.iter().map(|t| t.name.clone()).collect()
}

#[tokio::test]
async fn test_handoff_routes_to_destination() {
    let h = harness();
    let triage = agent(&h, "triage", "Routes requests").await;
    let billing = agent(&h, "billing", "Handles invoices and refunds").await;
    let network = swarm(
        &h,
        &[("triage", triage), ("billing", billing)],
        json!({"edges": [{"source_node_key": "triage", "target_node_key": "billing"}]}),
    )
    .await;

    h.chat.push(ScriptedReply::tool_call("transfer_to_billing", json!({})));
    h.chat.push(ScriptedReply::text("Your refund is on its way."));

    let result = h
        .platform
        .networks
        .invoke(
            &h.principal,
            network,
            &NetworkInvocation {
                input: "I want a refund".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.output, "Your refund is on its way.");
    assert_eq!(result.network_type, NetworkType::Swarm);
    assert_eq!(result.active_agent.as_deref(), Some("billing"));
    assert_eq!(result.handoffs, 1);
    assert_eq!(result.steps, 2);
    assert_eq!(result.finish_reason, RunFinish::Stop);

    let requests = h.chat.requests();
    assert_eq!(offered_tools(&requests[0]), vec!["transfer_to_billing"]);
    assert_eq!(
        requests[0].tools[0].description,
        "Transfer conversation to billing. Handles invoices and refunds"
    );
    assert!(offered_tools(&requests[1]).is_empty());
    assert_eq!(requests[1].messages[0].text(), "You are the billing agent.");

    let marker = result
        .transcript
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(marker.text(), "Transferred from triage to billing");
    let forwarded = result.transcript.last().map(ChatMessage::text);
    assert_eq!(forwarded.as_deref(), Some("Your refund is on its way."));
    assert!(result
        .transcript
        .iter()
        .any(|m| m.text().starts_with("Context from triage: The user asked: 'I want a refund'.")));
}

#[tokio::test]
async fn test_allow_all_never_offers_self_handoff() {
    let h = harness();
    let a = agent(&h, "alpha", "First").await;
    let b = agent(&h, "beta", "Second").await;
    let c = agent(&h, "gamma", "Third").await;
    let network = swarm(
        &h,
        &[("alpha", a), ("beta", b), ("gamma", c)],
        json!({"swarm": {"handoff_policy": "allow_all", "default_active_agent": "beta"}}),
    )
    .await;

    h.chat.push(ScriptedReply::text("hello from beta"));
    let result = h
        .platform
        .networks
        .invoke(&h.principal, network, &NetworkInvocation::default())
        .await
        .unwrap();
    assert_eq!(result.active_agent.as_deref(), Some("beta"));
    assert_eq!(result.handoffs, 0);

    let requests = h.chat.requests();
    assert_eq!(offered_tools(&requests[0]), vec!["transfer_to_alpha", "transfer_to_gamma"]);
}

#[tokio::test]
async fn test_recursion_limit_stops_ping_pong() {
    let h = harness();
    let a = agent(&h, "ping", "Ping").await;
    let b = agent(&h, "pong", "Pong").await;
    let network = swarm(
        &h,
        &[("ping", a), ("pong", b)],
        json!({"swarm": {"handoff_policy": "allow_all"}}),
    )
    .await;

    for i in 0..30 {
        let target = if i % 2 == 0 { "transfer_to_pong" } else { "transfer_to_ping" };
        h.chat.push(ScriptedReply::tool_call(target, json!({})));
    }

    let result = h
        .platform
        .networks
        .invoke(
            &h.principal,
            network,
            &NetworkInvocation {
                input: "go".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.steps, 25);
    assert_eq!(result.handoffs, 25);
    assert_eq!(result.finish_reason, RunFinish::MaxSteps);
}

#[tokio::test]
async fn test_explicit_messages_seed_the_transcript() {
    let h = harness();
    let a = agent(&h, "solo", "Only node").await;
    let network = swarm(&h, &[("solo", a)], json!({})).await;

    let result = h
        .platform
        .networks
        .invoke(
            &h.principal,
            network,
            &NetworkInvocation {
                input: "ignored".into(),
                messages: Some(vec![ChatMessage::human("earlier"), ChatMessage::human("latest")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The scripted model echoes the last human message when nothing is queued.
    assert_eq!(result.output, "echo: latest");
    let request = h.chat.requests().pop().unwrap();
    assert_eq!(request.messages.len(), 3);
    assert!(request.tools.is_empty());
}

#[tokio::test]
async fn test_empty_messages_fall_back_to_input() {
    let h = harness();
    let a = agent(&h, "solo", "Only node").await;
    let network = swarm(&h, &[("solo", a)], json!({})).await;

    let result = h
        .platform
        .networks
        .invoke(
            &h.principal,
            network,
            &NetworkInvocation {
                input: "  hello there ".into(),
                history: vec![ChatMessage::human("before"), ChatMessage::ai("noted")],
                messages: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.output, "echo: hello there");
    let request = h.chat.requests().pop().unwrap();
    let texts: Vec<(MessageRole, String)> = request.messages.iter().map(|m| (m.role, m.text())).collect();
    assert_eq!(
        texts,
        vec![
            (MessageRole::System, "You are the solo agent.".to_string()),
            (MessageRole::Human, "before".to_string()),
            (MessageRole::Ai, "noted".to_string()),
            (MessageRole::Human, "hello there".to_string()),
        ]
    );
}
