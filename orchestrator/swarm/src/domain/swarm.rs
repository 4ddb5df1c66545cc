// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Topology and Handoff Protocol
//!
//! A swarm is a set of agent nodes that pass control to each other through
//! handoff tool calls. This module holds the pure parts:
//!
//! - [`SwarmTopology`]: who may hand off to whom, and who starts.
//! - Handoff texts: tool names, descriptions and the messages appended to the
//!   transcript when control moves.
//! - [`extract_output`]: the final answer of a finished run.
//!
//! ## State machine
//!
//! States are node keys. The initial state is the default active agent. The
//! only transition is a handoff tool call; a turn that ends without one is
//! terminal.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use orion_core::domain::llm::{ChatMessage, MessageRole};
use orion_core::domain::network::{HandoffPolicy, NetworkError, NetworkSpec, NetworkType, NetworkValidator};

/// Model calls allowed across all agents of one swarm run.
pub const RECURSION_LIMIT: u32 = 25;

pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmTopology {
    nodes: Vec<String>,
    destinations: BTreeMap<String, Vec<String>>,
    default_active: String,
}

impl SwarmTopology {
    pub fn from_spec(spec: &NetworkSpec) -> Result<Self, NetworkError> {
        if spec.network_type != NetworkType::Swarm {
            return Err(NetworkError::Invalid(format!(
                "Expected a swarm network, got '{}'",
                spec.network_type
            )));
        }
        let settings = NetworkValidator::swarm_settings(spec)?;
        let nodes: Vec<String> = spec.nodes.iter().map(|n| n.node_key().to_string()).collect();
        let Some(first) = nodes.first() else {
            return Err(NetworkError::Invalid("Swarm network must have at least one node".to_string()));
        };
        let default_active = settings.default_active_agent.unwrap_or_else(|| first.clone());

        let mut destinations: BTreeMap<String, BTreeSet<String>> =
            nodes.iter().map(|n| (n.clone(), BTreeSet::new())).collect();
        match settings.handoff_policy {
            HandoffPolicy::Edges => {
                for edge in &spec.edges {
                    if edge.source_node_key != edge.target_node_key {
                        if let Some(targets) = destinations.get_mut(&edge.source_node_key) {
                            targets.insert(edge.target_node_key.clone());
                        }
                    }
                }
            }
            HandoffPolicy::AllowAll => {
                for (source, targets) in destinations.iter_mut() {
                    targets.extend(nodes.iter().filter(|n| *n != source).cloned());
                }
            }
        }

        Ok(Self {
            nodes,
            destinations: destinations
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            default_active,
        })
    }

    /// Node keys in spec order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn default_active(&self) -> &str {
        &self.default_active
    }

    /// Sorted handoff targets of `node`; never includes `node` itself.
    pub fn destinations(&self, node: &str) -> &[String] {
        self.destinations.get(node).map(Vec::as_slice).unwrap_or_default()
    }
}

pub fn handoff_tool_name(destination: &str) -> String {
    format!("{}{}", HANDOFF_TOOL_PREFIX, destination)
}

pub fn handoff_description(destination: &str, summary: Option<&str>) -> String {
    match summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!("Transfer conversation to {}. {}", destination, summary),
        None => format!("Transfer conversation to {}.", destination),
    }
}

/// Messages appended when `source` hands off to `destination`: the tool
/// marker answering the call, then, when the user said anything, a system
/// instruction and a trimmed copy of the last non-blank user message.
pub fn handoff_messages(
    source: &str,
    destination: &str,
    call_id: &str,
    transcript: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::tool(
        call_id,
        format!("Transferred from {} to {}", source, destination),
    )];

    let last_question = transcript
        .iter()
        .rev()
        .filter(|m| m.role == MessageRole::Human)
        .map(ChatMessage::text)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty());

    if let Some(question) = last_question {
        messages.push(ChatMessage::system(format!(
            "You are {}. Respond directly to the user's question. If the request involves multiple topics, \
             address all relevant aspects you can help with. Provide a helpful response and end with: \
             'If you want me to go deeper on any area, tell me which.'",
            destination
        )));
        messages.push(ChatMessage::human(format!(
            "Context from {}: The user asked: '{}'.\nPlease provide a comprehensive answer addressing all relevant aspects.",
            source, question
        )));
    }
    messages
}

/// Final answer of a run state.
///
/// A string is used as is. A list is scanned backwards for the last AI
/// message with content, falling back to the joined items. An object is
/// searched through its `messages` list, otherwise stringified.
pub fn extract_output(state: &Value) -> String {
    match state {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let last_ai = items
                .iter()
                .rev()
                .filter(|item| item.get("role").and_then(Value::as_str) == Some("ai"))
                .map(|item| content_text(item.get("content").unwrap_or(&Value::Null)))
                .find(|text| !text.trim().is_empty());
            match last_ai {
                Some(text) => text,
                None => items
                    .iter()
                    .map(extract_output)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            }
        }
        Value::Object(map) => match map.get("messages") {
            Some(messages @ Value::Array(_)) => extract_output(messages),
            _ => state.to_string(),
        },
        other => other.to_string(),
    }
}

fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::domain::agent::AgentId;
    use serde_json::json;

    fn swarm(extra: Value) -> NetworkSpec {
        let mut value = json!({
            "type": "swarm",
            "nodes": [
                {"node_key": "triage", "agent_id": AgentId::new()},
                {"node_key": "billing", "agent_id": AgentId::new()},
                {"node_key": "tech", "agent_id": AgentId::new()}
            ]
        });
        if let (Some(target), Some(source)) = (value.as_object_mut(), extra.as_object()) {
            target.extend(source.clone());
        }
        NetworkSpec::from_value(&value).unwrap()
    }

    #[test]
    fn test_edges_policy_excludes_self() {
        let spec = swarm(json!({"edges": [
            {"source_node_key": "triage", "target_node_key": "tech"},
            {"source_node_key": "triage", "target_node_key": "billing"},
            {"source_node_key": "triage", "target_node_key": "triage"}
        ]}));
        let topology = SwarmTopology::from_spec(&spec).unwrap();
        assert_eq!(topology.default_active(), "triage");
        assert_eq!(topology.destinations("triage"), ["billing", "tech"]);
        assert!(topology.destinations("billing").is_empty());
    }

    #[test]
    fn test_allow_all_policy() {
        let spec = swarm(json!({"swarm": {"handoff_policy": "allow_all", "default_active_agent": "tech"}}));
        let topology = SwarmTopology::from_spec(&spec).unwrap();
        assert_eq!(topology.default_active(), "tech");
        assert_eq!(topology.destinations("billing"), ["tech", "triage"]);
        for node in topology.nodes() {
            assert!(!topology.destinations(node).contains(node));
        }
    }

    #[test]
    fn test_handoff_texts() {
        assert_eq!(handoff_tool_name("billing"), "transfer_to_billing");
        assert_eq!(
            handoff_description("billing", Some("Handles invoices")),
            "Transfer conversation to billing. Handles invoices"
        );
        assert_eq!(handoff_description("billing", Some("  ")), "Transfer conversation to billing.");
    }

    #[test]
    fn test_handoff_messages_forward_last_question() {
        let transcript = vec![
            ChatMessage::human("first"),
            ChatMessage::ai("hm"),
            ChatMessage::human("  refund my order  "),
            ChatMessage::human(""),
        ];
        let messages = handoff_messages("triage", "billing", "call_1", &transcript);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text(), "Transferred from triage to billing");
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[1].role, MessageRole::System);
        assert!(messages[1].text().starts_with("You are billing."));
        assert!(messages[2]
            .text()
            .starts_with("Context from triage: The user asked: 'refund my order'."));

        let marker_only = handoff_messages("triage", "billing", "call_2", &[ChatMessage::ai("x")]);
        assert_eq!(marker_only.len(), 1);
    }

    #[test]
    fn test_extract_output_fallbacks() {
        let state = json!({"messages": [
            {"role": "human", "content": "q"},
            {"role": "ai", "content": "answer"},
            {"role": "ai", "content": ""}
        ]});
        assert_eq!(extract_output(&state), "answer");

        let parts = json!([{"role": "ai", "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}]);
        assert_eq!(extract_output(&parts), "ab");

        assert_eq!(extract_output(&json!(["x", "y"])), "x\ny");
        assert_eq!(extract_output(&json!("plain")), "plain");
        assert_eq!(extract_output(&json!({"k": 1})), r#"{"k":1}"#);
    }
}
