// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Network
//!
//! Declarative multi-agent graphs. A [`NetworkSpec`] names nodes (agents or
//! pinned child networks) and advisory edges; [`NetworkValidator`] enforces the
//! structural invariants before anything runs, and a [`NetworkRuntime`]
//! registered per [`NetworkType`] executes it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Graph model, structural validation and the runtime port
//! - **Related:** `application::network_service`, `application::standalone`, `orion-swarm`
//!
//! ## Invariants
//!
//! - A node references exactly one of an agent or a child network. This is
//!   enforced when the spec is parsed, so an invalid node can never be held.
//! - Edges only connect existing node keys.
//! - Every network type except `swarm` is acyclic. Swarm transitions are
//!   handoffs and may loop.
//! - Edge `condition`s are metadata; nothing evaluates them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::agent::{AgentError, AgentId, RunFinish, ToolOverrides};
use crate::domain::error::{Classified, ErrorKind};
use crate::domain::llm::{ChatMessage, TokenUsage};
use crate::domain::repository::RepositoryError;
use crate::domain::tenant::{Principal, TenantId, UserId};

entity_id!(
    /// Unique identifier for an [`AgentNetwork`].
    NetworkId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Standalone,
    Supervised,
    Swarm,
    Custom,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Standalone => "standalone",
            NetworkType::Supervised => "supervised",
            NetworkType::Swarm => "swarm",
            NetworkType::Custom => "custom",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(NetworkType::Standalone),
            "supervised" => Ok(NetworkType::Supervised),
            "swarm" => Ok(NetworkType::Swarm),
            "custom" => Ok(NetworkType::Custom),
            other => Err(NetworkError::Invalid(format!("Unknown network type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStatus::Draft => "draft",
            NetworkStatus::Active => "active",
            NetworkStatus::Deprecated => "deprecated",
        }
    }
}

/// What a node runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeReference {
    Agent(AgentId),
    ChildNetwork { id: NetworkId, version: Option<String> },
}

/// A graph node. Construction goes through [`NodeSpec::from_parts`] (or
/// deserialization, which calls it) so the agent/child-network XOR always
/// holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNodeSpec", into = "RawNodeSpec")]
pub struct NodeSpec {
    node_key: String,
    role: Option<String>,
    reference: NodeReference,
    config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNodeSpec {
    node_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    agent_id: Option<AgentId>,
    #[serde(default)]
    child_network_id: Option<NetworkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    child_network_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<Value>,
}

impl TryFrom<RawNodeSpec> for NodeSpec {
    type Error = String;

    fn try_from(raw: RawNodeSpec) -> Result<Self, Self::Error> {
        NodeSpec::from_parts(
            raw.node_key,
            raw.role,
            raw.agent_id,
            raw.child_network_id,
            raw.child_network_version,
            raw.config,
        )
        .map_err(|e| e.to_string())
    }
}

impl From<NodeSpec> for RawNodeSpec {
    fn from(node: NodeSpec) -> Self {
        let (agent_id, child_network_id, child_network_version) = match node.reference {
            NodeReference::Agent(id) => (Some(id), None, None),
            NodeReference::ChildNetwork { id, version } => (None, Some(id), version),
        };
        RawNodeSpec {
            node_key: node.node_key,
            role: node.role,
            agent_id,
            child_network_id,
            child_network_version,
            config: node.config,
        }
    }
}

impl NodeSpec {
    pub fn from_parts(
        node_key: String,
        role: Option<String>,
        agent_id: Option<AgentId>,
        child_network_id: Option<NetworkId>,
        child_network_version: Option<String>,
        config: Option<Value>,
    ) -> Result<Self, NetworkError> {
        let key_len = node_key.chars().count();
        if key_len == 0 || key_len > 64 {
            return Err(NetworkError::Invalid(
                "node_key must be between 1 and 64 characters".to_string(),
            ));
        }
        if role.as_ref().is_some_and(|r| r.chars().count() > 32) {
            return Err(NetworkError::Invalid(
                "role must be at most 32 characters".to_string(),
            ));
        }
        let reference = match (agent_id, child_network_id) {
            (Some(agent), None) => NodeReference::Agent(agent),
            (None, Some(id)) => NodeReference::ChildNetwork {
                id,
                version: child_network_version
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            },
            _ => {
                return Err(NetworkError::Invalid(
                    "Node must reference exactly one of agent_id or child_network_id".to_string(),
                ))
            }
        };
        Ok(Self {
            node_key,
            role,
            reference,
            config,
        })
    }

    pub fn agent(node_key: impl Into<String>, agent_id: AgentId) -> Result<Self, NetworkError> {
        Self::from_parts(node_key.into(), None, Some(agent_id), None, None, None)
    }

    pub fn node_key(&self) -> &str {
        &self.node_key
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn reference(&self) -> &NodeReference {
        &self.reference
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        match self.reference {
            NodeReference::Agent(id) => Some(id),
            NodeReference::ChildNetwork { .. } => None,
        }
    }

    pub fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source_node_key: String,
    pub target_node_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    #[serde(default)]
    pub inputs_schema: Value,
    #[serde(default)]
    pub outputs_schema: Value,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

/// Raw `swarm` section; interpreted by [`NetworkValidator::swarm_settings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_active_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<InterfaceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm: Option<SwarmPolicy>,
}

impl NetworkSpec {
    pub fn from_value(value: &Value) -> Result<Self, NetworkError> {
        serde_json::from_value(value.clone()).map_err(|e| NetworkError::Invalid(e.to_string()))
    }

    pub fn node(&self, key: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.node_key == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNetwork {
    pub id: NetworkId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    pub description: Option<String>,
    pub tags: Option<Value>,
    pub version: String,
    pub status: NetworkStatus,
    pub spec: NetworkSpec,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Field-length rules for the network header.
pub fn check_header(name: &str, slug: &str, version: &str) -> Result<(), NetworkError> {
    let within = |value: &str, max: usize| {
        let len = value.trim().chars().count();
        len >= 1 && len <= max
    };
    if !within(name, 128) {
        return Err(NetworkError::Invalid("name must be between 1 and 128 characters".into()));
    }
    if !within(slug, 128) {
        return Err(NetworkError::Invalid("slug must be between 1 and 128 characters".into()));
    }
    if !within(version, 32) {
        return Err(NetworkError::Invalid("version must be between 1 and 32 characters".into()));
    }
    Ok(())
}

// Denormalized rows, rebuilt from the spec on every create/update.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNodeRow {
    pub id: Uuid,
    pub network_id: NetworkId,
    pub node_key: String,
    pub agent_id: Option<AgentId>,
    pub child_network_id: Option<NetworkId>,
    pub child_network_version: Option<String>,
    pub role: Option<String>,
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdgeRow {
    pub id: Uuid,
    pub network_id: NetworkId,
    pub source_node_key: String,
    pub target_node_key: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceRow {
    pub network_id: NetworkId,
    pub version: String,
    pub inputs_schema: Value,
    pub outputs_schema: Value,
    pub streaming: bool,
    pub capabilities: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkGraph {
    pub nodes: Vec<NetworkNodeRow>,
    pub edges: Vec<NetworkEdgeRow>,
    pub interface: Option<NetworkInterfaceRow>,
}

impl NetworkGraph {
    pub fn denormalize(network: &AgentNetwork) -> Self {
        let nodes = network
            .spec
            .nodes
            .iter()
            .map(|n| {
                let (agent_id, child_network_id, child_network_version) = match &n.reference {
                    NodeReference::Agent(id) => (Some(*id), None, None),
                    NodeReference::ChildNetwork { id, version } => (None, Some(*id), version.clone()),
                };
                NetworkNodeRow {
                    id: Uuid::new_v4(),
                    network_id: network.id,
                    node_key: n.node_key.clone(),
                    agent_id,
                    child_network_id,
                    child_network_version,
                    role: n.role.clone(),
                    config: n.config.clone(),
                }
            })
            .collect();
        let edges = network
            .spec
            .edges
            .iter()
            .map(|e| NetworkEdgeRow {
                id: Uuid::new_v4(),
                network_id: network.id,
                source_node_key: e.source_node_key.clone(),
                target_node_key: e.target_node_key.clone(),
                condition: e.condition.clone(),
            })
            .collect();
        let interface = network.spec.interface.as_ref().map(|i| NetworkInterfaceRow {
            network_id: network.id,
            version: network.version.clone(),
            inputs_schema: object_or_empty(&i.inputs_schema),
            outputs_schema: object_or_empty(&i.outputs_schema),
            streaming: i.streaming,
            capabilities: i.capabilities.clone(),
        });
        Self { nodes, edges, interface }
    }
}

fn object_or_empty(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPolicy {
    #[default]
    Edges,
    AllowAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmSettings {
    pub default_active_agent: Option<String>,
    pub handoff_policy: HandoffPolicy,
}

/// Structural checks over a parsed spec. Reference resolution needs the
/// repositories and lives in the network service.
pub struct NetworkValidator;

impl NetworkValidator {
    /// Everything that can be checked without a repository, in the order the
    /// service applies it.
    pub fn validate_structure(spec: &NetworkSpec) -> Result<(), NetworkError> {
        Self::check_node_keys(spec)?;
        Self::check_edges(spec)?;
        if spec.network_type != NetworkType::Swarm {
            Self::check_for_cycles(spec)?;
        } else {
            Self::swarm_settings(spec)?;
        }
        Ok(())
    }

    pub fn check_node_keys(spec: &NetworkSpec) -> Result<(), NetworkError> {
        let mut seen = HashSet::new();
        for node in &spec.nodes {
            if !seen.insert(node.node_key.as_str()) {
                return Err(NetworkError::Invalid(format!("Duplicate node key: {}", node.node_key)));
            }
        }
        Ok(())
    }

    pub fn check_edges(spec: &NetworkSpec) -> Result<(), NetworkError> {
        let keys: HashSet<&str> = spec.nodes.iter().map(|n| n.node_key.as_str()).collect();
        for edge in &spec.edges {
            if !keys.contains(edge.source_node_key.as_str()) || !keys.contains(edge.target_node_key.as_str()) {
                return Err(NetworkError::Invalid("Edge references unknown node key".to_string()));
            }
        }
        Ok(())
    }

    /// Three-color depth-first search with an explicit stack. Roots are taken
    /// in spec order and the first back edge fails the check.
    pub fn check_for_cycles(spec: &NetworkSpec) -> Result<(), NetworkError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let index: HashMap<&str, usize> = spec
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.node_key.as_str(), i))
            .collect();
        let mut adjacency = vec![Vec::new(); spec.nodes.len()];
        for edge in &spec.edges {
            if let (Some(&src), Some(&dst)) = (
                index.get(edge.source_node_key.as_str()),
                index.get(edge.target_node_key.as_str()),
            ) {
                adjacency[src].push(dst);
            }
        }

        let mut color = vec![Color::White; spec.nodes.len()];
        for root in 0..spec.nodes.len() {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                match adjacency[node].get(cursor) {
                    Some(&child) => {
                        frame.1 += 1;
                        match color[child] {
                            Color::Gray => {
                                return Err(NetworkError::Invalid("Cycle detected in network edges".to_string()))
                            }
                            Color::White => {
                                color[child] = Color::Gray;
                                stack.push((child, 0));
                            }
                            Color::Black => {}
                        }
                    }
                    None => {
                        color[node] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    pub fn swarm_settings(spec: &NetworkSpec) -> Result<SwarmSettings, NetworkError> {
        if spec.nodes.iter().any(|n| n.agent_id().is_none()) {
            return Err(NetworkError::Invalid(
                "Swarm nodes must reference agents only".to_string(),
            ));
        }
        let policy = spec.swarm.clone().unwrap_or_default();
        let default_active_agent = policy
            .default_active_agent
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(name) = &default_active_agent {
            if spec.node(name).is_none() {
                return Err(NetworkError::Invalid(
                    "default_active_agent must match a node_key".to_string(),
                ));
            }
        }
        let handoff_policy = match policy.handoff_policy.as_deref().map(str::trim) {
            None | Some("") | Some("edges") => HandoffPolicy::Edges,
            Some("allow_all") => HandoffPolicy::AllowAll,
            Some(_) => {
                return Err(NetworkError::Invalid(
                    "handoff_policy must be 'edges' or 'allow_all'".to_string(),
                ))
            }
        };
        Ok(SwarmSettings {
            default_active_agent,
            handoff_policy,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeOverrides {
    #[serde(default)]
    pub tool_overrides: Option<ToolOverrides>,
    #[serde(default)]
    pub llm_overrides: Option<Map<String, Value>>,
}

/// Input of one network invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInvocation {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Explicit starting transcript; when non-empty it takes precedence over
    /// `history` + `input`.
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub runtime_overrides: RuntimeOverrides,
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    /// Accepted for compatibility; responses are never streamed.
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRunResult {
    pub output: String,
    pub run_id: Uuid,
    pub network_type: NetworkType,
    pub steps: u32,
    pub tool_calls: u32,
    pub tokens: TokenUsage,
    pub latency_ms: u64,
    pub finish_reason: RunFinish,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
    #[serde(default)]
    pub handoffs: u32,
    #[serde(default)]
    pub citations: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<ChatMessage>,
}

/// Executes one network type.
#[async_trait]
pub trait NetworkRuntime: Send + Sync {
    fn network_type(&self) -> NetworkType;

    async fn invoke(
        &self,
        principal: &Principal,
        network: &AgentNetwork,
        request: &NetworkInvocation,
    ) -> Result<NetworkRunResult, NetworkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Agent network not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl Classified for NetworkError {
    fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::NotFound => ErrorKind::NotFound,
            NetworkError::Conflict(_) | NetworkError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            NetworkError::Invalid(_) => ErrorKind::ValidationInvalid,
            NetworkError::NotImplemented(_) => ErrorKind::NotImplemented,
            NetworkError::Agent(e) => e.kind(),
            NetworkError::Repository(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            NetworkError::Agent(e) => e.code(),
            _ => match self.kind() {
                ErrorKind::NotFound => "AGENT_NETWORK_NOT_FOUND",
                ErrorKind::Conflict => "AGENT_NETWORK_CONFLICT",
                ErrorKind::NotImplemented => "AGENT_NETWORK_NOT_IMPLEMENTED",
                ErrorKind::Internal => "AGENT_NETWORK_INTERNAL",
                _ => "AGENT_NETWORK_INVALID",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> NetworkSpec {
        NetworkSpec::from_value(&value).unwrap()
    }

    #[test]
    fn test_node_requires_exactly_one_reference() {
        let both = NodeSpec::from_parts("a".into(), None, Some(AgentId::new()), Some(NetworkId::new()), None, None);
        let neither = NodeSpec::from_parts("a".into(), None, None, None, None, None);
        for result in [both, neither] {
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "Node must reference exactly one of agent_id or child_network_id");
            assert_eq!(err.code(), "AGENT_NETWORK_INVALID");
        }

        let err = NetworkSpec::from_value(&json!({
            "type": "standalone",
            "nodes": [{"node_key": "a"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("exactly one of agent_id or child_network_id"));
    }

    #[test]
    fn test_node_round_trips_through_raw_shape() {
        let agent = AgentId::new();
        let parsed = spec(json!({
            "type": "standalone",
            "nodes": [{"node_key": "solo", "agent_id": agent, "role": "worker"}]
        }));
        assert_eq!(parsed.nodes[0].agent_id(), Some(agent));
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["nodes"][0]["agent_id"], json!(agent));
        assert!(value["nodes"][0]["child_network_id"].is_null());
    }

    #[test]
    fn test_node_key_length() {
        assert!(NodeSpec::agent("", AgentId::new()).is_err());
        assert!(NodeSpec::agent("k".repeat(65), AgentId::new()).is_err());
        assert!(NodeSpec::agent("k".repeat(64), AgentId::new()).is_ok());
    }

    #[test]
    fn test_edges_must_reference_nodes() {
        let s = spec(json!({
            "type": "supervised",
            "nodes": [{"node_key": "a", "agent_id": AgentId::new()}],
            "edges": [{"source_node_key": "a", "target_node_key": "ghost"}]
        }));
        let err = NetworkValidator::validate_structure(&s).unwrap_err();
        assert_eq!(err.to_string(), "Edge references unknown node key");
    }

    #[test]
    fn test_cycle_detected_except_for_swarm() {
        let nodes = json!([
            {"node_key": "a", "agent_id": AgentId::new()},
            {"node_key": "b", "agent_id": AgentId::new()},
            {"node_key": "c", "agent_id": AgentId::new()}
        ]);
        let edges = json!([
            {"source_node_key": "a", "target_node_key": "b"},
            {"source_node_key": "b", "target_node_key": "c"},
            {"source_node_key": "c", "target_node_key": "a"}
        ]);
        let custom = spec(json!({"type": "custom", "nodes": nodes, "edges": edges}));
        let err = NetworkValidator::validate_structure(&custom).unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected in network edges");

        let swarm = spec(json!({"type": "swarm", "nodes": nodes, "edges": edges}));
        assert!(NetworkValidator::validate_structure(&swarm).is_ok());
    }

    #[test]
    fn test_diamond_is_acyclic_and_self_loop_is_not() {
        let nodes = json!([
            {"node_key": "a", "agent_id": AgentId::new()},
            {"node_key": "b", "agent_id": AgentId::new()},
            {"node_key": "c", "agent_id": AgentId::new()},
            {"node_key": "d", "agent_id": AgentId::new()}
        ]);
        let diamond = spec(json!({"type": "custom", "nodes": nodes, "edges": [
            {"source_node_key": "a", "target_node_key": "b"},
            {"source_node_key": "a", "target_node_key": "c"},
            {"source_node_key": "b", "target_node_key": "d"},
            {"source_node_key": "c", "target_node_key": "d"}
        ]}));
        assert!(NetworkValidator::check_for_cycles(&diamond).is_ok());

        let looped = spec(json!({"type": "custom", "nodes": nodes, "edges": [
            {"source_node_key": "d", "target_node_key": "d"}
        ]}));
        assert!(NetworkValidator::check_for_cycles(&looped).is_err());
    }

    #[test]
    fn test_swarm_settings() {
        let s = spec(json!({
            "type": "swarm",
            "nodes": [
                {"node_key": "triage", "agent_id": AgentId::new()},
                {"node_key": "billing", "agent_id": AgentId::new()}
            ],
            "swarm": {"default_active_agent": "  billing ", "handoff_policy": "allow_all"}
        }));
        let settings = NetworkValidator::swarm_settings(&s).unwrap();
        assert_eq!(settings.default_active_agent.as_deref(), Some("billing"));
        assert_eq!(settings.handoff_policy, HandoffPolicy::AllowAll);

        let mut bad = s.clone();
        bad.swarm = Some(SwarmPolicy {
            default_active_agent: Some("nobody".into()),
            handoff_policy: None,
        });
        assert!(NetworkValidator::swarm_settings(&bad).is_err());

        bad.swarm = Some(SwarmPolicy {
            default_active_agent: None,
            handoff_policy: Some("broadcast".into()),
        });
        assert!(NetworkValidator::swarm_settings(&bad).is_err());
    }

    #[test]
    fn test_swarm_rejects_child_networks() {
        let s = spec(json!({
            "type": "swarm",
            "nodes": [{"node_key": "sub", "child_network_id": NetworkId::new(), "child_network_version": "1"}]
        }));
        let err = NetworkValidator::swarm_settings(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
    }
}
