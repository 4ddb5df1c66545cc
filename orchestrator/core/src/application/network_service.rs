// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Network Service
//!
//! Lifecycle of versioned agent networks plus validation and dispatch of
//! invocations to the [`NetworkRuntime`] registered for the network type.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Enforce graph invariants against the repositories and route
//!   runs to runtimes
//! - **Related:** `domain::network`, `application::standalone`, `orion-swarm`
//!
//! Validation is two-phase: structural checks from
//! [`NetworkValidator::validate_structure`], then reference resolution of each
//! node against the agent and network repositories of the caller's tenant.
//! Both phases run on create, on every spec replacement and before every
//! invocation.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::application::{Listing, Paging, ValidationStatus};
use crate::domain::network::{
    check_header, AgentNetwork, NetworkError, NetworkGraph, NetworkId, NetworkInvocation, NetworkRunResult,
    NetworkSpec, NetworkStatus, NetworkType, NetworkValidator, NodeReference,
};
use crate::domain::repository::{AgentRepository, ChatbotRepository, NetworkFilter, NetworkRepository};
use crate::domain::tenant::Principal;
use crate::infrastructure::registry::RuntimeRegistry;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub slug: String,
    pub version: String,
    /// Optional; must agree with `spec.type` when given.
    #[serde(default, rename = "type")]
    pub network_type: Option<NetworkType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub status: Option<NetworkStatus>,
    pub spec: Value,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNetworkRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub status: Option<NetworkStatus>,
    /// Full replacement; the graph rows are rebuilt from it.
    #[serde(default)]
    pub spec: Option<Value>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

pub struct AgentNetworkService {
    repo: Arc<dyn NetworkRepository>,
    agents: Arc<dyn AgentRepository>,
    chatbots: Arc<dyn ChatbotRepository>,
    runtimes: RuntimeRegistry,
    paging: Paging,
}

impl AgentNetworkService {
    pub fn new(
        repo: Arc<dyn NetworkRepository>,
        agents: Arc<dyn AgentRepository>,
        chatbots: Arc<dyn ChatbotRepository>,
        runtimes: RuntimeRegistry,
        paging: Paging,
    ) -> Self {
        Self {
            repo,
            agents,
            chatbots,
            runtimes,
            paging,
        }
    }

    /// Network types with a registered runtime.
    pub fn supported_types(&self) -> Vec<String> {
        self.runtimes.list().into_iter().map(|(key, _)| key.kind).collect()
    }

    pub async fn create(&self, principal: &Principal, request: CreateNetworkRequest) -> Result<AgentNetwork, NetworkError> {
        check_header(&request.name, &request.slug, &request.version)?;
        let spec = NetworkSpec::from_value(&request.spec)?;
        if let Some(declared) = request.network_type {
            if declared != spec.network_type {
                return Err(NetworkError::Invalid("type must match spec.type".to_string()));
            }
        }
        self.validate_spec(principal, &spec).await?;

        let now = Utc::now();
        let network = AgentNetwork {
            id: NetworkId::new(),
            tenant_id: principal.tenant_id.clone(),
            owner_id: principal.user_id.clone(),
            name: request.name.trim().to_string(),
            slug: request.slug.trim().to_string(),
            network_type: spec.network_type,
            description: request.description,
            tags: request.tags,
            version: request.version.trim().to_string(),
            status: request.status.unwrap_or_default(),
            spec,
            is_enabled: request.is_enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
            created_by: principal.user_id.clone(),
            updated_by: principal.user_id.clone(),
            deleted_at: None,
        };
        let graph = NetworkGraph::denormalize(&network);
        self.repo.insert(&network, &graph).await?;
        info!(
            network_id = %network.id,
            slug = %network.slug,
            version = %network.version,
            network_type = %network.network_type,
            nodes = graph.nodes.len(),
            "Agent network created"
        );
        Ok(network)
    }

    pub async fn get(&self, principal: &Principal, id: NetworkId) -> Result<AgentNetwork, NetworkError> {
        self.repo
            .find(&principal.tenant_id, id)
            .await?
            .ok_or(NetworkError::NotFound)
    }

    /// Denormalized node, edge and interface rows of a network.
    pub async fn graph(&self, principal: &Principal, id: NetworkId) -> Result<NetworkGraph, NetworkError> {
        self.repo
            .graph(&principal.tenant_id, id)
            .await?
            .ok_or(NetworkError::NotFound)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &NetworkFilter,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Listing<AgentNetwork>, NetworkError> {
        let page = self.paging.page(limit, offset);
        let (items, total) = self.repo.list(&principal.tenant_id, filter, page).await?;
        Ok(Listing::new(items, total, page))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: NetworkId,
        request: UpdateNetworkRequest,
    ) -> Result<AgentNetwork, NetworkError> {
        let mut network = self.get(principal, id).await?;
        let name = request.name.unwrap_or_else(|| network.name.clone());
        let slug = request.slug.unwrap_or_else(|| network.slug.clone());
        let version = request.version.unwrap_or_else(|| network.version.clone());
        check_header(&name, &slug, &version)?;
        network.name = name.trim().to_string();
        network.slug = slug.trim().to_string();
        network.version = version.trim().to_string();

        if let Some(description) = request.description {
            network.description = Some(description);
        }
        if let Some(tags) = request.tags {
            network.tags = Some(tags);
        }
        if let Some(status) = request.status {
            network.status = status;
        }
        if let Some(enabled) = request.is_enabled {
            network.is_enabled = enabled;
        }

        let graph = match &request.spec {
            Some(raw) => {
                let spec = NetworkSpec::from_value(raw)?;
                self.validate_spec(principal, &spec).await?;
                network.network_type = spec.network_type;
                network.spec = spec;
                Some(NetworkGraph::denormalize(&network))
            }
            None => None,
        };

        network.updated_at = Utc::now();
        network.updated_by = principal.user_id.clone();
        self.repo.update(&network, graph.as_ref()).await?;
        info!(network_id = %id, spec_replaced = graph.is_some(), "Agent network updated");
        Ok(network)
    }

    /// Soft delete; refused while a live chatbot is bound to the network.
    pub async fn delete(&self, principal: &Principal, id: NetworkId) -> Result<(), NetworkError> {
        let mut network = self.get(principal, id).await?;
        if self.chatbots.is_network_referenced(&principal.tenant_id, id).await? {
            return Err(NetworkError::Conflict(
                "Agent network is referenced by a chatbot".to_string(),
            ));
        }
        let now = Utc::now();
        network.deleted_at = Some(now);
        network.updated_at = now;
        network.updated_by = principal.user_id.clone();
        self.repo.update(&network, None).await?;
        info!(network_id = %id, "Agent network deleted");
        Ok(())
    }

    pub async fn set_enabled(&self, principal: &Principal, id: NetworkId, enabled: bool) -> Result<AgentNetwork, NetworkError> {
        self.update(
            principal,
            id,
            UpdateNetworkRequest {
                is_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Validate a stored network as it would be validated before a run.
    pub async fn validate(&self, principal: &Principal, id: NetworkId) -> Result<ValidationStatus, NetworkError> {
        let network = self.get(principal, id).await?;
        self.validate_spec(principal, &network.spec).await?;
        Ok(ValidationStatus::ok())
    }

    /// Structural checks followed by reference resolution in the caller's
    /// tenant.
    pub async fn validate_spec(&self, principal: &Principal, spec: &NetworkSpec) -> Result<ValidationStatus, NetworkError> {
        NetworkValidator::validate_structure(spec)?;
        for node in &spec.nodes {
            match node.reference() {
                NodeReference::Agent(agent_id) => {
                    if self.agents.find(&principal.tenant_id, *agent_id).await?.is_none() {
                        return Err(NetworkError::Invalid(format!("Referenced agent not found: {}", agent_id)));
                    }
                }
                NodeReference::ChildNetwork { id, version } => {
                    let child = self.repo.find(&principal.tenant_id, *id).await?;
                    let matches = child.is_some_and(|c| version.as_ref().is_none_or(|v| *v == c.version));
                    if !matches {
                        return Err(NetworkError::Invalid(format!("Referenced child network not found: {}", id)));
                    }
                }
            }
        }
        Ok(ValidationStatus::ok())
    }

    pub async fn invoke(
        &self,
        principal: &Principal,
        id: NetworkId,
        request: &NetworkInvocation,
    ) -> Result<NetworkRunResult, NetworkError> {
        let network = self.get(principal, id).await?;
        if !network.is_enabled {
            return Err(NetworkError::Invalid("Network is disabled".to_string()));
        }
        self.validate_spec(principal, &network.spec).await?;

        let network_type = network.spec.network_type;
        let runtime = self.runtimes.get(network_type.as_str(), None).ok_or_else(|| {
            NetworkError::NotImplemented(format!("Network type '{}' is not supported yet", network_type))
        })?;

        metrics::counter!("orion_network_invocations_total", "type" => network_type.as_str()).increment(1);
        info!(
            network_id = %id,
            network_type = %network_type,
            thread_id = ?request.thread_id,
            "Agent network invocation started"
        );
        let outcome = runtime.invoke(principal, &network, request).await;
        match &outcome {
            Ok(result) => info!(
                network_id = %id,
                run_id = %result.run_id,
                steps = result.steps,
                handoffs = result.handoffs,
                finish_reason = result.finish_reason.as_str(),
                "Agent network invocation finished"
            ),
            Err(e) => error!(network_id = %id, error = %e, "Agent network invocation failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{fixture, simple_agent, standalone_request};
    use crate::domain::agent::RunFinish;
    use crate::domain::error::{Classified, ErrorKind};
    use crate::infrastructure::connectors::ScriptedReply;
    use serde_json::json;

    #[tokio::test]
    async fn test_standalone_invoke_delegates_to_agent() {
        let f = fixture();
        let agent = simple_agent(&f, "Solo").await;
        let network = f
            .platform
            .networks
            .create(&f.principal, standalone_request("solo", "1.0.0", agent))
            .await
            .unwrap();
        assert_eq!(network.status, NetworkStatus::Draft);
        assert_eq!(f.platform.networks.graph(&f.principal, network.id).await.unwrap().nodes.len(), 1);

        f.chat.push(ScriptedReply::text("done"));
        let result = f
            .platform
            .networks
            .invoke(
                &f.principal,
                network.id,
                &NetworkInvocation {
                    input: "go".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.output, "done");
        assert_eq!(result.network_type, NetworkType::Standalone);
        assert_eq!(result.finish_reason, RunFinish::Stop);
        assert_eq!(result.active_agent.as_deref(), Some("solo"));
    }

    #[tokio::test]
    async fn test_slug_version_uniqueness() {
        let f = fixture();
        let agent = simple_agent(&f, "Solo").await;
        let networks = &f.platform.networks;
        networks
            .create(&f.principal, standalone_request("solo", "1.0.0", agent))
            .await
            .unwrap();
        networks
            .create(&f.principal, standalone_request("solo", "2.0.0", agent))
            .await
            .unwrap();
        let err = networks
            .create(&f.principal, standalone_request("solo", "1.0.0", agent))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let other = Principal::new("u2", "t2");
        let err = networks
            .create(&other, standalone_request("solo", "1.0.0", agent))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("Referenced agent not found: {}", agent));
    }

    #[tokio::test]
    async fn test_unsupported_type_is_not_degraded() {
        let f = fixture();
        let agent = simple_agent(&f, "Worker").await;
        let network = f
            .platform
            .networks
            .create(
                &f.principal,
                CreateNetworkRequest {
                    spec: json!({"type": "supervised", "nodes": [{"node_key": "w", "agent_id": agent}]}),
                    ..standalone_request("sup", "1", agent)
                },
            )
            .await
            .unwrap();
        let err = f
            .platform
            .networks
            .invoke(&f.principal, network.id, &NetworkInvocation::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert_eq!(err.to_string(), "Network type 'supervised' is not supported yet");
    }

    #[tokio::test]
    async fn test_disabled_network_and_deleted_agent() {
        let f = fixture();
        let agent = simple_agent(&f, "Solo").await;
        let network = f
            .platform
            .networks
            .create(&f.principal, standalone_request("solo", "1", agent))
            .await
            .unwrap();

        f.platform.networks.set_enabled(&f.principal, network.id, false).await.unwrap();
        let err = f
            .platform
            .networks
            .invoke(&f.principal, network.id, &NetworkInvocation::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Network is disabled");
        assert_eq!(err.code(), "AGENT_NETWORK_INVALID");

        let err = f.platform.agents.delete(&f.principal, agent).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        f.platform.networks.delete(&f.principal, network.id).await.unwrap();
        f.platform.agents.delete(&f.principal, agent).await.unwrap();
        let err = f
            .platform
            .networks
            .create(&f.principal, standalone_request("solo", "2", agent))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationInvalid);
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_child_network_version_is_pinned() {
        let f = fixture();
        let agent = simple_agent(&f, "Solo").await;
        let child = f
            .platform
            .networks
            .create(&f.principal, standalone_request("child", "1.0", agent))
            .await
            .unwrap();
        let parent_spec = |version: &str| {
            json!({
                "type": "custom",
                "nodes": [{"node_key": "c", "child_network_id": child.id, "child_network_version": version}]
            })
        };
        let ok = f
            .platform
            .networks
            .create(
                &f.principal,
                CreateNetworkRequest {
                    spec: parent_spec("1.0"),
                    ..standalone_request("parent", "1", agent)
                },
            )
            .await;
        assert!(ok.is_ok());

        let err = f
            .platform
            .networks
            .create(
                &f.principal,
                CreateNetworkRequest {
                    spec: parent_spec("9.9"),
                    ..standalone_request("parent", "2", agent)
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("Referenced child network not found: {}", child.id));
    }

    #[tokio::test]
    async fn test_standalone_shape_errors() {
        let f = fixture();
        let a = simple_agent(&f, "A").await;
        let b = simple_agent(&f, "B").await;
        let network = f
            .platform
            .networks
            .create(
                &f.principal,
                CreateNetworkRequest {
                    spec: json!({"type": "standalone", "nodes": [
                        {"node_key": "a", "agent_id": a},
                        {"node_key": "b", "agent_id": b}
                    ]}),
                    ..standalone_request("pair", "1", a)
                },
            )
            .await
            .unwrap();
        let err = f
            .platform
            .networks
            .invoke(&f.principal, network.id, &NetworkInvocation::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Standalone network must have a single node");
    }
}
