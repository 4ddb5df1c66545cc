// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Runtime
//!
//! [`NetworkRuntime`] for `swarm` networks.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Build one agent per node with its handoff tools, then pass
//!   control between them until a turn ends without a handoff
//! - **Related:** `orion_core::application::agent_service`, `crate::domain::swarm`
//!
//! Agents are built through [`AgentService::build_agent`], the same path a
//! direct agent invocation uses, named by node key. The transcript is shared
//! by every agent of the run.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use orion_core::application::agent_executor::{PreparedAgent, RunStats, TurnEnd};
use orion_core::application::agent_service::{AgentService, BuildOverrides};
use orion_core::application::platform::RuntimeFactory;
use orion_core::domain::agent::RunFinish;
use orion_core::domain::llm::ChatMessage;
use orion_core::domain::network::{
    AgentNetwork, NetworkError, NetworkInvocation, NetworkRunResult, NetworkRuntime, NetworkType,
};
use orion_core::domain::tenant::Principal;
use orion_core::domain::tool::{CallableTool, Handoff, ToolCallFrame, ToolError, ToolOutcome};

use crate::domain::swarm::{
    extract_output, handoff_description, handoff_messages, handoff_tool_name, SwarmTopology, RECURSION_LIMIT,
};

/// `transfer_to_<destination>`: moves control to another node.
pub struct HandoffTool {
    name: String,
    description: String,
    source: String,
    destination: String,
}

impl HandoffTool {
    pub fn new(source: &str, destination: &str, summary: Option<&str>) -> Self {
        Self {
            name: handoff_tool_name(destination),
            description: handoff_description(destination, summary),
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[async_trait]
impl CallableTool for HandoffTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _args: Value, frame: &ToolCallFrame<'_>) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Handoff(Handoff {
            destination: self.destination.clone(),
            messages: handoff_messages(&self.source, &self.destination, frame.call_id, frame.transcript),
        }))
    }
}

pub struct SwarmRuntime {
    agents: Arc<AgentService>,
}

impl SwarmRuntime {
    pub fn new(agents: Arc<AgentService>) -> Self {
        Self { agents }
    }

    /// Factory for `PlatformBuilder::runtime`.
    pub fn factory() -> RuntimeFactory {
        Box::new(|agents: Arc<AgentService>| Arc::new(SwarmRuntime::new(agents)) as Arc<dyn NetworkRuntime>)
    }

    async fn prepare(
        &self,
        principal: &Principal,
        network: &AgentNetwork,
        topology: &SwarmTopology,
        overrides: &BuildOverrides<'_>,
    ) -> Result<HashMap<String, PreparedAgent>, NetworkError> {
        let mut summaries: HashMap<&str, Option<String>> = HashMap::new();
        for node in &network.spec.nodes {
            let summary = match node.agent_id() {
                Some(agent_id) => self.agents.find(principal, agent_id).await?.map(|agent| {
                    agent
                        .description
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or_else(|| {
                            if agent.name.trim().is_empty() {
                                agent_id.to_string()
                            } else {
                                agent.name
                            }
                        })
                }),
                None => None,
            };
            summaries.insert(node.node_key(), summary);
        }

        let mut prepared = HashMap::with_capacity(network.spec.nodes.len());
        for node in &network.spec.nodes {
            let agent_id = node
                .agent_id()
                .ok_or_else(|| NetworkError::Invalid("Swarm nodes must reference agents only".to_string()))?;
            let handoffs: Vec<Arc<dyn CallableTool>> = topology
                .destinations(node.node_key())
                .iter()
                .map(|dest| {
                    let summary = summaries.get(dest.as_str()).and_then(|s| s.as_deref());
                    Arc::new(HandoffTool::new(node.node_key(), dest, summary)) as Arc<dyn CallableTool>
                })
                .collect();
            debug!(node = node.node_key(), handoffs = handoffs.len(), "Building swarm agent");
            let agent = self
                .agents
                .build_agent(principal, agent_id, handoffs, Some(node.node_key()), overrides)
                .await?;
            prepared.insert(node.node_key().to_string(), agent);
        }
        Ok(prepared)
    }
}

#[async_trait]
impl NetworkRuntime for SwarmRuntime {
    fn network_type(&self) -> NetworkType {
        NetworkType::Swarm
    }

    async fn invoke(
        &self,
        principal: &Principal,
        network: &AgentNetwork,
        request: &NetworkInvocation,
    ) -> Result<NetworkRunResult, NetworkError> {
        let started = Instant::now();
        let topology = SwarmTopology::from_spec(&network.spec)?;
        let overrides = BuildOverrides::from(&request.runtime_overrides);
        let agents = self.prepare(principal, network, &topology, &overrides).await?;

        let mut transcript = match &request.messages {
            Some(messages) if !messages.is_empty() => messages.clone(),
            _ => {
                let mut messages = request.history.clone();
                messages.push(ChatMessage::human(request.input.trim()));
                messages
            }
        };

        let mut active = topology.default_active().to_string();
        let mut stats = RunStats::default();
        let mut handoffs = 0u32;
        info!(network_id = %network.id, active = %active, nodes = agents.len(), "Swarm run started");

        let finish_reason = loop {
            let agent = agents
                .get(&active)
                .ok_or_else(|| NetworkError::Invalid(format!("Unknown swarm node: {}", active)))?;
            let remaining = RECURSION_LIMIT.saturating_sub(stats.steps);
            if remaining == 0 {
                break RunFinish::MaxSteps;
            }
            match agent.run_turn(&mut transcript, &mut stats, remaining).await? {
                TurnEnd::Handoff(destination) => {
                    handoffs += 1;
                    metrics::counter!("orion_swarm_handoffs_total").increment(1);
                    info!(network_id = %network.id, from = %active, to = %destination, "Swarm handoff");
                    active = destination;
                }
                other => break other.finish_reason(),
            }
        };

        let output = extract_output(&json!({ "messages": transcript }));
        let result = NetworkRunResult {
            output,
            run_id: Uuid::new_v4(),
            network_type: NetworkType::Swarm,
            steps: stats.steps,
            tool_calls: stats.tool_calls,
            tokens: stats.tokens,
            latency_ms: started.elapsed().as_millis() as u64,
            finish_reason,
            active_agent: Some(active),
            handoffs,
            citations: Vec::new(),
            transcript,
        };
        info!(
            network_id = %network.id,
            run_id = %result.run_id,
            handoffs,
            steps = result.steps,
            "Swarm run finished"
        );
        Ok(result)
    }
}
