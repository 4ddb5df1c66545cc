// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Standalone runtime: a one-node network delegating to its agent.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::agent_service::AgentService;
use crate::domain::agent::AgentInvocation;
use crate::domain::network::{
    AgentNetwork, NetworkError, NetworkInvocation, NetworkRunResult, NetworkRuntime, NetworkType,
};
use crate::domain::tenant::Principal;

pub struct StandaloneRuntime {
    agents: Arc<AgentService>,
}

impl StandaloneRuntime {
    pub fn new(agents: Arc<AgentService>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl NetworkRuntime for StandaloneRuntime {
    fn network_type(&self) -> NetworkType {
        NetworkType::Standalone
    }

    async fn invoke(
        &self,
        principal: &Principal,
        network: &AgentNetwork,
        request: &NetworkInvocation,
    ) -> Result<NetworkRunResult, NetworkError> {
        let [node] = network.spec.nodes.as_slice() else {
            return Err(NetworkError::Invalid(
                "Standalone network must have a single node".to_string(),
            ));
        };
        let agent_id = node.agent_id().ok_or_else(|| {
            NetworkError::Invalid("Standalone network must reference an agent node".to_string())
        })?;

        let invocation = AgentInvocation {
            input: request.input.clone(),
            variables: request.variables.clone(),
            tool_overrides: request.runtime_overrides.tool_overrides.clone(),
            llm_overrides: request.runtime_overrides.llm_overrides.clone(),
            history: request.history.clone(),
        };
        let result = self.agents.invoke(principal, agent_id, invocation).await?;

        Ok(NetworkRunResult {
            output: result.output,
            run_id: Uuid::new_v4(),
            network_type: NetworkType::Standalone,
            steps: result.steps,
            tool_calls: result.tool_calls,
            tokens: result.tokens,
            latency_ms: result.latency_ms,
            finish_reason: result.finish_reason,
            active_agent: Some(node.node_key().to_string()),
            handoffs: 0,
            citations: Vec::new(),
            transcript: Vec::new(),
        })
    }
}
