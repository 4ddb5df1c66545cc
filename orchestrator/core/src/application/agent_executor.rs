// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Executor
//!
//! The bounded tool-calling loop shared by direct agent invocation and the
//! network runtimes.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive a [`ChatModel`] through model calls and tool calls
//!   until it answers, hands off, or runs out of budget
//! - **Related:** `application::agent_service` (builds [`PreparedAgent`]),
//!   `orion-swarm` (chains turns across agents)
//!
//! A turn appends to a caller-owned transcript. When the deadline fires the
//! turn future is dropped, so everything appended up to the last completed
//! await point stays in the transcript and in the [`RunStats`].

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::agent::{AgentConfig, AgentError, RunFinish, RuntimeLimits};
use crate::domain::llm::{ChatMessage, ChatModel, ChatRequest, MessageRole, TokenUsage, ToolCall};
use crate::domain::tool::{CallableTool, ToolCallFrame, ToolOutcome};

pub const TOOL_BUDGET_MESSAGE: &str = "Tool call budget exhausted; answer with the information already gathered.";

/// Provider parameters after merging agent config and per-call overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmParams {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub extra: Map<String, Value>,
}

impl LlmParams {
    /// `config.llm_params` overlaid with `overrides`. The model falls back to
    /// `config.default_model`, then to the connector default (`None`).
    pub fn resolve(config: &AgentConfig, overrides: Option<&Map<String, Value>>) -> Self {
        let mut merged = config.llm_params.clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }

        let model = merged
            .remove("model")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|m| !m.trim().is_empty())
            .or_else(|| config.default_model.clone().filter(|m| !m.trim().is_empty()));
        let temperature = merged
            .remove("temperature")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;
        let max_tokens = merged
            .remove("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u64::from(u32::MAX)) as u32);

        Self {
            model,
            temperature,
            max_tokens,
            extra: merged,
        }
    }
}

/// Counters accumulated across the turns of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub steps: u32,
    pub tool_calls: u32,
    pub tokens: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The model answered without requesting tools.
    Finished,
    /// A handoff tool moved control to the named node.
    Handoff(String),
    StepLimit,
    DeadlineExceeded,
}

impl TurnEnd {
    pub fn finish_reason(&self) -> RunFinish {
        match self {
            TurnEnd::Finished | TurnEnd::Handoff(_) => RunFinish::Stop,
            TurnEnd::StepLimit => RunFinish::MaxSteps,
            TurnEnd::DeadlineExceeded => RunFinish::DeadlineExceeded,
        }
    }
}

/// Everything one agent needs to run, resolved at invocation start.
pub struct PreparedAgent {
    /// Stamped on the agent's AI messages; the node key inside a swarm.
    pub name: String,
    pub model: Arc<dyn ChatModel>,
    pub system_prompt: String,
    pub tools: Vec<Arc<dyn CallableTool>>,
    pub params: LlmParams,
    pub limits: RuntimeLimits,
    pub max_tool_calls: u32,
}

impl PreparedAgent {
    /// Run until the model answers, hands off or a bound is hit. `allowance`
    /// caps model calls on top of the agent's own `max_steps`.
    pub async fn run_turn(
        &self,
        transcript: &mut Vec<ChatMessage>,
        stats: &mut RunStats,
        allowance: u32,
    ) -> Result<TurnEnd, AgentError> {
        let deadline = Duration::from_secs(u64::from(self.limits.max_duration_s));
        match tokio::time::timeout(deadline, self.step_loop(transcript, stats, allowance)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(agent = %self.name, max_duration_s = self.limits.max_duration_s, "Agent deadline exceeded");
                Ok(TurnEnd::DeadlineExceeded)
            }
        }
    }

    async fn step_loop(
        &self,
        transcript: &mut Vec<ChatMessage>,
        stats: &mut RunStats,
        allowance: u32,
    ) -> Result<TurnEnd, AgentError> {
        let step_cap = self.limits.max_steps.min(allowance);
        let mut steps = 0u32;
        let mut tool_calls = 0u32;

        loop {
            if steps >= step_cap {
                debug!(agent = %self.name, steps, "Step limit reached");
                return Ok(TurnEnd::StepLimit);
            }

            let offer_tools = tool_calls < self.max_tool_calls;
            let request = self.request(transcript, offer_tools);
            let response = self
                .model
                .chat(&request)
                .await
                .map_err(|e| AgentError::Llm(e.to_string()))?;
            steps += 1;
            stats.steps += 1;
            stats.tokens += response.usage;

            let calls = response.message.tool_calls.clone();
            transcript.push(response.message.with_name(self.name.clone()));
            if calls.is_empty() {
                return Ok(TurnEnd::Finished);
            }

            let mut pending = calls.into_iter();
            while let Some(call) = pending.next() {
                if tool_calls >= self.max_tool_calls {
                    transcript.push(ChatMessage::tool(call.id, TOOL_BUDGET_MESSAGE));
                    continue;
                }
                let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
                    warn!(agent = %self.name, tool = %call.name, "Model called an unknown tool");
                    transcript.push(ChatMessage::tool(call.id, format!("Unknown tool: {}", call.name)));
                    continue;
                };

                tool_calls += 1;
                stats.tool_calls += 1;
                let outcome = {
                    let frame = ToolCallFrame {
                        call_id: &call.id,
                        agent_name: &self.name,
                        transcript: transcript.as_slice(),
                    };
                    tool.call(call.arguments.clone(), &frame).await
                };

                match outcome {
                    Ok(ToolOutcome::Output(value)) => {
                        transcript.push(ChatMessage::tool(call.id, value_text(&value)));
                    }
                    Ok(ToolOutcome::Handoff(handoff)) => {
                        let mut messages = handoff.messages.into_iter();
                        if let Some(marker) = messages.next() {
                            transcript.push(marker);
                        }
                        transcript.extend(pending.by_ref().map(skipped));
                        transcript.extend(messages);
                        return Ok(TurnEnd::Handoff(handoff.destination));
                    }
                    Err(e) => {
                        warn!(agent = %self.name, tool = %call.name, error = %e, "Tool call failed");
                        transcript.push(ChatMessage::tool(call.id, format!("Tool error: {}", e)));
                    }
                }
            }
        }
    }

    fn request(&self, transcript: &[ChatMessage], offer_tools: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(transcript.iter().cloned());
        ChatRequest {
            model: self.params.model.clone(),
            messages,
            tools: if offer_tools {
                self.tools.iter().map(|t| t.spec()).collect()
            } else {
                Vec::new()
            },
            temperature: Some(self.params.temperature),
            max_tokens: self.params.max_tokens,
            extra: self.params.extra.clone(),
        }
    }
}

fn skipped(call: ToolCall) -> ChatMessage {
    ChatMessage::tool(call.id, "Skipped: control was transferred to another agent.")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text of the last AI message that has any.
pub fn last_ai_text(transcript: &[ChatMessage]) -> String {
    transcript
        .iter()
        .rev()
        .filter(|m| m.role == MessageRole::Ai)
        .map(ChatMessage::text)
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::{Handoff, ToolError};
    use crate::infrastructure::connectors::{ScriptedConnector, ScriptedReply};
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl CallableTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, args: Value, _frame: &ToolCallFrame<'_>) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::Output(args))
        }
    }

    struct Transfer;

    #[async_trait]
    impl CallableTool for Transfer {
        fn name(&self) -> &str {
            "transfer_to_b"
        }

        fn description(&self) -> &str {
            "Transfer"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, _args: Value, frame: &ToolCallFrame<'_>) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::Handoff(Handoff {
                destination: "b".into(),
                messages: vec![
                    ChatMessage::tool(frame.call_id, "Transferred from a to b"),
                    ChatMessage::system("You are b."),
                ],
            }))
        }
    }

    fn agent(script: &ScriptedConnector, tools: Vec<Arc<dyn CallableTool>>, limits: RuntimeLimits, max_tool_calls: u32) -> PreparedAgent {
        PreparedAgent {
            name: "a".into(),
            model: Arc::new(script.clone()),
            system_prompt: "You are a.".into(),
            tools,
            params: LlmParams::default(),
            limits,
            max_tool_calls,
        }
    }

    #[tokio::test]
    async fn test_tool_loop_then_answer() {
        let script = ScriptedConnector::chat();
        script.push(ScriptedReply::tool_call("echo", json!({"q": 1})));
        script.push(ScriptedReply::text("done"));
        let agent = agent(&script, vec![Arc::new(Echo)], RuntimeLimits::default(), 8);

        let mut transcript = vec![ChatMessage::human("hi")];
        let mut stats = RunStats::default();
        let end = agent.run_turn(&mut transcript, &mut stats, u32::MAX).await.unwrap();
        assert_eq!(end, TurnEnd::Finished);
        assert_eq!(stats.steps, 2);
        assert_eq!(stats.tool_calls, 1);
        assert_eq!(last_ai_text(&transcript), "done");
        assert_eq!(transcript[2].role, MessageRole::Tool);
        assert_eq!(transcript[2].text(), r#"{"q":1}"#);

        let requests = script.requests();
        assert_eq!(requests[0].messages[0].text(), "You are a.");
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_tool_budget_answers_pending_calls_and_withdraws_tools() {
        let script = ScriptedConnector::chat();
        script.push(ScriptedReply::tool_call("echo", json!({})));
        script.push(ScriptedReply::tool_call("echo", json!({})));
        script.push(ScriptedReply::text("final"));
        let agent = agent(&script, vec![Arc::new(Echo)], RuntimeLimits::default(), 1);

        let mut transcript = vec![ChatMessage::human("hi")];
        let mut stats = RunStats::default();
        agent.run_turn(&mut transcript, &mut stats, u32::MAX).await.unwrap();
        assert_eq!(stats.tool_calls, 1);
        assert!(transcript.iter().any(|m| m.text() == TOOL_BUDGET_MESSAGE));
        let requests = script.requests();
        assert!(requests[1].tools.is_empty());
        assert!(requests[2].tools.is_empty());
    }

    #[tokio::test]
    async fn test_step_limit() {
        let script = ScriptedConnector::chat();
        for _ in 0..5 {
            script.push(ScriptedReply::tool_call("echo", json!({})));
        }
        let limits = RuntimeLimits { max_steps: 2, max_duration_s: 60 };
        let agent = agent(&script, vec![Arc::new(Echo)], limits, 8);

        let mut transcript = vec![ChatMessage::human("hi")];
        let mut stats = RunStats::default();
        let end = agent.run_turn(&mut transcript, &mut stats, u32::MAX).await.unwrap();
        assert_eq!(end, TurnEnd::StepLimit);
        assert_eq!(end.finish_reason(), RunFinish::MaxSteps);
        assert_eq!(stats.steps, 2);
    }

    #[tokio::test]
    async fn test_handoff_ends_turn_and_answers_remaining_calls() {
        let script = ScriptedConnector::chat();
        script.push(ScriptedReply::ToolCalls(vec![
            ToolCall { id: "c1".into(), name: "transfer_to_b".into(), arguments: json!({}) },
            ToolCall { id: "c2".into(), name: "echo".into(), arguments: json!({}) },
        ]));
        let agent = agent(&script, vec![Arc::new(Transfer), Arc::new(Echo)], RuntimeLimits::default(), 8);

        let mut transcript = vec![ChatMessage::human("hi")];
        let mut stats = RunStats::default();
        let end = agent.run_turn(&mut transcript, &mut stats, u32::MAX).await.unwrap();
        assert_eq!(end, TurnEnd::Handoff("b".into()));
        let tail: Vec<_> = transcript[2..].iter().map(|m| (m.role, m.tool_call_id.clone())).collect();
        assert_eq!(
            tail,
            vec![
                (MessageRole::Tool, Some("c1".to_string())),
                (MessageRole::Tool, Some("c2".to_string())),
                (MessageRole::System, None),
            ]
        );
    }

    #[test]
    fn test_llm_params_merge() {
        let config = AgentConfig {
            default_model: Some("gpt-4o".into()),
            llm_params: json!({"temperature": 0.7, "top_p": 0.9}).as_object().cloned().unwrap(),
            ..Default::default()
        };
        let params = LlmParams::resolve(&config, None);
        assert_eq!(params.model.as_deref(), Some("gpt-4o"));
        assert!((params.temperature - 0.7).abs() < 1e-6);
        assert_eq!(params.extra.get("top_p"), Some(&json!(0.9)));

        let overrides = json!({"model": "gpt-4o-mini", "max_tokens": 64}).as_object().cloned().unwrap();
        let params = LlmParams::resolve(&config, Some(&overrides));
        assert_eq!(params.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(params.max_tokens, Some(64));

        let params = LlmParams::resolve(&AgentConfig::default(), None);
        assert_eq!(params.model, None);
        assert_eq!(params.temperature, 0.0);
    }
}
