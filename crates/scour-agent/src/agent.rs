//! The turn loop: one completion per iteration, then either escalate to the
//! operator (plain prose) or run the embedded tool call and feed the fenced
//! observation back into the transcript.

use scour_core::protocol::{extract_tool_call, fence_observation, parse_tool_call};
use scour_core::{ChatBackend, FragmentObserver, Result};

use crate::dispatch::{dispatch, ToolSet};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_turns: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// How a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model called `finish()`.
    Finished,
    /// The operator ended the conversation (empty reply or EOF).
    OperatorEnded,
    /// `max_turns` iterations elapsed.
    TurnBudgetExhausted,
}

/// Source of human input when the model replies in plain prose.
#[async_trait::async_trait]
pub trait Operator: Send {
    /// `None` (or an all-whitespace reply) ends the conversation.
    async fn ask(&mut self) -> Option<String>;
}

/// Reads operator replies from stdin.
pub struct StdinOperator;

#[async_trait::async_trait]
impl Operator for StdinOperator {
    async fn ask(&mut self) -> Option<String> {
        use std::io::Write;

        print!("\nYour response (or press Enter to finish): ");
        let _ = std::io::stdout().flush();
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok().map(|_| line)
        })
        .await
        .ok()
        .flatten()?;
        let line = line.trim();
        (!line.is_empty()).then(|| line.to_string())
    }
}

pub struct AgentLoop<B: ChatBackend> {
    backend: B,
    tools: ToolSet,
    config: LoopConfig,
}

impl<B: ChatBackend> AgentLoop<B> {
    pub fn new(backend: B, tools: ToolSet, config: LoopConfig) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    /// Drives the conversation to one of the terminal outcomes. The only
    /// error that escapes is a completion-service failure; every tool-side
    /// problem is folded back into the transcript as an observation.
    pub async fn run(
        &self,
        session: &mut Session,
        operator: &mut dyn Operator,
        on_fragment: FragmentObserver<'_>,
    ) -> Result<LoopOutcome> {
        while session.turns() < self.config.max_turns {
            let turn_text = self
                .backend
                .complete(session.transcript(), on_fragment)
                .await?;
            // One bump per iteration, whatever branch this turn takes.
            session.bump_turn();
            tracing::debug!(turn = session.turns(), chars = turn_text.len(), "model turn");

            let Some(payload) = extract_tool_call(&turn_text).map(str::to_string) else {
                session.push_assistant(&turn_text);
                match operator.ask().await {
                    Some(reply) if !reply.trim().is_empty() => {
                        session.push_user(reply.trim());
                        continue;
                    }
                    _ => {
                        tracing::info!("operator ended the conversation");
                        return Ok(LoopOutcome::OperatorEnded);
                    }
                }
            };

            session.push_assistant(&turn_text);
            let call = match parse_tool_call(&payload) {
                Ok(call) => call,
                Err(e) => {
                    // The raw attempt is already in the transcript; skip the
                    // tool this turn and let the model try again.
                    tracing::warn!(error = %e, "unparseable tool call");
                    continue;
                }
            };

            if call.name == "finish" {
                tracing::info!("model called finish()");
                return Ok(LoopOutcome::Finished);
            }

            let observation = match dispatch(&call, session, &self.tools).await {
                Ok(obs) => obs,
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                    format!("Error executing {}: {e}", call.name)
                }
            };
            session.push_user(fence_observation(&observation));
        }

        tracing::info!(max_turns = self.config.max_turns, "turn budget exhausted");
        Ok(LoopOutcome::TurnBudgetExhausted)
    }
}
