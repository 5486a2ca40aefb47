use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uigen_llm::provider::{ChatMessage, LlmProvider};

use crate::config::AgentCfg;
use crate::generation::{Generator, LoopOutcome, TurnRequest};
use crate::io::events::{AgentEvent, EventSender, emit};
use crate::routing::{InboundPart, build_instruction};
use crate::schema::{self, ConfigurationError, UiSchema};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::types::{ResponsePart, SessionMode, TurnOutcome, TurnState};

pub const EMPTY_INSTRUCTION_PROMPT: &str = "Please describe the UI you would like me to build.";
pub const CANCELLED_NARRATIVE: &str = "The request was cancelled.";

/// Runs whole turns: routing, history, generation and the terminal event.
pub struct UiAgent {
    generator: Generator,
    sessions: Arc<dyn SessionStore>,
    cfg: Arc<AgentCfg>,
}

impl UiAgent {
    /// Agent over the process-wide schema with an in-memory session store.
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: AgentCfg) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new(cfg.history_limit));
        Self::with_parts(provider, Arc::new(cfg), schema::global(), sessions)
    }

    pub fn with_parts(
        provider: Arc<dyn LlmProvider>,
        cfg: Arc<AgentCfg>,
        schema: Result<Arc<UiSchema>, ConfigurationError>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            generator: Generator::new(provider, cfg.clone(), schema),
            sessions,
            cfg,
        }
    }

    pub fn config(&self) -> &AgentCfg {
        &self.cfg
    }

    pub fn ui_available(&self) -> bool {
        self.generator.ui_available()
    }

    /// Classify raw transport parts, then run the turn.
    pub async fn handle_json(
        &self,
        session_id: &str,
        parts: &[Value],
        mode: SessionMode,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let parts: Vec<InboundPart> = parts.iter().map(InboundPart::classify).collect();
        self.handle_turn(session_id, &parts, mode, events, cancel).await
    }

    /// Run one turn to completion. Emits progress events while generating
    /// and exactly one terminal event at the end.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        parts: &[InboundPart],
        mode: SessionMode,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let routed = build_instruction(parts, &self.cfg.completion_action);

        if routed.instruction.trim().is_empty() {
            tracing::info!(session_id, "empty instruction; asking for a description");
            let outcome = TurnOutcome {
                session_id: session_id.to_string(),
                state: TurnState::AwaitingInput,
                narrative: EMPTY_INSTRUCTION_PROMPT.to_string(),
                parts: vec![ResponsePart::text(EMPTY_INSTRUCTION_PROMPT)],
                attempts: 0,
            };
            return self.finish(outcome, events).await;
        }

        tracing::info!(session_id, mode = mode.as_str(), instruction = %routed.instruction, "turn started");
        let history = self.sessions.load(session_id).await;
        let request = TurnRequest::new(session_id, routed.instruction.clone(), mode).with_history(history);
        let result = self.generator.run(&request, events, cancel).await;
        let attempts = result.model_calls();
        for attempt in &result.attempts {
            tracing::debug!(
                session_id,
                attempt = attempt.number,
                outcome = attempt.outcome.label(),
                duration_ms = attempt.duration_ms(),
                "attempt record"
            );
        }

        let (state, narrative, out_parts) = match result.outcome {
            LoopOutcome::Accepted { narrative, payload, response_text } => {
                self.sessions
                    .append(
                        session_id,
                        vec![ChatMessage::user(routed.instruction.clone()), ChatMessage::assistant(response_text)],
                    )
                    .await;
                let mut out = Vec::new();
                if !narrative.trim().is_empty() {
                    out.push(ResponsePart::text(narrative.trim()));
                }
                if let Some(Value::Array(messages)) = payload {
                    out.extend(messages.into_iter().map(ResponsePart::a2ui));
                }
                (routed.terminal_state(), narrative, out)
            }
            LoopOutcome::Failed { reason, narrative } => {
                tracing::warn!(session_id, reason = reason.as_str(), attempts, "turn failed");
                (TurnState::Failed, narrative.clone(), vec![ResponsePart::text(narrative)])
            }
            LoopOutcome::Cancelled => (TurnState::Cancelled, CANCELLED_NARRATIVE.to_string(), Vec::new()),
        };

        let outcome = TurnOutcome {
            session_id: session_id.to_string(),
            state,
            narrative,
            parts: out_parts,
            attempts,
        };
        self.finish(outcome, events).await
    }

    async fn finish(&self, outcome: TurnOutcome, events: &EventSender) -> TurnOutcome {
        tracing::info!(
            session_id = %outcome.session_id,
            state = outcome.state.as_str(),
            attempts = outcome.attempts,
            parts = outcome.parts.len(),
            "turn finished"
        );
        emit(
            events,
            AgentEvent::Terminal {
                state: outcome.state,
                narrative: outcome.narrative.clone(),
                parts: outcome.parts.clone(),
            },
        )
        .await;
        outcome
    }
}
