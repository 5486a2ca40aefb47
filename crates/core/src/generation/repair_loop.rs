use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uigen_llm::provider::{ChatMessage, CompletionRequest, LlmProvider, StopReason};

use super::attempt::{AttemptOutcome, FailureReason, GenerationAttempt, LoopOutcome, LoopResult};
use crate::config::{AgentCfg, MAX_ATTEMPTS_CEILING};
use crate::io::events::{AgentEvent, EventSender, emit};
use crate::prompt;
use crate::protocol::codec;
use crate::schema::{ConfigurationError, UiSchema, ValidationError};
use crate::types::SessionMode;

pub const CONFIG_ERROR_NARRATIVE: &str =
    "I'm sorry, I'm facing an internal configuration error. Please contact support.";
pub const PROVIDER_ERROR_NARRATIVE: &str =
    "I'm sorry, I couldn't reach the language model. Please try again in a moment.";
pub const NO_RESPONSE_NARRATIVE: &str = "I'm sorry, I encountered an error processing your request.";
pub const EXHAUSTED_NARRATIVE: &str =
    "I'm sorry, I'm having trouble generating the interface. Please try again in a moment.";

/// Appended to repair feedback when the rejected response hit the token limit.
pub const TRUNCATION_NOTE: &str =
    " The response was cut off at the output token limit, so keep the narrative brief and the payload compact.";

/// One turn's input to the loop.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub instruction: String,
    pub mode: SessionMode,
    /// Prior exchanges, oldest first.
    pub history: Vec<ChatMessage>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, instruction: impl Into<String>, mode: SessionMode) -> Self {
        Self {
            session_id: session_id.into(),
            instruction: instruction.into(),
            mode,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// What the next model call sends after the history.
#[derive(Debug, Clone)]
struct Draft {
    instruction: String,
    /// Previous rejected response, replayed as an assistant turn.
    replay: Option<String>,
}

impl Draft {
    fn initial(instruction: &str) -> Self {
        Self { instruction: instruction.to_string(), replay: None }
    }
}

enum LoopState {
    Drafting { attempt: u32, draft: Draft },
    Validating { attempt: u32, draft: Draft, raw: String, stop_reason: StopReason, started_at: DateTime<Utc> },
    Repairing { attempt: u32, raw: String },
    Terminal(LoopOutcome),
}

/// Runs the bounded draft, validate and repair cycle against one provider.
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    cfg: Arc<AgentCfg>,
    schema: Result<Arc<UiSchema>, ConfigurationError>,
    ui_prompt: Option<String>,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        cfg: Arc<AgentCfg>,
        schema: Result<Arc<UiSchema>, ConfigurationError>,
    ) -> Self {
        let ui_prompt = schema.as_ref().ok().map(|s| prompt::ui_system_prompt(s));
        Self { provider, cfg, schema, ui_prompt }
    }

    /// True if UI mode can run.
    pub fn ui_available(&self) -> bool {
        self.schema.is_ok()
    }

    /// Run one turn to a terminal outcome. Never fails; every error ends up
    /// as an attempt outcome and a narrative.
    pub async fn run(&self, request: &TurnRequest, events: &EventSender, cancel: &CancellationToken) -> LoopResult {
        let max_attempts = self.cfg.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING);
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let system = match (request.mode, &self.ui_prompt) {
            (SessionMode::TextOnly, _) => prompt::text_system_prompt(),
            (SessionMode::Ui, Some(ui_prompt)) => ui_prompt.as_str(),
            (SessionMode::Ui, None) => {
                if let Err(e) = &self.schema {
                    tracing::error!(session_id = %request.session_id, error = %e, "schema not loaded; cannot validate UI responses");
                }
                return LoopResult {
                    outcome: LoopOutcome::Failed {
                        reason: FailureReason::Configuration,
                        narrative: CONFIG_ERROR_NARRATIVE.to_string(),
                    },
                    attempts,
                };
            }
        };

        let mut state = LoopState::Drafting { attempt: 1, draft: Draft::initial(&request.instruction) };

        loop {
            state = match state {
                LoopState::Drafting { attempt, draft } => {
                    if cancel.is_cancelled() {
                        tracing::info!(session_id = %request.session_id, attempt, "turn cancelled before model call");
                        LoopState::Terminal(LoopOutcome::Cancelled)
                    } else {
                        emit(events, AgentEvent::working(self.cfg.progress_message.clone())).await;
                        tracing::info!(
                            session_id = %request.session_id,
                            attempt,
                            max_attempts,
                            mode = request.mode.as_str(),
                            "generation attempt"
                        );
                        self.draft(request, system, attempt, max_attempts, draft, cancel, &mut attempts).await
                    }
                }

                LoopState::Validating { attempt, draft, raw, stop_reason, started_at } => {
                    let (outcome, next) = match codec::extract(&raw) {
                        Err(e) => (AttemptOutcome::ExtractionFailed(e), None),
                        Ok(candidate) => match self.validate(&candidate.payload) {
                            Err(e) => (AttemptOutcome::ValidationFailed(e), None),
                            Ok(()) => {
                                let response_text = codec::render(&candidate.narrative, &candidate.payload);
                                let accepted = LoopOutcome::Accepted {
                                    narrative: candidate.narrative,
                                    payload: Some(candidate.payload),
                                    response_text,
                                };
                                (AttemptOutcome::Accepted, Some(accepted))
                            }
                        },
                    };

                    let truncated = stop_reason == StopReason::MaxTokens;
                    match &outcome {
                        AttemptOutcome::Accepted => {
                            tracing::info!(session_id = %request.session_id, attempt, "UI response validated")
                        }
                        failed => tracing::warn!(
                            session_id = %request.session_id,
                            attempt,
                            outcome = failed.label(),
                            truncated,
                            error = %failed.repair_detail().unwrap_or_default(),
                            "UI response rejected"
                        ),
                    }
                    if let Some(mut detail) = outcome.repair_detail() {
                        if truncated {
                            detail.push_str(TRUNCATION_NOTE);
                        }
                        errors.push(detail);
                    }
                    attempts.push(GenerationAttempt {
                        number: attempt,
                        instruction: draft.instruction,
                        raw_response: Some(raw.clone()),
                        stop_reason: Some(stop_reason),
                        outcome,
                        started_at,
                        finished_at: Utc::now(),
                    });

                    match next {
                        Some(accepted) => LoopState::Terminal(accepted),
                        None => LoopState::Repairing { attempt, raw },
                    }
                }

                LoopState::Repairing { attempt, raw } => {
                    if attempt < max_attempts {
                        tracing::warn!(session_id = %request.session_id, attempt, max_attempts, "retrying with repair feedback");
                        LoopState::Drafting {
                            attempt: attempt + 1,
                            draft: Draft {
                                instruction: prompt::corrective_instruction(&request.instruction, &errors),
                                replay: self.cfg.replay_failed_response.then_some(raw),
                            },
                        }
                    } else {
                        tracing::error!(session_id = %request.session_id, attempts = attempt, "max retries exhausted");
                        LoopState::Terminal(LoopOutcome::Failed {
                            reason: FailureReason::RetriesExhausted,
                            narrative: EXHAUSTED_NARRATIVE.to_string(),
                        })
                    }
                }

                LoopState::Terminal(outcome) => return LoopResult { outcome, attempts },
            };
        }
    }

    /// Make one model call and decide the next state.
    #[allow(clippy::too_many_arguments)]
    async fn draft(
        &self,
        request: &TurnRequest,
        system: &str,
        attempt: u32,
        max_attempts: u32,
        draft: Draft,
        cancel: &CancellationToken,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> LoopState {
        let completion = CompletionRequest {
            messages: build_messages(system, request, &draft),
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };
        let started_at = Utc::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = self.provider.complete(completion) => Some(r),
        };

        let record = |outcome: AttemptOutcome, raw_response: Option<String>, instruction: String| GenerationAttempt {
            number: attempt,
            instruction,
            stop_reason: None,
            raw_response,
            outcome,
            started_at,
            finished_at: Utc::now(),
        };
        let has_budget = attempt < max_attempts;

        match result {
            None => {
                tracing::info!(session_id = %request.session_id, attempt, "turn cancelled during model call");
                attempts.push(record(AttemptOutcome::Cancelled, None, draft.instruction));
                LoopState::Terminal(LoopOutcome::Cancelled)
            }

            Some(Err(e)) => {
                tracing::warn!(session_id = %request.session_id, attempt, error = %e, "model call failed");
                attempts.push(record(AttemptOutcome::ProviderFailed(e.to_string()), None, draft.instruction.clone()));
                if has_budget {
                    LoopState::Drafting { attempt: attempt + 1, draft }
                } else {
                    LoopState::Terminal(LoopOutcome::Failed {
                        reason: FailureReason::Provider,
                        narrative: PROVIDER_ERROR_NARRATIVE.to_string(),
                    })
                }
            }

            Some(Ok(response)) if response.content.trim().is_empty() => {
                tracing::warn!(session_id = %request.session_id, attempt, "no response content from model");
                attempts.push(record(AttemptOutcome::NoResponse, None, draft.instruction));
                if has_budget {
                    LoopState::Drafting {
                        attempt: attempt + 1,
                        draft: Draft {
                            instruction: prompt::no_response_instruction(&request.instruction),
                            replay: None,
                        },
                    }
                } else {
                    LoopState::Terminal(LoopOutcome::Failed {
                        reason: FailureReason::NoResponse,
                        narrative: NO_RESPONSE_NARRATIVE.to_string(),
                    })
                }
            }

            Some(Ok(response)) => {
                let stop_reason = response.stop_reason;
                let raw = response.content;
                tracing::debug!(
                    session_id = %request.session_id,
                    attempt,
                    output_tokens = response.output_tokens,
                    preview = %raw.chars().take(200).collect::<String>(),
                    "model response"
                );
                match request.mode {
                    SessionMode::TextOnly => {
                        attempts.push(GenerationAttempt {
                            stop_reason: Some(stop_reason),
                            ..record(AttemptOutcome::Accepted, Some(raw.clone()), draft.instruction)
                        });
                        LoopState::Terminal(LoopOutcome::Accepted {
                            narrative: raw.clone(),
                            payload: None,
                            response_text: raw,
                        })
                    }
                    SessionMode::Ui => LoopState::Validating { attempt, draft, raw, stop_reason, started_at },
                }
            }
        }
    }

    fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        match &self.schema {
            Ok(schema) => schema.validate(payload),
            // Unreachable: UI mode fast-fails without a schema.
            Err(e) => Err(ValidationError { path: "$".into(), message: e.to_string() }),
        }
    }
}

/// System prompt, history, then the draft. With a replay the original
/// request and the rejected response precede the corrective instruction.
fn build_messages(system: &str, request: &TurnRequest, draft: &Draft) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 4);
    messages.push(ChatMessage::system(system));
    messages.extend(request.history.iter().cloned());
    if let Some(bad) = &draft.replay {
        messages.push(ChatMessage::user(request.instruction.clone()));
        messages.push(ChatMessage::assistant(bad.clone()));
    }
    messages.push(ChatMessage::user(draft.instruction.clone()));
    messages
}
