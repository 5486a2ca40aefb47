use chrono::{DateTime, Utc};
use serde_json::Value;
use uigen_llm::provider::StopReason;

use crate::protocol::ExtractionError;
use crate::schema::ValidationError;

/// What happened to one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted,
    ProviderFailed(String),
    NoResponse,
    ExtractionFailed(ExtractionError),
    ValidationFailed(ValidationError),
    /// The turn was cancelled while the call was in flight.
    Cancelled,
}

impl AttemptOutcome {
    /// Repair feedback for this outcome, if it is a format failure.
    pub fn repair_detail(&self) -> Option<String> {
        match self {
            Self::ExtractionFailed(e) => Some(format!("Validation failed: {e}.")),
            Self::ValidationFailed(e) => Some(format!("Validation failed: {e}.")),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::ProviderFailed(_) => "provider_failed",
            Self::NoResponse => "no_response",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Immutable record of a single model call within a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationAttempt {
    /// 1-based.
    pub number: u32,
    /// Final user message sent on this call.
    pub instruction: String,
    pub raw_response: Option<String>,
    /// `None` when no response came back.
    pub stop_reason: Option<StopReason>,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationAttempt {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// The model stopped at the output token limit.
    pub fn truncated(&self) -> bool {
        self.stop_reason == Some(StopReason::MaxTokens)
    }
}

/// Why a turn ended without an accepted response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Configuration,
    Provider,
    NoResponse,
    RetriesExhausted,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Provider => "provider",
            Self::NoResponse => "no_response",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// Terminal result of the generation loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    Accepted {
        narrative: String,
        /// `None` in text-only mode.
        payload: Option<Value>,
        /// Canonical two-part text in UI mode, the raw text otherwise.
        response_text: String,
    },
    Failed { reason: FailureReason, narrative: String },
    Cancelled,
}

/// Loop outcome plus the full attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopResult {
    pub outcome: LoopOutcome,
    pub attempts: Vec<GenerationAttempt>,
}

impl LoopResult {
    pub fn model_calls(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            LoopOutcome::Accepted { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    pub fn narrative(&self) -> Option<&str> {
        match &self.outcome {
            LoopOutcome::Accepted { narrative, .. } | LoopOutcome::Failed { narrative, .. } => Some(narrative.as_str()),
            LoopOutcome::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn repair_detail_only_for_format_failures() {
        let v = AttemptOutcome::ValidationFailed(ValidationError {
            path: "$[0]".into(),
            message: "missing required field 'root'".into(),
        });
        assert_eq!(
            v.repair_detail().as_deref(),
            Some("Validation failed: at $[0]: missing required field 'root'.")
        );
        let e = AttemptOutcome::ExtractionFailed(ExtractionError::DelimiterMissing);
        assert_eq!(e.repair_detail().as_deref(), Some("Validation failed: delimiter missing."));
        assert_eq!(AttemptOutcome::NoResponse.repair_detail(), None);
        assert_eq!(AttemptOutcome::ProviderFailed("x".into()).repair_detail(), None);
    }

    #[test]
    fn duration_is_measured_between_timestamps() {
        let started_at = Utc::now();
        let attempt = GenerationAttempt {
            number: 1,
            instruction: "hi".into(),
            raw_response: None,
            stop_reason: None,
            outcome: AttemptOutcome::NoResponse,
            started_at,
            finished_at: started_at + Duration::milliseconds(250),
        };
        assert_eq!(attempt.duration_ms(), 250);
        assert!(!attempt.truncated());
        assert!(GenerationAttempt { stop_reason: Some(StopReason::MaxTokens), ..attempt }.truncated());
    }

    #[test]
    fn loop_result_accessors() {
        let result = LoopResult {
            outcome: LoopOutcome::Failed { reason: FailureReason::Provider, narrative: "sorry".into() },
            attempts: vec![],
        };
        assert_eq!(result.payload(), None);
        assert_eq!(result.narrative(), Some("sorry"));
        assert_eq!(result.model_calls(), 0);
    }
}
