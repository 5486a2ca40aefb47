use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::A2UI_MIME_TYPE;

/// Whether a session gets UI payloads or plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Ui,
    TextOnly,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::TextOnly => "text_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ui" | "a2ui" => Some(Self::Ui),
            "text" | "text_only" | "text-only" => Some(Self::TextOnly),
            _ => None,
        }
    }
}

/// Terminal task state reported for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnState {
    /// The completion action was submitted; the task is done.
    Completed,
    /// A surface was shown (or text answered); the client may act on it.
    AwaitingInput,
    /// Generation failed; narrative only.
    Failed,
    /// The turn was abandoned before it finished.
    Cancelled,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AwaitingInput => "awaiting-input",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True if no further input is expected for this task.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One outbound part of a terminal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePart {
    Text { text: String },
    Data {
        data: Value,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ResponsePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Data part carrying a single A2UI message.
    pub fn a2ui(message: Value) -> Self {
        Self::Data { data: message, mime_type: A2UI_MIME_TYPE.to_string() }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data { data, .. } => Some(data),
            Self::Text { .. } => None,
        }
    }
}

/// Final result of a turn, as handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub state: TurnState,
    pub narrative: String,
    pub parts: Vec<ResponsePart>,
    /// Model calls made during the turn.
    pub attempts: u32,
}

impl TurnOutcome {
    /// The UI messages carried by this outcome, in order.
    pub fn ui_messages(&self) -> Vec<&Value> {
        self.parts.iter().filter_map(ResponsePart::as_data).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_mode_parse() {
        assert_eq!(SessionMode::parse("UI"), Some(SessionMode::Ui));
        assert_eq!(SessionMode::parse("text"), Some(SessionMode::TextOnly));
        assert_eq!(SessionMode::parse("voice"), None);
    }

    #[test]
    fn turn_state_finality() {
        assert!(TurnState::Completed.is_final());
        assert!(!TurnState::AwaitingInput.is_final());
        assert_eq!(TurnState::AwaitingInput.as_str(), "awaiting-input");
    }

    #[test]
    fn parts_serialize_with_kind_tag() {
        let text = serde_json::to_value(ResponsePart::text("hi")).unwrap();
        assert_eq!(text, json!({ "kind": "text", "text": "hi" }));

        let data = serde_json::to_value(ResponsePart::a2ui(json!({ "deleteSurface": { "surfaceId": "s" } }))).unwrap();
        assert_eq!(data["kind"], "data");
        assert_eq!(data["mimeType"], A2UI_MIME_TYPE);
        assert_eq!(data["data"]["deleteSurface"]["surfaceId"], "s");
    }

    #[test]
    fn ui_messages_skips_text_parts() {
        let outcome = TurnOutcome {
            session_id: "s".into(),
            state: TurnState::AwaitingInput,
            narrative: "n".into(),
            parts: vec![ResponsePart::text("n"), ResponsePart::a2ui(json!({ "a": 1 }))],
            attempts: 1,
        };
        assert_eq!(outcome.ui_messages(), vec![&json!({ "a": 1 })]);
    }
}
