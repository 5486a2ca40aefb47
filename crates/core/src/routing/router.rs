use super::inbound::{ActionEvent, InboundPart};
use crate::types::TurnState;

/// Instruction text for the generation loop plus the turn classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedInstruction {
    pub instruction: String,
    /// True when the client submitted the completion action.
    pub is_completion: bool,
    /// Action name, if the turn came from a client action.
    pub action: Option<String>,
}

impl RoutedInstruction {
    /// State the host reports once the turn succeeds.
    pub fn terminal_state(&self) -> TurnState {
        if self.is_completion { TurnState::Completed } else { TurnState::AwaitingInput }
    }
}

/// Turn inbound parts into an instruction. The last action event wins;
/// without one, text parts are joined with newlines.
pub fn build_instruction(parts: &[InboundPart], completion_action: &str) -> RoutedInstruction {
    let action = parts.iter().rev().find_map(|p| match p {
        InboundPart::Action(event) => Some(event),
        _ => None,
    });

    if let Some(event) = action {
        let is_completion = event.action_name == completion_action;
        let instruction = if is_completion { submission_text(event) } else { action_text(event) };
        tracing::info!(action = %event.action_name, is_completion, "routed client action");
        return RoutedInstruction {
            instruction,
            is_completion,
            action: Some(event.action_name.clone()),
        };
    }

    let instruction = parts
        .iter()
        .filter_map(|p| match p {
            InboundPart::Text(text) => Some(text.trim()),
            _ => None,
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let unknown = parts.iter().filter(|p| matches!(p, InboundPart::Unknown)).count();
    if unknown > 0 {
        tracing::debug!(unknown, "ignored unrecognized inbound parts");
    }

    RoutedInstruction { instruction, is_completion: false, action: None }
}

fn submission_text(event: &ActionEvent) -> String {
    let form_data = event
        .context
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("User submitted a form with the following data: {form_data}")
}

fn action_text(event: &ActionEvent) -> String {
    format!("User action: {} with data: {}", event.action_name, event.context_json())
}
