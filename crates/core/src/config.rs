use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Environment variable prefix for every agent setting.
pub const ENV_PREFIX: &str = "UIGEN_";

/// Hard ceiling on model calls per turn, whatever the configuration says.
pub const MAX_ATTEMPTS_CEILING: u32 = 5;

/// All agent parameters. Read once at startup from `UIGEN_*` variables;
/// anything unset or unparsable keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCfg {
    // generation loop
    pub max_attempts: u32,
    pub replay_failed_response: bool,

    // model call
    pub max_tokens: u32,
    pub temperature: f32,

    // routing
    pub completion_action: String,

    // progress / events
    pub progress_message: String,
    pub event_buffer: usize,

    // sessions
    pub history_limit: usize,
}

impl Default for AgentCfg {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            replay_failed_response: true,
            max_tokens: 4096,
            temperature: 0.2,
            completion_action: "submit_form".into(),
            progress_message: "Generating your UI...".into(),
            event_buffer: 32,
            history_limit: 20,
        }
    }
}

impl AgentCfg {
    /// Load config from `UIGEN_*` environment variables.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|key| (key.to_lowercase(), v)))
            .collect();
        Self::from_map(&map)
    }

    /// Build from lowercase keys (`max_attempts`, `temperature`, ...).
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            max_attempts: get_or(m, "max_attempts", d.max_attempts),
            replay_failed_response: get_or(m, "replay_failed_response", d.replay_failed_response),
            max_tokens: get_or(m, "max_tokens", d.max_tokens),
            temperature: get_or(m, "temperature", d.temperature),
            completion_action: get_or(m, "completion_action", d.completion_action),
            progress_message: get_or(m, "progress_message", d.progress_message),
            event_buffer: get_or(m, "event_buffer", d.event_buffer),
            history_limit: get_or(m, "history_limit", d.history_limit),
        }
        .normalized()
    }

    /// Clamp values into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING);
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.event_buffer = self.event_buffer.max(1);
        self
    }

    /// Key, current value and description, for display.
    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("max_attempts", self.max_attempts.to_string(), "Model calls per turn, including repairs"),
            ("replay_failed_response", self.replay_failed_response.to_string(), "Show the model its own rejected response when repairing"),
            ("max_tokens", self.max_tokens.to_string(), "Completion token limit per call"),
            ("temperature", self.temperature.to_string(), "Sampling temperature"),
            ("completion_action", self.completion_action.clone(), "Action name that completes a task"),
            ("progress_message", self.progress_message.clone(), "Progress text emitted before each model call"),
            ("event_buffer", self.event_buffer.to_string(), "Event channel capacity"),
            ("history_limit", self.history_limit.to_string(), "Messages kept per session"),
        ]
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
