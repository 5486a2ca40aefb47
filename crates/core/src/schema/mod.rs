//! Canonical A2UI message schema and the validator the generation loop
//! checks model output against.

mod node;

use serde_json::Value;
use std::sync::{Arc, OnceLock};

use node::Node;

/// Single-message schema text, embedded at build time.
const MESSAGE_SCHEMA: &str = include_str!("a2ui_message.json");

/// The four mutually exclusive message kinds.
pub const MESSAGE_KINDS: [&str; 4] = ["beginRendering", "surfaceUpdate", "dataModelUpdate", "deleteSurface"];

/// The schema could not be loaded. Fatal to UI mode, not to text mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unsupported schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },
}

/// First schema violation found in a candidate payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("at {path}: {message}")]
pub struct ValidationError {
    /// Location of the offending value, e.g. `$[1].surfaceUpdate.components`.
    pub path: String,
    pub message: String,
}

/// Compiled UI-message schema. Validates an ordered list of messages.
#[derive(Debug, Clone)]
pub struct UiSchema {
    root: Node,
    message_text: String,
}

impl UiSchema {
    /// Compile the embedded canonical schema.
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::from_json(MESSAGE_SCHEMA)
    }

    /// Compile a single-message schema document. The result validates a
    /// non-empty array of such messages.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let doc: Value = serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidJson(e.to_string()))?;
        let message = Node::compile(&doc, "")?;
        Ok(Self {
            root: Node::array_of(message, 1),
            message_text: text.trim().to_string(),
        })
    }

    /// Validate a parsed candidate payload. Side-effect free.
    pub fn validate(&self, candidate: &Value) -> Result<(), ValidationError> {
        self.root.check(candidate, "$")
    }

    /// Schema text as given to the model.
    pub fn message_schema_text(&self) -> &str {
        &self.message_text
    }
}

static GLOBAL: OnceLock<Result<Arc<UiSchema>, ConfigurationError>> = OnceLock::new();

/// Process-wide schema. Compiled on first call and never re-initialized;
/// a load failure is remembered and returned on every later call.
pub fn global() -> Result<Arc<UiSchema>, ConfigurationError> {
    GLOBAL
        .get_or_init(|| {
            let loaded = UiSchema::load().map(Arc::new);
            match &loaded {
                Ok(_) => tracing::info!("A2UI schema loaded for validation"),
                Err(e) => tracing::error!(error = %e, "failed to load A2UI schema; UI mode disabled"),
            }
            loaded
        })
        .clone()
}

/// Kind of a message, if exactly one kind field is present.
pub fn message_kind(message: &Value) -> Option<&'static str> {
    let obj = message.as_object()?;
    let mut present = MESSAGE_KINDS.iter().filter(|k| obj.contains_key(**k));
    let kind = present.next()?;
    if present.next().is_some() { None } else { Some(*kind) }
}
