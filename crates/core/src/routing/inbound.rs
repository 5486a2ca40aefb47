use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Key under a data part that carries a client action event.
pub const USER_ACTION_KEY: &str = "userAction";

/// Scalar context value submitted with an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Scalar {
    /// Nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::String(s.clone()),
            Value::Number(n) => Self::Number(n.clone()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Null => Self::Null,
            nested => Self::String(nested.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A button click or form submission from a rendered surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub action_name: String,
    /// Keys in sorted order.
    pub context: BTreeMap<String, Scalar>,
}

impl ActionEvent {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self { action_name: action_name.into(), context: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Parse `{"actionName": .., "context": {..}}`. A missing or non-object
    /// context is empty.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let action_name = obj.get("actionName")?.as_str()?.to_string();
        let context = match obj.get("context") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(ctx)) => ctx.iter().map(|(k, v)| (k.clone(), Scalar::from_json(v))).collect(),
            Some(other) => {
                tracing::debug!(action = %action_name, context = %other, "action context is not an object; ignored");
                BTreeMap::new()
            }
        };
        Some(Self { action_name, context })
    }

    /// Context as a compact JSON object.
    pub fn context_json(&self) -> String {
        serde_json::to_string(&self.context).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One inbound message part, classified once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPart {
    Text(String),
    Action(ActionEvent),
    Unknown,
}

impl InboundPart {
    /// Classify a transport part: `{"kind":"text","text":..}` or
    /// `{"kind":"data","data":{"userAction":{..}}}`.
    pub fn classify(part: &Value) -> Self {
        let kind = part.get("kind").and_then(Value::as_str);
        match kind {
            Some("text") => match part.get("text").and_then(Value::as_str) {
                Some(text) => Self::Text(text.to_string()),
                None => Self::Unknown,
            },
            Some("data") => part
                .get("data")
                .and_then(|d| d.get(USER_ACTION_KEY))
                .and_then(ActionEvent::from_json)
                .map(Self::Action)
                .unwrap_or(Self::Unknown),
            _ => Self::Unknown,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_text_part() {
        assert_eq!(InboundPart::classify(&json!({ "kind": "text", "text": "hi" })), InboundPart::text("hi"));
        assert_eq!(InboundPart::classify(&json!({ "kind": "text" })), InboundPart::Unknown);
    }

    #[test]
    fn classifies_user_action() {
        let part = json!({ "kind": "data", "data": { "userAction": {
            "actionName": "submit_form",
            "context": { "name": "Ada", "age": 36, "subscribed": true, "note": null }
        } } });
        let InboundPart::Action(event) = InboundPart::classify(&part) else {
            panic!("expected action");
        };
        assert_eq!(event.action_name, "submit_form");
        assert_eq!(event.context["name"], Scalar::String("Ada".into()));
        assert_eq!(event.context["age"].to_string(), "36");
        assert_eq!(event.context["subscribed"], Scalar::Bool(true));
        assert_eq!(event.context["note"], Scalar::Null);
    }

    #[test]
    fn action_without_context_has_empty_context() {
        let part = json!({ "kind": "data", "data": { "userAction": { "actionName": "refresh" } } });
        assert_eq!(InboundPart::classify(&part), InboundPart::Action(ActionEvent::new("refresh")));
    }

    #[test]
    fn non_object_context_is_dropped_but_action_survives() {
        for context in [json!(["a", 1]), json!("name=Ada"), json!(null)] {
            let value = json!({ "actionName": "refresh", "context": context });
            assert_eq!(ActionEvent::from_json(&value), Some(ActionEvent::new("refresh")), "context {context}");
        }
    }

    #[test]
    fn other_data_and_kinds_are_unknown() {
        assert_eq!(InboundPart::classify(&json!({ "kind": "data", "data": { "x": 1 } })), InboundPart::Unknown);
        assert_eq!(
            InboundPart::classify(&json!({ "kind": "data", "data": { "userAction": { "context": {} } } })),
            InboundPart::Unknown
        );
        assert_eq!(InboundPart::classify(&json!({ "kind": "file" })), InboundPart::Unknown);
        assert_eq!(InboundPart::classify(&json!("bare")), InboundPart::Unknown);
    }

    #[test]
    fn nested_context_values_keep_json_text() {
        let event = ActionEvent::from_json(&json!({ "actionName": "a", "context": { "tags": ["x", "y"] } })).unwrap();
        assert_eq!(event.context["tags"].to_string(), r#"["x","y"]"#);
    }

    #[test]
    fn context_json_is_compact_and_sorted() {
        let event = ActionEvent::new("select")
            .with("id", Scalar::Number(7.into()))
            .with("day", Scalar::String("mon".into()));
        assert_eq!(event.context_json(), r#"{"day":"mon","id":7}"#);
    }
}
