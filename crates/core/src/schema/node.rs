use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{ConfigurationError, ValidationError};

/// Keywords that carry no validation semantics.
const ANNOTATION_KEYWORDS: &[&str] = &["title", "description", "$schema", "$id", "default", "examples"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One compiled schema node. Compiled once, read-only afterwards.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    json_type: Option<JsonType>,
    properties: BTreeMap<String, Node>,
    required: Vec<String>,
    additional_properties: bool,
    min_properties: Option<usize>,
    max_properties: Option<usize>,
    items: Option<Box<Node>>,
    min_items: Option<usize>,
    enum_values: Option<Vec<Value>>,
    pattern: Option<Regex>,
}

impl Node {
    /// Array of `items`, at least `min_items` long.
    pub(crate) fn array_of(items: Node, min_items: usize) -> Self {
        let mut node = Self::empty();
        node.json_type = Some(JsonType::Array);
        node.items = Some(Box::new(items));
        node.min_items = Some(min_items);
        node
    }

    fn empty() -> Self {
        Self {
            json_type: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
            min_properties: None,
            max_properties: None,
            items: None,
            min_items: None,
            enum_values: None,
            pattern: None,
        }
    }

    /// Compile a schema document. `path` is a JSON pointer used in errors.
    pub(crate) fn compile(schema: &Value, path: &str) -> Result<Self, ConfigurationError> {
        let invalid = |message: String| ConfigurationError::InvalidSchema {
            path: if path.is_empty() { "/".into() } else { path.to_string() },
            message,
        };
        let obj = schema
            .as_object()
            .ok_or_else(|| invalid(format!("schema must be an object, found {}", type_name(schema))))?;

        let mut node = Self::empty();
        for (keyword, value) in obj {
            match keyword.as_str() {
                "type" => {
                    let name = value.as_str().ok_or_else(|| invalid("`type` must be a string".into()))?;
                    node.json_type = Some(
                        JsonType::parse(name).ok_or_else(|| invalid(format!("unknown type `{name}`")))?,
                    );
                }
                "properties" => {
                    let props = value
                        .as_object()
                        .ok_or_else(|| invalid("`properties` must be an object".into()))?;
                    for (name, sub) in props {
                        let sub_path = format!("{path}/properties/{name}");
                        node.properties.insert(name.clone(), Self::compile(sub, &sub_path)?);
                    }
                }
                "required" => {
                    let list = value
                        .as_array()
                        .ok_or_else(|| invalid("`required` must be an array".into()))?;
                    for entry in list {
                        let name = entry
                            .as_str()
                            .ok_or_else(|| invalid("`required` entries must be strings".into()))?;
                        node.required.push(name.to_string());
                    }
                }
                "additionalProperties" => {
                    node.additional_properties = value
                        .as_bool()
                        .ok_or_else(|| invalid("only boolean `additionalProperties` is supported".into()))?;
                }
                "minProperties" => node.min_properties = Some(count(value).ok_or_else(|| invalid("`minProperties` must be a non-negative integer".into()))?),
                "maxProperties" => node.max_properties = Some(count(value).ok_or_else(|| invalid("`maxProperties` must be a non-negative integer".into()))?),
                "minItems" => node.min_items = Some(count(value).ok_or_else(|| invalid("`minItems` must be a non-negative integer".into()))?),
                "items" => {
                    node.items = Some(Box::new(Self::compile(value, &format!("{path}/items"))?));
                }
                "enum" => {
                    let values = value
                        .as_array()
                        .ok_or_else(|| invalid("`enum` must be an array".into()))?;
                    node.enum_values = Some(values.clone());
                }
                "pattern" => {
                    let source = value
                        .as_str()
                        .ok_or_else(|| invalid("`pattern` must be a string".into()))?;
                    node.pattern = Some(
                        Regex::new(source).map_err(|e| invalid(format!("bad pattern `{source}`: {e}")))?,
                    );
                }
                k if ANNOTATION_KEYWORDS.contains(&k) => {}
                other => return Err(invalid(format!("unsupported keyword `{other}`"))),
            }
        }
        Ok(node)
    }

    /// Check `value` against this node. Stops at the first violation.
    pub(crate) fn check(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        let fail = |message: String| Err(ValidationError { path: path.to_string(), message });

        if let Some(expected) = self.json_type
            && !expected.matches(value)
        {
            return fail(format!("expected {}, found {}", expected.as_str(), type_name(value)));
        }

        if let Some(allowed) = &self.enum_values
            && !allowed.contains(value)
        {
            let listed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            return fail(format!("value {value} is not one of [{}]", listed.join(", ")));
        }

        if let (Some(re), Some(s)) = (&self.pattern, value.as_str())
            && !re.is_match(s)
        {
            return fail(format!("string {s:?} does not match pattern `{}`", re.as_str()));
        }

        if let Some(obj) = value.as_object() {
            for key in &self.required {
                if !obj.contains_key(key) {
                    return fail(format!("missing required field '{key}'"));
                }
            }
            if !self.additional_properties
                && let Some(extra) = obj.keys().find(|k| !self.properties.contains_key(*k))
            {
                let allowed: Vec<&str> = self.properties.keys().map(String::as_str).collect();
                return fail(format!("unexpected field '{extra}' (allowed: {})", allowed.join(", ")));
            }
            if let Some(max) = self.max_properties
                && obj.len() > max
            {
                let present: Vec<&str> = obj.keys().map(String::as_str).collect();
                return fail(format!(
                    "expected at most {max} field(s), found {}: {}",
                    obj.len(),
                    present.join(", ")
                ));
            }
            if let Some(min) = self.min_properties
                && obj.len() < min
            {
                let allowed: Vec<&str> = self.properties.keys().map(String::as_str).collect();
                return fail(format!(
                    "expected at least {min} field(s), found {} (one of: {})",
                    obj.len(),
                    allowed.join(", ")
                ));
            }
            for (key, child) in obj {
                if let Some(sub) = self.properties.get(key) {
                    sub.check(child, &format!("{path}.{key}"))?;
                }
            }
        }

        if let Some(arr) = value.as_array() {
            if let Some(min) = self.min_items
                && arr.len() < min
            {
                return fail(format!("expected at least {min} item(s), found {}", arr.len()));
            }
            if let Some(items) = &self.items {
                for (i, item) in arr.iter().enumerate() {
                    items.check(item, &format!("{path}[{i}]"))?;
                }
            }
        }

        Ok(())
    }
}

fn count(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(schema: Value) -> Node {
        Node::compile(&schema, "").unwrap()
    }

    #[test]
    fn type_mismatch_reports_path() {
        let node = compile(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } }
        }));
        let err = node.check(&json!({ "name": 3 }), "$").unwrap_err();
        assert_eq!(err.path, "$.name");
        assert_eq!(err.message, "expected string, found number");
    }

    #[test]
    fn integer_accepts_whole_numbers_only() {
        let node = compile(json!({ "type": "integer" }));
        assert!(node.check(&json!(4), "$").is_ok());
        assert!(node.check(&json!(4.5), "$").is_err());
    }

    #[test]
    fn enum_and_pattern() {
        let node = compile(json!({
            "type": "object",
            "properties": {
                "axis": { "type": "string", "enum": ["horizontal", "vertical"] },
                "color": { "type": "string", "pattern": "^#[0-9a-fA-F]{6}$" }
            }
        }));
        assert!(node.check(&json!({ "axis": "vertical", "color": "#00BFFF" }), "$").is_ok());

        let err = node.check(&json!({ "axis": "diagonal" }), "$").unwrap_err();
        assert!(err.message.contains("not one of"));

        let err = node.check(&json!({ "color": "blue" }), "$").unwrap_err();
        assert_eq!(err.path, "$.color");
        assert!(err.message.contains("does not match pattern"));
    }

    #[test]
    fn closed_object_with_single_key() {
        let node = compile(json!({
            "type": "object",
            "properties": { "a": {}, "b": {} },
            "minProperties": 1,
            "maxProperties": 1,
            "additionalProperties": false
        }));
        assert!(node.check(&json!({ "a": 1 }), "$").is_ok());
        assert!(node.check(&json!({}), "$").unwrap_err().message.contains("at least 1"));
        assert!(node.check(&json!({ "a": 1, "b": 2 }), "$").unwrap_err().message.contains("at most 1"));
        assert!(node.check(&json!({ "c": 1 }), "$").unwrap_err().message.contains("unexpected field 'c'"));
    }

    #[test]
    fn array_items_and_min_items() {
        let node = Node::array_of(compile(json!({ "type": "string" })), 1);
        assert!(node.check(&json!(["x"]), "$").is_ok());
        assert!(node.check(&json!([]), "$").unwrap_err().message.contains("at least 1 item"));
        let err = node.check(&json!(["x", 2]), "$").unwrap_err();
        assert_eq!(err.path, "$[1]");
    }

    #[test]
    fn compile_rejects_unsupported_keywords() {
        let err = Node::compile(&json!({ "oneOf": [] }), "").unwrap_err();
        assert!(err.to_string().contains("unsupported keyword `oneOf`"));
    }

    #[test]
    fn compile_rejects_bad_regex() {
        let err = Node::compile(&json!({ "properties": { "p": { "pattern": "([" } } }), "").unwrap_err();
        match err {
            ConfigurationError::InvalidSchema { path, .. } => assert_eq!(path, "/properties/p"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
