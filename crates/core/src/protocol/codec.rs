use serde_json::Value;

/// Literal token separating narrative text from the JSON payload.
pub const DELIMITER: &str = "---a2ui_JSON---";

/// Narrative text plus the parsed payload (always a non-empty array).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub narrative: String,
    pub payload: Value,
}

impl Candidate {
    /// Messages in payload order.
    pub fn messages(&self) -> &[Value] {
        self.payload.as_array().map(Vec::as_slice).unwrap_or_default()
    }
}

/// Why a raw model response could not be turned into a candidate payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("delimiter missing")]
    DelimiterMissing,
    #[error("empty payload")]
    EmptyPayload,
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
    #[error("payload is not a non-empty list")]
    NotANonEmptyList,
}

/// Split a two-part response into narrative and parsed payload.
///
/// The first delimiter is the split point and everything after it is parsed
/// as the payload. Only if that fails and the delimiter appears again is the
/// payload cut at the second occurrence, so a delimiter inside a JSON string
/// survives while a trailing echo of it is dropped.
pub fn extract(raw: &str) -> Result<Candidate, ExtractionError> {
    let (narrative, rest) = raw.split_once(DELIMITER).ok_or(ExtractionError::DelimiterMissing)?;

    let payload = match parse_payload(rest) {
        Ok(payload) => payload,
        Err(err) => match rest.split_once(DELIMITER) {
            Some((head, trailing)) => {
                tracing::debug!(
                    trailing_len = trailing.len(),
                    "repeated delimiter in model response; trailing text discarded"
                );
                parse_payload(head)?
            }
            None => return Err(err),
        },
    };

    match &payload {
        Value::Array(items) if !items.is_empty() => {}
        _ => return Err(ExtractionError::NotANonEmptyList),
    }

    Ok(Candidate {
        narrative: narrative.trim().to_string(),
        payload,
    })
}

fn parse_payload(text: &str) -> Result<Value, ExtractionError> {
    let text = strip_code_fence(text.trim());
    if text.is_empty() {
        return Err(ExtractionError::EmptyPayload);
    }
    serde_json::from_str(text).map_err(|e| ExtractionError::MalformedJson(e.to_string()))
}

/// Re-join narrative and payload into the two-part format, with the payload
/// in compact canonical JSON.
pub fn render(narrative: &str, payload: &Value) -> String {
    format!("{}\n{DELIMITER}\n{payload}", narrative.trim())
}

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let mut body = text;
    if let Some(after) = body.strip_prefix("```") {
        // Optional language tag up to the end of the opening line.
        body = match after.find('\n') {
            Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') => {
                &after[nl + 1..]
            }
            _ => after.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(before) = body.trim_end().strip_suffix("```") {
        body = before;
    }
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD: &str = r#"[{"deleteSurface":{"surfaceId":"s"}}]"#;

    #[test]
    fn splits_narrative_and_payload() {
        let raw = format!("Here is your form.\n{DELIMITER}\n{PAYLOAD}");
        let c = extract(&raw).unwrap();
        assert_eq!(c.narrative, "Here is your form.");
        assert_eq!(c.payload, json!([{ "deleteSurface": { "surfaceId": "s" } }]));
        assert_eq!(c.messages().len(), 1);
    }

    #[test]
    fn missing_delimiter() {
        assert_eq!(extract("just text, no ui"), Err(ExtractionError::DelimiterMissing));
        assert_eq!(extract(""), Err(ExtractionError::DelimiterMissing));
    }

    #[test]
    fn empty_payload() {
        assert_eq!(extract(&format!("text {DELIMITER}   \n")), Err(ExtractionError::EmptyPayload));
        assert_eq!(extract(&format!("text {DELIMITER}\n```json\n```")), Err(ExtractionError::EmptyPayload));
    }

    #[test]
    fn malformed_json_carries_detail() {
        let err = extract(&format!("t\n{DELIMITER}\n[{{\"a\": }}]")).unwrap_err();
        match err {
            ExtractionError::MalformedJson(detail) => assert!(!detail.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err_string(&format!("t{DELIMITER}{{")).starts_with("malformed JSON: "));
    }

    fn err_string(raw: &str) -> String {
        extract(raw).unwrap_err().to_string()
    }

    #[test]
    fn empty_array_is_rejected() {
        assert_eq!(extract(&format!("t\n{DELIMITER}\n[]")), Err(ExtractionError::NotANonEmptyList));
    }

    #[test]
    fn object_payload_is_rejected() {
        assert_eq!(
            extract(&format!("t\n{DELIMITER}\n{{\"deleteSurface\": {{}}}}")),
            Err(ExtractionError::NotANonEmptyList)
        );
    }

    #[test]
    fn strips_fences_with_and_without_language_tag() {
        for raw in [
            format!("t\n{DELIMITER}\n```json\n{PAYLOAD}\n```"),
            format!("t\n{DELIMITER}\n```\n{PAYLOAD}\n```\n"),
            format!("t\n{DELIMITER}\n```json{PAYLOAD}```"),
        ] {
            assert_eq!(extract(&raw).unwrap().messages().len(), 1, "failed on {raw:?}");
        }
    }

    #[test]
    fn repeated_delimiter_discards_trailing_text() {
        let raw = format!("t\n{DELIMITER}\n{PAYLOAD}\n{DELIMITER}\n");
        assert_eq!(extract(&raw).unwrap().messages().len(), 1);

        let raw = format!("t\n{DELIMITER}\n{PAYLOAD}\n{DELIMITER}\n[{{\"more\": 1}}]");
        assert_eq!(extract(&raw).unwrap().payload, serde_json::from_str::<Value>(PAYLOAD).unwrap());
    }

    #[test]
    fn delimiter_inside_a_string_literal_is_kept() {
        let payload = json!([
            { "beginRendering": { "surfaceId": "s", "root": "t" } },
            { "surfaceUpdate": { "surfaceId": "s", "components": [
                { "id": "t", "component": { "Text": { "text": { "literalString": "Separator is ---a2ui_JSON---" } } } }
            ] } },
            { "dataModelUpdate": { "surfaceId": "s", "contents": [] } }
        ]);
        let c = extract(&render("Here", &payload)).unwrap();
        assert_eq!(c.narrative, "Here");
        assert_eq!(c.payload, payload);

        // an echoed delimiter after such a payload is still dropped
        let raw = format!("{}\n{DELIMITER}\n", render("Here", &payload));
        assert_eq!(extract(&raw).unwrap().payload, payload);
    }

    #[test]
    fn render_then_extract_is_stable() {
        let raw = format!("  Narrative  \n{DELIMITER}\n```json\n[ {{ \"deleteSurface\" : {{ \"surfaceId\": \"s\" }} }} ]\n```");
        let first = extract(&raw).unwrap();
        let rendered = render(&first.narrative, &first.payload);
        assert_eq!(rendered, format!("Narrative\n{DELIMITER}\n{PAYLOAD}"));
        assert_eq!(extract(&rendered).unwrap(), first);
    }

    #[test]
    fn empty_narrative_round_trips() {
        let rendered = render("", &json!([1]));
        let c = extract(&rendered).unwrap();
        assert_eq!(c.narrative, "");
        assert_eq!(c.payload, json!([1]));
    }
}
