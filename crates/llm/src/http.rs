//! HTTP-based LLM providers.
//!
//! Supports OpenAI-compatible chat completions (OpenAI, Gemini, DeepSeek,
//! local gateways) and Anthropic's native Messages API.

use crate::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role, StopReason,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const ENV_MODEL: &str = "UIGEN_LLM_MODEL";
pub const ENV_API_KEY: &str = "UIGEN_LLM_API_KEY";
pub const ENV_BASE_URL: &str = "UIGEN_LLM_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "UIGEN_LLM_TIMEOUT_SECS";

/// Per-request timeout when none is configured. UI payloads are long.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire format family, inferred from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    /// Falls back to OpenAI-compatible format.
    Unknown,
}

impl ProviderKind {
    /// Infer from the model name. A routing prefix such as
    /// `anthropic/claude-sonnet-4-5` wins over the bare name.
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if let Some((prefix, _)) = m.split_once('/') {
            match prefix {
                "openai" => return Self::OpenAi,
                "anthropic" => return Self::Anthropic,
                "gemini" | "google" => return Self::Google,
                "deepseek" => return Self::DeepSeek,
                _ => {}
            }
        }
        match m.split('-').next().unwrap_or_default() {
            "gpt" | "o1" | "o3" | "o4" => Self::OpenAi,
            "claude" => Self::Anthropic,
            "gemini" => Self::Google,
            "deepseek" => Self::DeepSeek,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::DeepSeek => "deepseek",
            Self::Unknown => "openai-compatible",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

/// Connection settings for one model endpoint.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `UIGEN_LLM_*`. `None` unless both model and key are set.
    pub fn from_env() -> Option<Self> {
        let model = non_empty_var(ENV_MODEL)?;
        let api_key = non_empty_var(ENV_API_KEY)?;
        let timeout = non_empty_var(ENV_TIMEOUT_SECS)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self {
            model,
            api_key,
            base_url: non_empty_var(ENV_BASE_URL),
            timeout: Duration::from_secs(timeout),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ── OpenAI-compatible wire types ──

#[derive(Debug, Serialize)]
struct OaiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Anthropic Messages API wire types ──

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

/// Only text blocks are requested; anything else is skipped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn openai_body<'a>(model: &'a str, request: &'a CompletionRequest) -> OaiRequest<'a> {
    OaiRequest {
        model,
        messages: request
            .messages
            .iter()
            .map(|m| WireMessage { role: role_str(m.role), content: m.content.as_str().into() })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

/// System messages move to the top-level field. Consecutive turns with the
/// same role are merged, since the Messages API requires alternation.
fn anthropic_body<'a>(model: &'a str, request: &'a CompletionRequest) -> AnthropicRequest<'a> {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut messages: Vec<WireMessage<'a>> = Vec::with_capacity(request.messages.len());
    for m in request.messages.iter().filter(|m: &&ChatMessage| m.role != Role::System) {
        let role = role_str(m.role);
        match messages.last_mut() {
            Some(prev) if prev.role == role => {
                let merged = format!("{}\n\n{}", prev.content, m.content);
                prev.content = merged.into();
            }
            _ => messages.push(WireMessage { role, content: m.content.as_str().into() }),
        }
    }

    AnthropicRequest {
        model,
        max_tokens: request.max_tokens,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages,
        temperature: request.temperature,
    }
}

/// Map an HTTP error status. 429 and 5xx are worth retrying.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited
    } else if status.is_server_error() {
        LlmError::Unavailable(format!("{status}: {body}"))
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() || e.is_connect() {
        LlmError::Unavailable(e.to_string())
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

/// Provider speaking either the OpenAI-compatible or the Anthropic API.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    pub fn new(config: HttpConfig) -> Self {
        let kind = ProviderKind::from_model(&config.model);
        let base = config.base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        // Routing prefixes are ours, not the API's.
        let model = match config.model.split_once('/') {
            Some((_, name)) if kind != ProviderKind::Unknown => name.to_owned(),
            _ => config.model,
        };
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "http client builder failed; using defaults");
                reqwest::Client::new()
            });
        Self {
            kind,
            model,
            client,
            base_url: base.trim_end_matches('/').to_owned(),
            api_key: config.api_key,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Anthropic => format!("{}/v1/messages", self.base_url),
            _ => format!("{}/chat/completions", self.base_url),
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        body: &B,
        builder: reqwest::RequestBuilder,
    ) -> Result<R, LlmError> {
        let resp = builder.json(body).send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(provider = self.kind.as_str(), %status, "completion request rejected");
            return Err(check_error(status, text));
        }
        resp.json().await.map_err(|e| LlmError::RequestFailed(format!("bad response body: {e}")))
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = openai_body(&self.model, &request);
        let builder = self.client.post(self.endpoint()).bearer_auth(&self.api_key);
        let api: OaiResponse = self.post(&body, builder).await?;

        let (content, finish_reason) = api
            .choices
            .into_iter()
            .next()
            .map(|c| (c.message.content.unwrap_or_default(), c.finish_reason))
            .unwrap_or_default();
        let stop_reason = match finish_reason.as_deref() {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };
        let (input_tokens, output_tokens) =
            api.usage.map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, stop_reason, input_tokens, output_tokens })
    }

    async fn complete_anthropic(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = anthropic_body(&self.model, &request);
        let builder = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let api: AnthropicResponse = self.post(&body, builder).await?;

        let content = api
            .content
            .into_iter()
            .filter_map(|b| match b {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        let stop_reason = match api.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };
        let (input_tokens, output_tokens) =
            api.usage.map(|u| (u.input_tokens, u.output_tokens)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, stop_reason, input_tokens, output_tokens })
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        tracing::debug!(
            provider = self.kind.as_str(),
            model = %self.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "sending completion request"
        );
        match self.kind {
            ProviderKind::Anthropic => Box::pin(self.complete_anthropic(request)),
            _ => Box::pin(self.complete_openai(request)),
        }
    }
}

/// Build a provider from `UIGEN_LLM_*`. `None` if model or key is unset.
pub fn from_env() -> Option<HttpProvider> {
    HttpConfig::from_env().map(HttpProvider::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(model: &str, base_url: Option<&str>) -> HttpProvider {
        HttpProvider::new(HttpConfig {
            base_url: base_url.map(str::to_owned),
            ..HttpConfig::new(model, "sk-test")
        })
    }

    fn request(messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest { messages, max_tokens: 256, temperature: 0.2 }
    }

    #[test]
    fn infers_kind_from_model_name() {
        assert_eq!(ProviderKind::from_model("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_model("o3-mini"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_model("Claude-3-opus"), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::from_model("gemini-2.0-flash"), ProviderKind::Google);
        assert_eq!(ProviderKind::from_model("deepseek-chat"), ProviderKind::DeepSeek);
        assert_eq!(ProviderKind::from_model("llama-3"), ProviderKind::Unknown);
        assert_eq!(ProviderKind::from_model("gptx"), ProviderKind::Unknown);
    }

    #[test]
    fn routing_prefix_selects_kind_and_is_stripped() {
        let p = provider("anthropic/claude-sonnet-4-5", None);
        assert_eq!(p.kind(), ProviderKind::Anthropic);
        assert_eq!(p.model(), "claude-sonnet-4-5");
        assert_eq!(p.endpoint(), "https://api.anthropic.com/v1/messages");

        let p = provider("ollama/qwen", None);
        assert_eq!(p.model(), "ollama/qwen");
        assert_eq!(p.name(), "openai-compatible");
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let p = provider("gpt-4o", Some("https://my-proxy.com/v1/"));
        assert_eq!(p.endpoint(), "https://my-proxy.com/v1/chat/completions");
    }

    #[test]
    fn openai_body_keeps_system_inline() {
        let req = request(vec![ChatMessage::system("rules"), ChatMessage::user("a form")]);
        let body = serde_json::to_value(openai_body("gpt-4o", &req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    { "role": "system", "content": "rules" },
                    { "role": "user", "content": "a form" }
                ],
                "max_tokens": 256,
                "temperature": 0.2f32
            })
        );
    }

    #[test]
    fn anthropic_body_lifts_system_and_merges_roles() {
        let req = request(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("a form"),
            ChatMessage::user("I received no response. Please retry: 'a form'"),
            ChatMessage::assistant("bad"),
        ]);
        let body = serde_json::to_value(anthropic_body("claude-sonnet-4-5", &req)).unwrap();
        assert_eq!(body["system"], "rules");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(
            body["messages"][0]["content"],
            "a form\n\nI received no response. Please retry: 'a form'"
        );
        assert_eq!(body["messages"][1]["content"], "bad");
    }

    #[test]
    fn anthropic_body_omits_missing_system() {
        let req = request(vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(anthropic_body("claude-3", &req)).unwrap();
        assert!(body.get("system").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(check_error(reqwest::StatusCode::BAD_GATEWAY, "down".into()), LlmError::Unavailable(_)));
        assert!(matches!(check_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()), LlmError::RateLimited));
        assert!(matches!(check_error(reqwest::StatusCode::UNAUTHORIZED, "no".into()), LlmError::RequestFailed(_)));
    }

    #[test]
    fn config_defaults() {
        let cfg = HttpConfig::new("gpt-4o", "k");
        assert_eq!(cfg.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(cfg.base_url.is_none());
    }
}
