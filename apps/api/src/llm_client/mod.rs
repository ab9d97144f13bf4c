/// LLM Client: the single point of entry for all model API calls in Spider.
///
/// ARCHITECTURAL RULE: No other module may call a model provider directly.
/// All LLM interactions MUST go through this module.
///
/// One attempt per call. Failures surface to the caller; nothing is retried.
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

pub mod prompts;

const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Provider-neutral completion: the text of the first choice plus token accounting.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub usage: Usage,
}

/// A parsed JSON completion.
#[derive(Debug, Clone)]
pub struct JsonCompletion<T> {
    pub value: T,
    pub usage: Usage,
}

/// The seam every caller depends on. `LlmClient` is the production backend;
/// tests swap in canned responses.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError>;

    /// Calls the model and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    async fn call_json(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<JsonCompletion<serde_json::Value>, LlmError> {
        let response = self.call(prompt, system).await?;
        let value = parse_json_text(response.text.as_deref())?;
        Ok(JsonCompletion {
            value,
            usage: response.usage,
        })
    }
}

/// Parses a completion's text as JSON, tolerating markdown code fences.
pub fn parse_json_text<T: DeserializeOwned>(text: Option<&str>) -> Result<T, LlmError> {
    let text = text
        .map(strip_json_fences)
        .filter(|t| !t.is_empty())
        .ok_or(LlmError::EmptyContent)?;
    serde_json::from_str(text).map_err(LlmError::Parse)
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

impl From<ChatResponse> for LlmResponse {
    fn from(response: ChatResponse) -> Self {
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        LlmResponse {
            text: response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content),
            usage,
        }
    }
}

impl From<GeminiResponse> for LlmResponse {
    fn from(response: GeminiResponse) -> Self {
        let usage = response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();
        LlmResponse {
            text: response
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .and_then(|c| c.parts.into_iter().find_map(|p| p.text)),
            usage,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all services in Spider.
/// Speaks either the OpenAI chat-completions or the Gemini generateContent API,
/// always requesting JSON output.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request(&self, prompt: &str, system: &str) -> reqwest::RequestBuilder {
        match self.config.provider {
            Provider::OpenAi => self
                .client
                .post(&self.config.base_url)
                .bearer_auth(&self.config.api_key)
                .json(&ChatRequest {
                    model: &self.config.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                    temperature: TEMPERATURE,
                    max_tokens: MAX_TOKENS,
                    response_format: ResponseFormat {
                        format_type: "json_object",
                    },
                }),
            Provider::Gemini => {
                let url = format!(
                    "{}/models/{}:generateContent",
                    self.config.base_url.trim_end_matches('/'),
                    self.config.model
                );
                self.client
                    .post(url)
                    .query(&[("key", self.config.api_key.as_str())])
                    .json(&json!({
                        "systemInstruction": { "parts": [{ "text": system }] },
                        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                        "generationConfig": {
                            "temperature": TEMPERATURE,
                            "maxOutputTokens": MAX_TOKENS,
                            "responseMimeType": "application/json"
                        }
                    }))
            }
        }
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    /// Makes a single call to the configured provider.
    async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let response = self
            .request(prompt, system)
            .header("content-type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: provider_error_message(body),
            });
        }

        let llm_response: LlmResponse = match self.config.provider {
            Provider::OpenAi => response.json::<ChatResponse>().await?.into(),
            Provider::Gemini => response.json::<GeminiResponse>().await?.into(),
        };

        debug!(
            "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
            self.config.model, llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

/// Pulls `error.message` out of a provider error body, falling back to the raw body.
fn provider_error_message(body: String) -> String {
    serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
