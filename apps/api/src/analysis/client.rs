use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{parse_json_text, JsonCompletion, LlmBackend, LlmError, Usage};

/// A failed analysis call. `replied` is set when the provider answered (and
/// billed) but the content could not be used.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct AnalyzeError {
    pub source: LlmError,
    pub usage: Usage,
    pub replied: bool,
}

impl AnalyzeError {
    fn unanswered(source: LlmError) -> Self {
        Self {
            source,
            usage: Usage::default(),
            replied: false,
        }
    }
}

/// Sends a built analysis prompt and returns the model's raw JSON output.
///
/// One attempt: transport failures and non-2xx replies come back as
/// `LlmError::Http`/`Api`, unparsable content as `Parse`/`EmptyContent`
/// together with the usage the reply reported.
pub async fn analyze(
    llm: &dyn LlmBackend,
    prompt: &str,
) -> Result<JsonCompletion<Value>, AnalyzeError> {
    info!("Requesting deck analysis (prompt {} chars)", prompt.len());
    let response = llm
        .call(prompt, JSON_ONLY_SYSTEM)
        .await
        .map_err(AnalyzeError::unanswered)?;
    let usage = response.usage;
    let value = parse_json_text(response.text.as_deref()).map_err(|source| {
        warn!("Deck analysis reply was not usable JSON: {source}");
        AnalyzeError {
            source,
            usage,
            replied: true,
        }
    })?;
    info!(
        "Deck analysis returned ({} input / {} output tokens)",
        usage.input_tokens, usage.output_tokens
    );
    Ok(JsonCompletion { value, usage })
}
