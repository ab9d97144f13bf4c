use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::prompts::{VALIDATION_PROMPT, VALIDATION_SAMPLE_CHARS};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmBackend, Usage};

/// Rejection needs a confident "no"; anything less proceeds to analysis.
pub const REJECT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckValidation {
    pub is_pitch_deck: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

impl DeckValidation {
    fn assumed(reason: &str) -> Self {
        DeckValidation {
            is_pitch_deck: true,
            confidence: 0.5,
            reason: reason.to_string(),
        }
    }

    pub fn rejects(&self) -> bool {
        !self.is_pitch_deck && self.confidence >= REJECT_CONFIDENCE
    }
}

/// Asks the model whether the opening of the document reads like a pitch deck.
///
/// Never fails: an upstream or parse error is logged and treated as a
/// low-confidence "yes" so the analysis goes ahead.
pub async fn validate_deck(llm: &dyn LlmBackend, text: &str) -> (DeckValidation, Usage) {
    let sample: String = text.chars().take(VALIDATION_SAMPLE_CHARS).collect();
    let prompt = VALIDATION_PROMPT.replace("{sample}", &sample);

    match llm.call_json(&prompt, JSON_ONLY_SYSTEM).await {
        Ok(completion) => match serde_json::from_value::<DeckValidation>(completion.value) {
            Ok(mut verdict) => {
                verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
                info!(
                    "Deck validation: pitch_deck={} confidence={:.2}",
                    verdict.is_pitch_deck, verdict.confidence
                );
                (verdict, completion.usage)
            }
            Err(e) => {
                warn!("Deck validation reply was not understood, proceeding: {e}");
                (
                    DeckValidation::assumed("Validation reply unreadable; proceeding with analysis"),
                    completion.usage,
                )
            }
        },
        Err(e) => {
            warn!("Deck validation call failed, proceeding: {e}");
            (
                DeckValidation::assumed("Validation unavailable; proceeding with analysis"),
                Usage::default(),
            )
        }
    }
}
