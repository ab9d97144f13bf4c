//! The upload/analysis flow: a pure state machine plus the pipeline that
//! drives it one stage at a time.
//!
//! ```text
//! Idle --select--> Idle{file} --submit--> Uploading --uploaded--> Analyzing(5)
//!   Analyzing(n) --advance(m > n)--> Analyzing(m)
//!   Analyzing --succeed--> Complete      (Uploading|Analyzing) --fail--> Failed
//!   (Complete|Failed) --reset--> Idle
//! ```

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::client::analyze;
use crate::analysis::display::ReportView;
use crate::analysis::normalize::normalize;
use crate::analysis::progress::{ProgressEntry, ProgressTracker};
use crate::analysis::prompts::build_prompt;
use crate::analysis::record::AnalysisRecord;
use crate::analysis::schema::check_shape;
use crate::analysis::validation::validate_deck;
use crate::errors::AppError;
use crate::llm_client::Usage;
use crate::state::AppState;
use crate::usage::estimate_tokens;

/// Fixed progress checkpoints, in order.
pub const CHECKPOINTS: [u8; 10] = [5, 30, 40, 50, 60, 70, 80, 90, 95, 100];

const EXTRACTED: u8 = 30;
const PREFLIGHT_DONE: u8 = 40;
const MODEL_REPLIED: u8 = 50;
const SHAPE_CHECKED: u8 = 60;
const NORMALIZED: u8 = 70;
const DECK_STORED: u8 = 80;
const HISTORY_SAVED: u8 = 90;
const USAGE_RECORDED: u8 = 95;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    Idle { file_selected: bool },
    Uploading,
    Analyzing { progress: u8 },
    Complete { analysis_id: Uuid },
    Failed { message: String },
}

impl Default for AnalysisState {
    fn default() -> Self {
        AnalysisState::Idle {
            file_selected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    SelectFile,
    Submit,
    Uploaded,
    Advance(u8),
    Succeed { analysis_id: Uuid },
    Fail { message: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no file selected")]
    NoFileSelected,

    #[error("{0} is not a progress checkpoint")]
    UnknownCheckpoint(u8),

    #[error("progress cannot move from {from} to {to}")]
    Backwards { from: u8, to: u8 },

    #[error("{event:?} is not allowed while {state}")]
    NotAllowed {
        state: &'static str,
        event: AnalysisEvent,
    },
}

impl AnalysisState {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisState::Idle { .. } => "idle",
            AnalysisState::Uploading => "uploading",
            AnalysisState::Analyzing { .. } => "analyzing",
            AnalysisState::Complete { .. } => "complete",
            AnalysisState::Failed { .. } => "failed",
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            AnalysisState::Analyzing { progress } => *progress,
            AnalysisState::Complete { .. } => 100,
            _ => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisState::Complete { .. } | AnalysisState::Failed { .. }
        )
    }

    /// Applies one event, returning the next state.
    pub fn apply(&self, event: AnalysisEvent) -> Result<AnalysisState, TransitionError> {
        use AnalysisEvent as E;
        use AnalysisState as S;

        match (self, event) {
            (S::Idle { .. }, E::SelectFile) => Ok(S::Idle {
                file_selected: true,
            }),
            (S::Idle { file_selected: true }, E::Submit) => Ok(S::Uploading),
            (S::Idle { file_selected: false }, E::Submit) => Err(TransitionError::NoFileSelected),
            (S::Uploading, E::Uploaded) => Ok(S::Analyzing {
                progress: CHECKPOINTS[0],
            }),
            (S::Analyzing { progress }, E::Advance(to)) => {
                if !CHECKPOINTS.contains(&to) || to == 100 {
                    Err(TransitionError::UnknownCheckpoint(to))
                } else if to <= *progress {
                    Err(TransitionError::Backwards {
                        from: *progress,
                        to,
                    })
                } else {
                    Ok(S::Analyzing { progress: to })
                }
            }
            (S::Analyzing { .. }, E::Succeed { analysis_id }) => Ok(S::Complete { analysis_id }),
            (S::Uploading | S::Analyzing { .. }, E::Fail { message }) => Ok(S::Failed { message }),
            (S::Complete { .. } | S::Failed { .. } | S::Idle { .. }, E::Reset) => {
                Ok(S::default())
            }
            (state, event) => Err(TransitionError::NotAllowed {
                state: state.name(),
                event,
            }),
        }
    }
}

/// Human label for the loading screen at a given progress value.
pub fn stage_label(progress: u8) -> &'static str {
    match progress {
        0..=30 => "Document Processing",
        31..=50 => "Startup Profile",
        51..=70 => "Market Analysis",
        71..=90 => "Sentiment Analysis",
        _ => "Report Generation",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DeckUpload {
    pub user_id: Uuid,
    pub job_id: String,
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub id: Uuid,
    pub job_id: String,
    pub record: AnalysisRecord,
    pub view: ReportView,
    pub file_ref: String,
    pub warnings: Vec<String>,
    pub tokens_used: u64,
}

/// Tracks one job's state and publishes every change. Publishing is best
/// effort; a tracker outage never fails the analysis.
struct JobProgress<'a> {
    tracker: &'a dyn ProgressTracker,
    job_id: &'a str,
    user_id: Uuid,
    state: AnalysisState,
}

impl<'a> JobProgress<'a> {
    fn new(tracker: &'a dyn ProgressTracker, job_id: &'a str, user_id: Uuid) -> Self {
        Self {
            tracker,
            job_id,
            user_id,
            state: AnalysisState::default(),
        }
    }

    async fn apply(&mut self, event: AnalysisEvent) {
        match self.state.apply(event) {
            Ok(next) => {
                self.state = next;
                let entry = ProgressEntry {
                    user_id: self.user_id,
                    state: self.state.clone(),
                    updated_at: Utc::now(),
                };
                if let Err(e) = self.tracker.publish(self.job_id, &entry).await {
                    warn!("Failed to publish progress for job {}: {e}", self.job_id);
                }
            }
            Err(e) => warn!("Ignoring progress transition for job {}: {e}", self.job_id),
        }
    }

    async fn advance(&mut self, checkpoint: u8) {
        self.apply(AnalysisEvent::Advance(checkpoint)).await;
    }
}

/// Runs a full analysis of one uploaded deck.
pub async fn run_analysis(state: &AppState, upload: DeckUpload) -> Result<AnalysisOutcome, AppError> {
    let mut job = JobProgress::new(state.progress.as_ref(), &upload.job_id, upload.user_id);
    job.apply(AnalysisEvent::SelectFile).await;
    job.apply(AnalysisEvent::Submit).await;
    job.apply(AnalysisEvent::Uploaded).await;

    let mut spent = 0;
    let result = execute(state, &upload, &mut job, &mut spent).await;
    record_usage(state, &upload, spent).await;

    match result {
        Ok(outcome) => {
            job.advance(USAGE_RECORDED).await;
            job.apply(AnalysisEvent::Succeed {
                analysis_id: outcome.id,
            })
            .await;
            info!(
                "Analysis {} complete for job {} ({} tokens)",
                outcome.id, upload.job_id, outcome.tokens_used
            );
            Ok(outcome)
        }
        Err(e) => {
            job.apply(AnalysisEvent::Fail {
                message: e.to_string(),
            })
            .await;
            warn!("Analysis failed for job {}: {e}", upload.job_id);
            Err(e)
        }
    }
}

/// Charges the tokens a run consumed, whether or not it succeeded. Best effort.
async fn record_usage(state: &AppState, upload: &DeckUpload, tokens: u64) {
    if tokens == 0 {
        return;
    }
    if let Err(e) = state.usage.record(upload.user_id, tokens).await {
        warn!("Failed to record {tokens} tokens for job {}: {e}", upload.job_id);
    }
}

/// Provider-reported usage, or the local estimate when the provider sent none.
fn billed(usage: Usage, estimate: impl FnOnce() -> u64) -> u64 {
    match usage.total() {
        0 => estimate(),
        reported => reported,
    }
}

/// Runs every stage up to the history save. Each model call adds what it
/// consumed to `spent` before any later stage can fail.
async fn execute(
    state: &AppState,
    upload: &DeckUpload,
    job: &mut JobProgress<'_>,
    spent: &mut u64,
) -> Result<AnalysisOutcome, AppError> {
    let user_id = upload.user_id;

    let text = state.extractor.extract(upload.bytes.clone()).await?;
    info!(
        "Extracted {} chars from '{}' (job {})",
        text.len(),
        upload.file_name,
        upload.job_id
    );
    job.advance(EXTRACTED).await;

    let prompt = build_prompt(&text);
    let estimate = estimate_tokens(&prompt);
    let budget = state.config.token_budget;
    let used = state.usage.used_tokens(user_id).await?;
    if used + estimate > budget {
        return Err(AppError::TokenLimitExceeded {
            used,
            requested: estimate,
            budget,
        });
    }

    if state.config.deck_validation {
        let (verdict, usage) = validate_deck(state.llm.as_ref(), &text).await;
        *spent += usage.total();
        if verdict.rejects() {
            return Err(AppError::Validation(format!(
                "The uploaded document does not appear to be a pitch deck: {}",
                verdict.reason
            )));
        }
    }
    job.advance(PREFLIGHT_DONE).await;

    let completion = match analyze(state.llm.as_ref(), &prompt).await {
        Ok(completion) => {
            *spent += billed(completion.usage, || {
                estimate + estimate_tokens(&completion.value.to_string())
            });
            completion
        }
        Err(e) => {
            if e.replied {
                *spent += billed(e.usage, || estimate);
            }
            return Err(e.into());
        }
    };
    job.advance(MODEL_REPLIED).await;

    let shape = check_shape(&completion.value);
    let warnings = shape.warnings();
    if !shape.is_conforming() {
        warn!(
            "Model response for job {} drifted from the schema: {}",
            upload.job_id,
            warnings.join("; ")
        );
    }
    job.advance(SHAPE_CHECKED).await;

    let record = normalize(&completion.value);
    job.advance(NORMALIZED).await;

    let file_ref = state
        .decks
        .put(user_id, &upload.job_id, &upload.file_name, upload.bytes.clone())
        .await?;
    job.advance(DECK_STORED).await;

    let id = state.history.save(user_id, &record, &file_ref).await?;
    info!("Saved analysis {id} for job {}", upload.job_id);
    job.advance(HISTORY_SAVED).await;

    Ok(AnalysisOutcome {
        id,
        job_id: upload.job_id.clone(),
        view: ReportView::from_record(&record),
        record,
        file_ref,
        warnings,
        tokens_used: *spent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::test_support::{FakeLlm, TestHarness};
    use serde_json::json;

    fn analyzing(progress: u8) -> AnalysisState {
        AnalysisState::Analyzing { progress }
    }

    #[test]
    fn test_happy_path_transitions() {
        let id = Uuid::new_v4();
        let mut state = AnalysisState::default();
        for event in [
            AnalysisEvent::SelectFile,
            AnalysisEvent::Submit,
            AnalysisEvent::Uploaded,
        ] {
            state = state.apply(event).unwrap();
        }
        assert_eq!(state, analyzing(5));
        for &cp in &CHECKPOINTS[1..9] {
            state = state.apply(AnalysisEvent::Advance(cp)).unwrap();
        }
        assert_eq!(state.progress(), 95);
        state = state
            .apply(AnalysisEvent::Succeed { analysis_id: id })
            .unwrap();
        assert_eq!(state, AnalysisState::Complete { analysis_id: id });
        assert_eq!(state.progress(), 100);
        assert_eq!(state.apply(AnalysisEvent::Reset).unwrap(), AnalysisState::default());
    }

    #[test]
    fn test_submit_requires_file() {
        assert_eq!(
            AnalysisState::default().apply(AnalysisEvent::Submit),
            Err(TransitionError::NoFileSelected)
        );
    }

    #[test]
    fn test_progress_only_moves_forward_through_checkpoints() {
        let state = analyzing(50);
        assert_eq!(
            state.apply(AnalysisEvent::Advance(40)),
            Err(TransitionError::Backwards { from: 50, to: 40 })
        );
        assert_eq!(
            state.apply(AnalysisEvent::Advance(50)),
            Err(TransitionError::Backwards { from: 50, to: 50 })
        );
        assert_eq!(
            state.apply(AnalysisEvent::Advance(55)),
            Err(TransitionError::UnknownCheckpoint(55))
        );
        assert_eq!(
            state.apply(AnalysisEvent::Advance(100)),
            Err(TransitionError::UnknownCheckpoint(100))
        );
        assert_eq!(state.apply(AnalysisEvent::Advance(90)), Ok(analyzing(90)));
    }

    #[test]
    fn test_failure_then_reset_returns_to_idle() {
        let failed = analyzing(30)
            .apply(AnalysisEvent::Fail {
                message: "upstream".into(),
            })
            .unwrap();
        assert!(failed.is_terminal());
        assert!(matches!(
            failed.apply(AnalysisEvent::Advance(40)),
            Err(TransitionError::NotAllowed { state: "failed", .. })
        ));
        assert_eq!(failed.apply(AnalysisEvent::Reset).unwrap(), AnalysisState::default());
    }

    #[test]
    fn test_idle_cannot_succeed() {
        assert!(AnalysisState::default()
            .apply(AnalysisEvent::Succeed {
                analysis_id: Uuid::nil()
            })
            .is_err());
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(stage_label(5), "Document Processing");
        assert_eq!(stage_label(40), "Startup Profile");
        assert_eq!(stage_label(70), "Market Analysis");
        assert_eq!(stage_label(95), "Report Generation");
    }

    fn upload(harness: &TestHarness) -> DeckUpload {
        DeckUpload {
            user_id: harness.user.id,
            job_id: "job-1".into(),
            file_name: "acme.pdf".into(),
            bytes: Bytes::from_static(b"%PDF-1.7 fake"),
        }
    }

    #[tokio::test]
    async fn test_run_analysis_publishes_every_checkpoint() {
        let harness = TestHarness::new(FakeLlm::with_values([
            json!({"isPitchDeck": true, "confidence": 0.95}),
            json!({"profile": {"companyName": "Acme", "industry": "Robotics"}, "investmentScore": 8}),
        ]));
        let outcome = run_analysis(&harness.state(), upload(&harness)).await.unwrap();

        assert_eq!(outcome.record.company_overview.company_name, "Acme");
        assert_eq!(outcome.view.investment_percentage, 80.0);
        assert!(!outcome.warnings.is_empty());
        assert_eq!(outcome.tokens_used, 300);

        let progress: Vec<u8> = harness
            .progress
            .states(harness.user.id, "job-1")
            .iter()
            .filter_map(|s| match s {
                AnalysisState::Analyzing { progress } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, CHECKPOINTS[..9].to_vec());
        assert_eq!(
            harness.progress.states(harness.user.id, "job-1").last(),
            Some(&AnalysisState::Complete {
                analysis_id: outcome.id
            })
        );

        assert_eq!(harness.history.len(), 1);
        assert_eq!(harness.decks.keys(), vec![outcome.file_ref.clone()]);
        assert_eq!(harness.usage.used(harness.user.id), 300);
    }

    #[tokio::test]
    async fn test_upstream_error_fails_job_and_saves_nothing() {
        let harness = TestHarness::new(FakeLlm::with_results(vec![
            Ok(FakeLlm::text_response(r#"{"isPitchDeck": true, "confidence": 1}"#)),
            Err(LlmError::Api {
                status: 500,
                message: "boom".into(),
            }),
        ]));
        let err = run_analysis(&harness.state(), upload(&harness)).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(matches!(
            harness.progress.states(harness.user.id, "job-1").last(),
            Some(AnalysisState::Failed { .. })
        ));
        assert_eq!(harness.history.len(), 0);
        // The validation call still ran and is charged.
        assert_eq!(harness.usage.used(harness.user.id), 150);
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_still_charged() {
        let harness = TestHarness::new(FakeLlm::with_texts([
            r#"{"isPitchDeck": true, "confidence": 1}"#,
            "Sorry, I can only answer in prose.",
        ]));
        let err = run_analysis(&harness.state(), upload(&harness)).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert_eq!(harness.history.len(), 0);
        assert_eq!(harness.usage.used(harness.user.id), 300);
    }

    #[tokio::test]
    async fn test_shared_job_id_keeps_each_users_progress() {
        let harness = TestHarness::new(FakeLlm::with_values([
            json!({"isPitchDeck": true, "confidence": 0.9}),
            json!({"profile": {"companyName": "Acme"}}),
            json!({"isPitchDeck": true, "confidence": 0.9}),
            json!({"profile": {"companyName": "Globex"}}),
        ]));
        let state = harness.state();
        let other = Uuid::new_v4();

        let mine = run_analysis(
            &state,
            DeckUpload {
                job_id: "shared".into(),
                ..upload(&harness)
            },
        )
        .await
        .unwrap();
        let theirs = run_analysis(
            &state,
            DeckUpload {
                user_id: other,
                job_id: "shared".into(),
                ..upload(&harness)
            },
        )
        .await
        .unwrap();

        let entry = state
            .progress
            .fetch(harness.user.id, "shared")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.user_id, harness.user.id);
        assert_eq!(entry.state, AnalysisState::Complete { analysis_id: mine.id });
        assert_eq!(
            harness.progress.states(other, "shared").last(),
            Some(&AnalysisState::Complete {
                analysis_id: theirs.id
            })
        );
    }

    #[tokio::test]
    async fn test_confident_non_deck_is_rejected_before_analysis() {
        let harness = TestHarness::new(FakeLlm::with_values([
            json!({"isPitchDeck": false, "confidence": 0.9, "reason": "a tax form"}),
        ]));
        let err = run_analysis(&harness.state(), upload(&harness)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("a tax form")));
        assert_eq!(harness.llm.prompts().len(), 1);
        assert_eq!(harness.usage.used(harness.user.id), 150);
    }

    #[tokio::test]
    async fn test_exhausted_budget_blocks_the_model_call() {
        let harness = TestHarness::new(FakeLlm::with_values([json!({})]));
        harness.usage.set(harness.user.id, harness.config.token_budget);
        let err = run_analysis(&harness.state(), upload(&harness)).await.unwrap_err();
        assert!(matches!(err, AppError::TokenLimitExceeded { .. }));
        assert!(harness.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_progress_outage_does_not_fail_analysis() {
        let harness = TestHarness::new(FakeLlm::with_values([
            json!({"isPitchDeck": true, "confidence": 0.9}),
            json!({}),
        ]));
        harness.progress.fail_publishes();
        let outcome = run_analysis(&harness.state(), upload(&harness)).await;
        assert!(outcome.is_ok());
    }
}
