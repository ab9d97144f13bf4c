use std::sync::Arc;

use crate::analysis::extract::DocumentExtractor;
use crate::analysis::progress::ProgressTracker;
use crate::auth::AuthClient;
use crate::config::Config;
use crate::history::HistoryStore;
use crate::llm_client::LlmBackend;
use crate::storage::DeckStore;
use crate::usage::UsageLedger;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is built once in `main` and shared behind a trait object.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmBackend>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub auth: Arc<dyn AuthClient>,
    pub history: Arc<dyn HistoryStore>,
    pub usage: Arc<dyn UsageLedger>,
    pub decks: Arc<dyn DeckStore>,
    /// Latest state of in-flight analyses, keyed by job id.
    pub progress: Arc<dyn ProgressTracker>,
}
