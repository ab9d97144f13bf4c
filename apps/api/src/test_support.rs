//! In-memory fakes of every collaborator, for unit and router tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::analysis::extract::{DocumentExtractor, ExtractError};
use crate::analysis::pipeline::AnalysisState;
use crate::analysis::progress::{progress_key, ProgressEntry, ProgressTracker};
use crate::analysis::record::AnalysisRecord;
use crate::auth::{AuthClient, AuthError, AuthEvent, AuthUser, Session, SignUp};
use crate::config::{Config, LlmConfig};
use crate::errors::AppError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::llm_client::{LlmBackend, LlmError, LlmResponse, Provider, Usage};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{deck_key, DeckStore};
use crate::usage::UsageLedger;

pub const TEST_TOKEN: &str = "test-access-token";
pub const TEST_EMAIL: &str = "founder@acme.io";
pub const TEST_PASSWORD: &str = "hunter22";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/spider_test".into(),
        redis_url: "redis://localhost".into(),
        s3_bucket: "decks".into(),
        s3_endpoint: "http://localhost:9000".into(),
        aws_access_key_id: "test".into(),
        aws_secret_access_key: "test".into(),
        llm: LlmConfig {
            provider: Provider::OpenAi,
            api_key: "sk-test".into(),
            base_url: "http://localhost/unused".into(),
            model: "test-model".into(),
        },
        auth_url: "http://localhost/auth".into(),
        auth_anon_key: "anon".into(),
        site_url: "http://localhost:5173".into(),
        token_budget: 20_000,
        max_upload_bytes: 1024 * 1024,
        deck_validation: true,
        port: 0,
        rust_log: "debug".into(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LLM
// ────────────────────────────────────────────────────────────────────────────

/// Replays canned results in order and records every prompt it was sent.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeLlm {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            text: Some(text.to_string()),
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
        }
    }

    pub fn with_results(results: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(results.into()),
            calls: Mutex::default(),
        }
    }

    pub fn with_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_results(
            texts
                .into_iter()
                .map(|t| Ok(Self::text_response(t)))
                .collect(),
        )
    }

    pub fn with_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::with_results(
            values
                .into_iter()
                .map(|v| Ok(Self::text_response(&v.to_string())))
                .collect(),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn systems(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), system.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeExtractor {
    text: Option<String>,
}

impl FakeExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn extract(&self, _bytes: Bytes) -> Result<String, ExtractError> {
        self.text.clone().ok_or(ExtractError::NoText)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeAuth {
    user: AuthUser,
    events: broadcast::Sender<AuthEvent>,
}

impl FakeAuth {
    pub fn new(user: AuthUser) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { user, events }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn session(&self) -> Session {
        Session {
            access_token: TEST_TOKEN.into(),
            refresh_token: "refresh".into(),
            expires_in: 3600,
            user: self.user.clone(),
        }
    }

    fn check(&self, token: &str) -> Result<(), AuthError> {
        if token == TEST_TOKEN {
            Ok(())
        } else {
            Err(AuthError::InvalidSession)
        }
    }
}

#[async_trait]
impl AuthClient for FakeAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email != self.user.email || password != TEST_PASSWORD {
            return Err(AuthError::InvalidCredentials);
        }
        let _ = self.events.send(AuthEvent::SignedIn {
            user_id: self.user.id,
        });
        Ok(self.session())
    }

    async fn sign_up(&self, email: &str, _password: &str, full_name: &str) -> Result<SignUp, AuthError> {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: Some(full_name.to_string()),
        };
        let _ = self.events.send(AuthEvent::SignedUp { user_id: user.id });
        Ok(SignUp {
            user,
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.check(access_token)?;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, _email: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn update_password(&self, access_token: &str, _password: &str) -> Result<AuthUser, AuthError> {
        self.check(access_token)?;
        Ok(self.user.clone())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.check(access_token)?;
        Ok(self.user.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stores
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: Mutex<Vec<(Uuid, HistoryEntry)>>,
}

impl MemoryHistoryStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn insert(&self, user_id: Uuid, record: AnalysisRecord) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.lock().unwrap().push((
            user_id,
            HistoryEntry {
                id,
                insights: record,
                file_ref: format!("memory://{id}"),
                timestamp: Utc::now(),
            },
        ));
        id
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, user_id: Uuid, record: &AnalysisRecord, file_ref: &str) -> Result<Uuid, AppError> {
        let id = self.insert(user_id, record.clone());
        if let Some((_, entry)) = self.rows.lock().unwrap().last_mut() {
            entry.file_ref = file_ref.to_string();
        }
        Ok(id)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<HistoryEntry, AppError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|(owner, entry)| *owner == user_id && entry.id == id)
            .map(|(_, entry)| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))
    }
}

#[derive(Default)]
pub struct MemoryUsageLedger {
    used: Mutex<HashMap<Uuid, u64>>,
}

impl MemoryUsageLedger {
    pub fn used(&self, user_id: Uuid) -> u64 {
        self.used.lock().unwrap().get(&user_id).copied().unwrap_or(0)
    }

    pub fn set(&self, user_id: Uuid, tokens: u64) {
        self.used.lock().unwrap().insert(user_id, tokens);
    }
}

#[async_trait]
impl UsageLedger for MemoryUsageLedger {
    async fn used_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self.used(user_id))
    }

    async fn record(&self, user_id: Uuid, tokens: u64) -> Result<u64, AppError> {
        let mut used = self.used.lock().unwrap();
        let total = used.entry(user_id).or_insert(0);
        *total += tokens;
        Ok(*total)
    }
}

#[derive(Default)]
pub struct MemoryDeckStore {
    keys: Mutex<Vec<String>>,
}

impl MemoryDeckStore {
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeckStore for MemoryDeckStore {
    async fn put(&self, user_id: Uuid, job_id: &str, file_name: &str, _bytes: Bytes) -> Result<String, AppError> {
        let file_ref = format!("memory://{}", deck_key(user_id, job_id, file_name));
        self.keys.lock().unwrap().push(file_ref.clone());
        Ok(file_ref)
    }
}

/// Keeps every published state, not just the latest, so tests can check the
/// full sequence.
#[derive(Default)]
pub struct MemoryProgressTracker {
    entries: Mutex<HashMap<String, Vec<ProgressEntry>>>,
    failing: AtomicBool,
}

impl MemoryProgressTracker {
    pub fn states(&self, user_id: Uuid, job_id: &str) -> Vec<AnalysisState> {
        self.entries
            .lock()
            .unwrap()
            .get(&progress_key(user_id, job_id))
            .map(|entries| entries.iter().map(|e| e.state.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_publishes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressTracker for MemoryProgressTracker {
    async fn publish(&self, job_id: &str, entry: &ProgressEntry) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("progress store offline".into()));
        }
        self.entries
            .lock()
            .unwrap()
            .entry(progress_key(entry.user_id, job_id))
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn fetch(&self, user_id: Uuid, job_id: &str) -> Result<Option<ProgressEntry>, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&progress_key(user_id, job_id))
            .and_then(|entries| entries.last().cloned()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Harness
// ────────────────────────────────────────────────────────────────────────────

/// A full `AppState` over fakes, with typed handles kept for assertions.
pub struct TestHarness {
    pub config: Arc<Config>,
    pub user: AuthUser,
    pub llm: Arc<FakeLlm>,
    pub auth: Arc<FakeAuth>,
    pub extractor: Arc<FakeExtractor>,
    pub history: Arc<MemoryHistoryStore>,
    pub usage: Arc<MemoryUsageLedger>,
    pub decks: Arc<MemoryDeckStore>,
    pub progress: Arc<MemoryProgressTracker>,
}

impl TestHarness {
    pub fn new(llm: FakeLlm) -> Self {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: TEST_EMAIL.into(),
            full_name: Some("Ada Founder".into()),
        };
        Self {
            config: Arc::new(test_config()),
            auth: Arc::new(FakeAuth::new(user.clone())),
            user,
            llm: Arc::new(llm),
            extractor: Arc::new(FakeExtractor::returning(
                "Acme Robotics\nProblem: factories lack flexible automation.\nSolution: RoboArm.",
            )),
            history: Arc::default(),
            usage: Arc::default(),
            decks: Arc::default(),
            progress: Arc::default(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            llm: self.llm.clone(),
            extractor: self.extractor.clone(),
            auth: self.auth.clone(),
            history: self.history.clone(),
            usage: self.usage.clone(),
            decks: self.decks.clone(),
            progress: self.progress.clone(),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state())
    }
}
