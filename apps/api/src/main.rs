mod analysis;
mod auth;
mod config;
mod db;
mod errors;
mod history;
mod llm_client;
mod models;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;
mod usage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::extract::PdfTextExtractor;
use crate::analysis::progress::RedisProgressTracker;
use crate::auth::{AuthClient, AuthEvent, SupabaseAuthClient};
use crate::config::Config;
use crate::db::create_pool;
use crate::history::PgHistoryStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3DeckStore;
use crate::usage::PgUsageLedger;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; startup fails on missing required env vars
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Spider API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.llm.clone())?;
    info!(
        "LLM client initialized (provider: {:?}, model: {})",
        config.llm.provider,
        llm.model()
    );

    // Initialize auth client and log session changes
    let auth = Arc::new(SupabaseAuthClient::new(
        &config.auth_url,
        &config.auth_anon_key,
        &config.site_url,
    )?);
    spawn_auth_event_logger(auth.as_ref());

    // Build app state
    let state = AppState {
        config: Arc::new(config.clone()),
        llm: Arc::new(llm),
        extractor: Arc::new(PdfTextExtractor),
        auth,
        history: Arc::new(PgHistoryStore::new(db.clone())),
        usage: Arc::new(PgUsageLedger::new(db.clone())),
        decks: Arc::new(S3DeckStore::new(s3, config.s3_bucket.clone())),
        progress: Arc::new(RedisProgressTracker::new(redis)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to SITE_URL once the web client is deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, closing PostgreSQL pool");
    db.close().await;
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "spider-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO only serves path-style URLs.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

fn spawn_auth_event_logger(auth: &dyn AuthClient) {
    let mut events = auth.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn { user_id }) => info!("Auth: user {user_id} signed in"),
                Ok(AuthEvent::SignedUp { user_id }) => info!("Auth: user {user_id} signed up"),
                Ok(AuthEvent::SignedOut) => info!("Auth: a session was signed out"),
                Ok(AuthEvent::PasswordRecovery) => info!("Auth: password recovery requested"),
                Ok(AuthEvent::UserUpdated { user_id }) => info!("Auth: user {user_id} updated"),
                Err(RecvError::Lagged(n)) => warn!("Auth event log skipped {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
