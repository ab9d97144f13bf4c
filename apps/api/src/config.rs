use anyhow::{bail, Context, Result};

use crate::llm_client::Provider;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm: LlmConfig,
    pub auth_url: String,
    pub auth_anon_key: String,
    /// Origin used to build auth redirect links (password reset, signup confirmation).
    pub site_url: String,
    /// Per-user token allowance for model calls.
    pub token_budget: u64,
    pub max_upload_bytes: usize,
    pub deck_validation: bool,
    pub port: u16,
    pub rust_log: String,
}

/// Model provider settings. Only the selected provider's key is required.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let provider = match optional("LLM_PROVIDER", "openai").to_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "gemini" => Provider::Gemini,
            other => bail!("LLM_PROVIDER must be 'openai' or 'gemini', got '{other}'"),
        };
        let llm = match provider {
            Provider::OpenAi => LlmConfig {
                provider,
                api_key: require("OPENAI_API_KEY")?,
                base_url: optional("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                model: optional("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            },
            Provider::Gemini => LlmConfig {
                provider,
                api_key: require("GEMINI_API_KEY")?,
                base_url: optional("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                model: optional("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            },
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            redis_url: require("REDIS_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            llm,
            auth_url: require("AUTH_URL")?,
            auth_anon_key: require("AUTH_ANON_KEY")?,
            site_url: optional("SITE_URL", "http://localhost:5173"),
            token_budget: optional("TOKEN_BUDGET", "20000")
                .parse::<u64>()
                .context("TOKEN_BUDGET must be a positive integer")?,
            max_upload_bytes: optional("MAX_UPLOAD_BYTES", "20971520")
                .parse::<usize>()
                .context("MAX_UPLOAD_BYTES must be a positive integer")?,
            deck_validation: parse_flag(&optional("DECK_VALIDATION", "true"))
                .context("DECK_VALIDATION must be true or false")?,
            port: optional("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional("RUST_LOG", "info"),
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean '{other}'"),
    }
}
