use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::provisioning::AgentFailurePolicy;

const DEFAULT_AGENT_API_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_AGENT_APP_URL: &str = "https://elevenlabs.io";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: SecretString,
    pub gemini_api_key: SecretString,
    pub gemini_model: String,
    pub auth_url: String,
    pub auth_anon_key: SecretString,
    pub agent_api_url: String,
    pub agent_app_url: String,
    pub extraction_timeout: Duration,
    pub agent_timeout: Duration,
    pub agent_failure_policy: AgentFailurePolicy,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?.into(),
            gemini_api_key: require_env("GEMINI_API_KEY")?.into(),
            gemini_model: env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            auth_url: require_env("AUTH_URL")?,
            auth_anon_key: require_env("AUTH_ANON_KEY")?.into(),
            agent_api_url: env_or("AGENT_API_URL", DEFAULT_AGENT_API_URL),
            agent_app_url: env_or("AGENT_APP_URL", DEFAULT_AGENT_APP_URL),
            extraction_timeout: Duration::from_secs(
                env_or("EXTRACTION_TIMEOUT_SECS", "60")
                    .parse::<u64>()
                    .context("EXTRACTION_TIMEOUT_SECS must be a number of seconds")?,
            ),
            agent_timeout: Duration::from_secs(
                env_or("AGENT_TIMEOUT_SECS", "30")
                    .parse::<u64>()
                    .context("AGENT_TIMEOUT_SECS must be a number of seconds")?,
            ),
            agent_failure_policy: env_or("AGENT_FAILURE_POLICY", "persist_pending")
                .parse::<AgentFailurePolicy>()
                .context("AGENT_FAILURE_POLICY must be 'persist_pending' or 'abort'")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
