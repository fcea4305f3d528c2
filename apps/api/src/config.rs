use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub inference_api_base: String,
    pub inference_api_token: String,
    pub port: u16,
    pub rust_log: String,
    /// Seconds a finished job (result or failure) stays queryable before the
    /// eviction sweep removes it.
    pub job_ttl_secs: u64,
    /// Bounded per-subscriber frame queue depth. The pipeline only ever emits
    /// eight checkpoint frames, so overflow means a stuck consumer.
    pub subscriber_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            inference_api_base: std::env::var("INFERENCE_API_BASE")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            inference_api_token: require_env("INFERENCE_API_TOKEN")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            job_ttl_secs: std::env::var("JOB_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse::<u64>()
                .context("JOB_TTL_SECS must be a number of seconds")?,
            subscriber_buffer: std::env::var("SUBSCRIBER_BUFFER")
                .unwrap_or_else(|_| "32".to_string())
                .parse::<usize>()
                .context("SUBSCRIBER_BUFFER must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
