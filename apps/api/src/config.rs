use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "grok-4";

/// Application configuration loaded from environment variables.
/// Startup fails if the provider credential is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub xai_api_key: String,
    pub xai_base_url: String,
    pub xai_model: String,
    /// Skip remote file deletion after generation (debugging aid).
    pub keep_remote_files: bool,
    pub request_timeout_secs: u64,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            xai_api_key: require_env("XAI_API_KEY")?,
            xai_base_url: std::env::var("XAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            xai_model: std::env::var("XAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            keep_remote_files: std::env::var("XAI_KEEP_FILES")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            request_timeout_secs: std::env::var("XAI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .context("XAI_TIMEOUT_SECS must be a whole number of seconds")?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tmp/uploads")),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    #[cfg(test)]
    pub fn test_config(upload_dir: &std::path::Path) -> Self {
        Self {
            xai_api_key: "test-key".to_string(),
            xai_base_url: "http://127.0.0.1:9".to_string(),
            xai_model: "test-model".to_string(),
            keep_remote_files: false,
            request_timeout_secs: 5,
            upload_dir: upload_dir.to_path_buf(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Only the literal `true` (any case) turns a flag on.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
