// src/config.rs

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use directories::ProjectDirs;
use dotenvy::dotenv;
use url::Url;

/// A persisted session older than this is never resumed.
pub const SESSION_STALE_AFTER_MS: i64 = 3 * 60 * 60 * 1000;

/// Language assigned to coding answers until the candidate picks one.
pub const DEFAULT_CODE_LANGUAGE: &str = "javascript";

/// Period of the countdown ticker.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound accepted for `totalTimeLimit` (one day).
pub const MAX_TIME_LIMIT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Fixed location of the single active session snapshot.
    pub session_file: PathBuf,
    pub ai: AiConfig,
}

/// Settings for the OpenAI-compatible endpoint backing scoring and code checks.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://assessments.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?,
            Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let session_file = env::var("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());

        let ai = AiConfig::from_env()?;

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            session_file,
            ai,
        })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url =
            env::var("AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let base_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "AI_BASE_URL",
            reason: e.to_string(),
        })?;

        let api_key = env::var("AI_API_KEY").map_err(|_| ConfigError::Missing("AI_API_KEY"))?;

        let model = env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let timeout_secs = match env::var("AI_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "AI_TIMEOUT_SECS",
                reason: e.to_string(),
            })?,
            Err(_) => 120,
        };

        Ok(Self {
            base_url,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn default_session_file() -> PathBuf {
    match ProjectDirs::from("", "", "assessment-runner") {
        Some(dirs) => dirs.data_local_dir().join("session.json"),
        None => PathBuf::from("assessment_session.json"),
    }
}
