// src/config.rs
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::services::completion::OpenAiConfig;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CHAT_LOG: &str = "chat_logs.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("SUPABASE_URL and SUPABASE_KEY must be set together")]
    PartialSupabase,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageConfig {
    Supabase { url: String, key: String },
    JsonLines { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub session_ttl: Duration,
    pub openai: OpenAiConfig,
    pub storage: StorageConfig,
    pub phrases_path: Option<PathBuf>,
    pub admin_key: Option<String>,
}

impl AppConfig {
    /// Read settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let openai = OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or(
                "OPENAI_TIMEOUT_SECS",
                get("OPENAI_TIMEOUT_SECS"),
                DEFAULT_OPENAI_TIMEOUT_SECS,
            )?),
        };

        let storage = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(key)) => StorageConfig::Supabase { url, key },
            (None, None) => StorageConfig::JsonLines {
                path: get("CHAT_LOG_PATH")
                    .unwrap_or_else(|| DEFAULT_CHAT_LOG.to_string())
                    .into(),
            },
            _ => return Err(ConfigError::PartialSupabase),
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            bind_addr,
            session_ttl: Duration::from_secs(parse_or(
                "SESSION_TTL_SECS",
                get("SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )?),
            openai,
            storage,
            phrases_path: get("ESCALATION_PHRASES_PATH").map(PathBuf::from),
            admin_key: get("ADMIN_KEY"),
        })
    }
}

fn parse_or(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
