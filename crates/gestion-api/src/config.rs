//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HOST` / `PORT` | `0.0.0.0` / `8080` |
//! | `GCP_PROJECT_ID` | `gestion-20` |
//! | `GCP_LOCATION` | `us-central1` |
//! | `VISION_MODEL` | `gemini-2.0-flash` |
//! | `STORAGE_BUCKET` | `gestion-20.firebasestorage.app` |
//! | `STORAGE_PATH_FIELD` | `storagePath` |
//! | `CREDENTIALS_MODE` | `ambient` (`key-file` for local runs) |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | `service-account-key.json` |
//! | `STORE_BACKEND` / `LOCAL_STORE_ROOT` | `gcp` / `./data` |
//! | `VISION_BACKEND` / `OLLAMA_BASE` | `vertex` / `http://localhost:11434` |
//! | `AI_TIMEOUT_SECS` | `60` |
//! | `RATE_LIMIT_BACKEND` / `REDIS_URL` | `memory` / `redis://localhost:6379` |
//! | `GLOBAL_RATE_LIMIT_ENABLED` | `false` |
//! | `GLOBAL_RATE_LIMIT_REQUESTS` / `GLOBAL_RATE_LIMIT_PERIOD_SECS` | `100` / `60` |
//! | `MAX_BODY_BYTES` | `65536` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gestion_core::{defaults, CredentialMode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Gcp,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionBackendKind {
    Vertex,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Redis,
}

/// Process-wide ceiling enforced by the governor middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRateLimit {
    pub requests: u32,
    pub period: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub project_id: String,
    pub location: String,
    pub vision_model: String,
    pub storage_bucket: String,
    pub storage_path_field: String,
    pub credentials_mode: CredentialMode,
    pub key_file: PathBuf,
    pub store_backend: StoreBackend,
    pub local_store_root: PathBuf,
    pub vision_backend: VisionBackendKind,
    pub ollama_base: String,
    pub ai_timeout: Duration,
    pub rate_limit_backend: RateLimitBackend,
    pub redis_url: String,
    pub global_rate_limit: Option<GlobalRateLimit>,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let credentials_mode = match get("CREDENTIALS_MODE").as_deref() {
            None | Some("ambient") => CredentialMode::Ambient,
            Some("key-file") => CredentialMode::KeyFile,
            Some(other) => return Err(invalid("CREDENTIALS_MODE", other, "expected key-file or ambient")),
        };

        let store_backend = match get("STORE_BACKEND").as_deref() {
            None | Some("gcp") => StoreBackend::Gcp,
            Some("local") => StoreBackend::Local,
            Some(other) => return Err(invalid("STORE_BACKEND", other, "expected gcp or local")),
        };

        let vision_backend = match get("VISION_BACKEND").as_deref() {
            None | Some("vertex") => VisionBackendKind::Vertex,
            Some("ollama") => VisionBackendKind::Ollama,
            Some(other) => return Err(invalid("VISION_BACKEND", other, "expected vertex or ollama")),
        };

        let rate_limit_backend = match get("RATE_LIMIT_BACKEND").as_deref() {
            None | Some("memory") => RateLimitBackend::Memory,
            Some("redis") => RateLimitBackend::Redis,
            Some(other) => {
                return Err(invalid("RATE_LIMIT_BACKEND", other, "expected memory or redis"))
            }
        };

        let global_enabled = parse_bool("GLOBAL_RATE_LIMIT_ENABLED", get("GLOBAL_RATE_LIMIT_ENABLED"))?;
        let global_rate_limit = if global_enabled {
            let requests: u32 = parse_or("GLOBAL_RATE_LIMIT_REQUESTS", get("GLOBAL_RATE_LIMIT_REQUESTS"), 100)?;
            let period_secs: u64 =
                parse_or("GLOBAL_RATE_LIMIT_PERIOD_SECS", get("GLOBAL_RATE_LIMIT_PERIOD_SECS"), 60)?;
            if requests == 0 || period_secs == 0 {
                return Err(invalid(
                    "GLOBAL_RATE_LIMIT_REQUESTS",
                    &format!("{}/{}s", requests, period_secs),
                    "requests and period must be positive",
                ));
            }
            Some(GlobalRateLimit {
                requests,
                period: Duration::from_secs(period_secs),
            })
        } else {
            None
        };

        let ai_timeout_secs: u64 =
            parse_or("AI_TIMEOUT_SECS", get("AI_TIMEOUT_SECS"), defaults::AI_TIMEOUT_SECS)?;
        if ai_timeout_secs == 0 {
            return Err(invalid("AI_TIMEOUT_SECS", "0", "must be positive"));
        }

        Ok(Self {
            host: string("HOST", "0.0.0.0"),
            port: parse_or("PORT", get("PORT"), defaults::SERVER_PORT)?,
            project_id: string("GCP_PROJECT_ID", defaults::GCP_PROJECT_ID),
            location: string("GCP_LOCATION", defaults::GCP_LOCATION),
            vision_model: string("VISION_MODEL", defaults::VISION_MODEL),
            storage_bucket: string("STORAGE_BUCKET", defaults::STORAGE_BUCKET),
            storage_path_field: string("STORAGE_PATH_FIELD", defaults::STORAGE_PATH_FIELD),
            credentials_mode,
            key_file: PathBuf::from(string("GOOGLE_APPLICATION_CREDENTIALS", defaults::KEY_FILE)),
            store_backend,
            local_store_root: PathBuf::from(string("LOCAL_STORE_ROOT", "./data")),
            vision_backend,
            ollama_base: string("OLLAMA_BASE", defaults::OLLAMA_URL),
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            rate_limit_backend,
            redis_url: string("REDIS_URL", "redis://localhost:6379"),
            global_rate_limit,
            max_body_bytes: parse_or("MAX_BODY_BYTES", get("MAX_BODY_BYTES"), defaults::MAX_BODY_BYTES)?,
        })
    }

    /// Error bodies carry a `stack` field outside production credentials.
    pub fn expose_error_details(&self) -> bool {
        !self.credentials_mode.is_production()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(invalid(key, other, "expected true or false")),
    }
}
