//! Process-wide configuration for OpenBridge.
//!
//! A single [`Settings`] struct is the one place every environment variable
//! is read, loaded with plain environment variables rather than a per-user
//! config file, since OpenBridge has no per-user config directory. An
//! optional `.env` loader (a minimal hand-rolled parser) merges file-provided
//! values under existing-environment precedence before [`Settings::from_env`]
//! runs.

mod dotenv;

use std::path::Path;
use thiserror::Error;

/// Applies a project `.env` file (if present in `override_dir`, or the
/// current directory) to the process environment. Existing environment
/// variables always win; `.env` only fills gaps. Safe to call even when no
/// `.env` file exists.
pub fn apply_dotenv(override_dir: Option<&Path>) -> std::io::Result<()> {
    let map = dotenv::load_env_map(override_dir)?;
    for (key, value) in map {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Memory,
    Remote,
    Disabled,
}

impl std::str::FromStr for StateBackend {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "remote" => Ok(Self::Remote),
            "disabled" => Ok(Self::Disabled),
            other => Err(SettingsError::InvalidEnum {
                key: "STATE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidEnum { key: &'static str, value: String },
    #[error("invalid integer for {key}: {source}")]
    InvalidInt {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid float for {key}: {source}")]
    InvalidFloat {
        key: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("TLS_CERTFILE and TLS_KEYFILE must both be set or both be absent")]
    TlsIncomplete,
    #[error("TLS file does not exist: {0}")]
    TlsFileMissing(String),
}

/// Every environment-variable knob from the external-interfaces contract,
/// loaded once at process start via [`Settings::from_env`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream_api_key: String,
    pub upstream_base_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,

    pub tls_certfile: Option<String>,
    pub tls_keyfile: Option<String>,
    pub tls_keyfile_password: Option<String>,

    pub state_backend: StateBackend,
    pub remote_state_url: Option<String>,
    pub state_key_prefix: String,

    pub client_api_key: Option<String>,

    pub request_timeout_s: u64,
    pub retry_max_attempts: u32,
    pub retry_max_seconds: u64,
    pub retry_backoff: f64,

    pub degrade_fields: Vec<String>,
    pub max_tokens_buffer: u32,
    pub memory_ttl_seconds: u64,
    pub memory_max_entries: Option<usize>,
    pub model_map_path: Option<String>,
}

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8787;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STATE_KEY_PREFIX: &str = "openbridge";
const DEFAULT_REQUEST_TIMEOUT_S: u64 = 600;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_MAX_SECONDS: u64 = 30;
const DEFAULT_RETRY_BACKOFF: f64 = 1.0;
const DEFAULT_MAX_TOKENS_BUFFER: u32 = 0;
const DEFAULT_MEMORY_TTL_SECONDS: u64 = 24 * 60 * 60;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_u64(key: &'static str, default: u64) -> Result<u64, SettingsError> {
    match env_var(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|source| SettingsError::InvalidInt { key, source }),
    }
}

fn parse_u32(key: &'static str, default: u32) -> Result<u32, SettingsError> {
    match env_var(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|source| SettingsError::InvalidInt { key, source }),
    }
}

fn parse_f64(key: &'static str, default: f64) -> Result<f64, SettingsError> {
    match env_var(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|source| SettingsError::InvalidFloat { key, source }),
    }
}

impl Settings {
    /// Reads and validates every configuration knob from the process
    /// environment. Callers that want `.env` support should call
    /// [`apply_dotenv`] first.
    pub fn from_env() -> Result<Self, SettingsError> {
        let upstream_api_key =
            env_var("UPSTREAM_API_KEY").ok_or(SettingsError::Missing("UPSTREAM_API_KEY"))?;

        let tls_certfile = env_var("TLS_CERTFILE");
        let tls_keyfile = env_var("TLS_KEYFILE");
        match (&tls_certfile, &tls_keyfile) {
            (Some(_), None) | (None, Some(_)) => return Err(SettingsError::TlsIncomplete),
            (Some(cert), Some(key)) => {
                if !Path::new(cert).exists() {
                    return Err(SettingsError::TlsFileMissing(cert.clone()));
                }
                if !Path::new(key).exists() {
                    return Err(SettingsError::TlsFileMissing(key.clone()));
                }
            }
            (None, None) => {}
        }

        let state_backend = match env_var("STATE_BACKEND") {
            Some(v) => v.parse()?,
            None => StateBackend::Memory,
        };

        let degrade_fields = env_var("DEGRADE_FIELDS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let memory_max_entries = match env_var("MEMORY_MAX_ENTRIES") {
            None => None,
            Some(v) => Some(
                v.parse()
                    .map_err(|source| SettingsError::InvalidInt {
                        key: "MEMORY_MAX_ENTRIES",
                        source,
                    })?,
            ),
        };

        Ok(Self {
            upstream_api_key,
            upstream_base_url: env_var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string()),
            host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: match env_var("PORT") {
                None => DEFAULT_PORT,
                Some(v) => v
                    .parse()
                    .map_err(|source| SettingsError::InvalidInt { key: "PORT", source })?,
            },
            log_level: env_var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),

            tls_certfile,
            tls_keyfile,
            tls_keyfile_password: env_var("TLS_KEYFILE_PASSWORD"),

            state_backend,
            remote_state_url: env_var("REMOTE_STATE_URL"),
            state_key_prefix: env_var("STATE_KEY_PREFIX")
                .unwrap_or_else(|| DEFAULT_STATE_KEY_PREFIX.to_string()),

            client_api_key: env_var("CLIENT_API_KEY"),

            request_timeout_s: parse_u64("REQUEST_TIMEOUT_S", DEFAULT_REQUEST_TIMEOUT_S)?,
            retry_max_attempts: parse_u32("RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS)?,
            retry_max_seconds: parse_u64("RETRY_MAX_SECONDS", DEFAULT_RETRY_MAX_SECONDS)?,
            retry_backoff: parse_f64("RETRY_BACKOFF", DEFAULT_RETRY_BACKOFF)?,

            degrade_fields,
            max_tokens_buffer: parse_u32("MAX_TOKENS_BUFFER", DEFAULT_MAX_TOKENS_BUFFER)?,
            memory_ttl_seconds: parse_u64("MEMORY_TTL_SECONDS", DEFAULT_MEMORY_TTL_SECONDS)?,
            memory_max_entries,
            model_map_path: env_var("MODEL_MAP_PATH"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Settings::from_env reads process-global env; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "UPSTREAM_API_KEY",
            "UPSTREAM_BASE_URL",
            "HOST",
            "PORT",
            "LOG_LEVEL",
            "TLS_CERTFILE",
            "TLS_KEYFILE",
            "TLS_KEYFILE_PASSWORD",
            "STATE_BACKEND",
            "REMOTE_STATE_URL",
            "STATE_KEY_PREFIX",
            "CLIENT_API_KEY",
            "REQUEST_TIMEOUT_S",
            "RETRY_MAX_ATTEMPTS",
            "RETRY_MAX_SECONDS",
            "RETRY_BACKOFF",
            "DEGRADE_FIELDS",
            "MAX_TOKENS_BUFFER",
            "MEMORY_TTL_SECONDS",
            "MEMORY_MAX_ENTRIES",
            "MODEL_MAP_PATH",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_upstream_api_key_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        assert!(matches!(
            Settings::from_env(),
            Err(SettingsError::Missing("UPSTREAM_API_KEY"))
        ));
    }

    #[test]
    fn defaults_apply_when_only_required_key_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UPSTREAM_API_KEY", "sk-test");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.upstream_base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.state_backend, StateBackend::Memory);
        assert!(settings.degrade_fields.is_empty());
        clear_all();
    }

    #[test]
    fn lone_tls_certfile_without_keyfile_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UPSTREAM_API_KEY", "sk-test");
        std::env::set_var("TLS_CERTFILE", "/nonexistent/cert.pem");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SettingsError::TlsIncomplete));
        clear_all();
    }

    #[test]
    fn tls_pair_must_both_exist_on_disk() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UPSTREAM_API_KEY", "sk-test");
        std::env::set_var("TLS_CERTFILE", "/nonexistent/cert.pem");
        std::env::set_var("TLS_KEYFILE", "/nonexistent/key.pem");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SettingsError::TlsFileMissing(_)));
        clear_all();
    }

    #[test]
    fn invalid_state_backend_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UPSTREAM_API_KEY", "sk-test");
        std::env::set_var("STATE_BACKEND", "bogus");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnum { .. }));
        clear_all();
    }

    #[test]
    fn degrade_fields_parses_comma_separated_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("UPSTREAM_API_KEY", "sk-test");
        std::env::set_var("DEGRADE_FIELDS", "verbosity, reasoning");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.degrade_fields, vec!["verbosity", "reasoning"]);
        clear_all();
    }
}
