//! TOML configuration parsing and validation.
//!
//! The configuration is an explicit value handed to every component at
//! construction time. Nothing reads the environment after startup except
//! [`UpstreamConfig::resolve_api_key`], which is called once when the fetch
//! client is built.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Settings for the generative-text completion API.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline credential. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of data rows requested per subject.
    #[serde(default = "default_rows")]
    pub rows: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            rows: default_rows(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}
fn default_model() -> String {
    "sonar-pro".to_string()
}
fn default_api_key_env() -> String {
    "PERPLEXITY_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_rows() -> usize {
    10
}

impl UpstreamConfig {
    /// Returns the API credential, failing when neither the inline key nor
    /// the configured environment variable holds a non-empty value.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !clean_secret(&key).is_empty() => Ok(clean_secret(&key)),
            _ => Err(ConfigError::MissingCredential(self.api_key_env.clone())),
        }
    }
}

/// Strips whitespace and one pair of surrounding quotes, which `.env`
/// files frequently leave around values.
fn clean_secret(raw: &str) -> String {
    let s = raw.trim();
    let unquoted = s
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .unwrap_or(s);
    unquoted.trim().to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Default `limit` for `GET /entities` when the query omits it.
    #[serde(default = "default_page_limit")]
    pub page_limit: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
            page_limit: default_page_limit(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_page_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Investors queried by `radar sync` when no subject is given.
    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            subjects: default_subjects(),
        }
    }
}

fn default_subjects() -> Vec<String> {
    [
        "Kaszek",
        "Monashees",
        "Softbank LatAm",
        "Astella Investimentos",
        "Valor Capital Group",
        "Bossanova",
        "Angel Ventures",
        "Crescera Capital",
        "QED Investors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// How candidate names map onto persisted identities.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// Exact, case- and whitespace-sensitive name equality.
    #[default]
    Exact,
    /// Case-folded, whitespace-collapsed name equality. Names are stored in
    /// their canonical form.
    Normalized,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub identity: IdentityMode,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// A configuration pointing at the given database with every other
    /// section at its default.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            upstream: UpstreamConfig::default(),
            server: ServerConfig::default(),
            ingest: IngestConfig::default(),
            merge: MergeConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.upstream.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "upstream.timeout_secs must be > 0".to_string(),
        ));
    }
    if config.upstream.rows == 0 {
        return Err(ConfigError::Invalid("upstream.rows must be > 0".to_string()));
    }
    if config.upstream.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "upstream.base_url must not be empty".to_string(),
        ));
    }
    if config.server.page_limit < 1 {
        return Err(ConfigError::Invalid(
            "server.page_limit must be >= 1".to_string(),
        ));
    }
    Ok(())
}
