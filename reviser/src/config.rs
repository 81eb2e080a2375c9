//! Service configuration
//!
//! Layering: built-in defaults -> TOML file -> `REVISER_*` environment
//! variables. `.env` files are picked up by [`load_env_file`] before
//! anything reads the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::revision::RevisionBudgets;

pub const DEFAULT_CONFIG_PATH: &str = "reviser/config/reviser.toml";
pub const CONFIG_PATH_ENV: &str = "REVISER_CONFIG_PATH";

const MIN_TIMEOUT_MS: u64 = 3_000;
const MAX_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Where and how to reach the AI revision endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiEndpointConfig {
    pub url: Option<String>,
    /// Name of the environment variable holding the bearer token
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AiEndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: None,
            timeout_ms: 60_000,
        }
    }
}

impl AiEndpointConfig {
    pub fn api_key(&self) -> Option<String> {
        let env_name = self.api_key_env.as_deref()?;
        match std::env::var(env_name) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                tracing::warn!(env = env_name, "AI endpoint API key variable is not set");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviserConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub ai: AiEndpointConfig,
    pub budgets: RevisionBudgets,
    /// Include per-attempt diagnostics in API responses
    pub expose_diagnostics: bool,
}

impl Default for ReviserConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            ai: AiEndpointConfig::default(),
            budgets: RevisionBudgets::default(),
            expose_diagnostics: false,
        }
    }
}

impl ReviserConfig {
    /// Load from the file named by `REVISER_CONFIG_PATH` (or the default
    /// path when it exists), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading reviser config");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&raw).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        Ok(config.normalized())
    }

    /// Apply `REVISER_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("REVISER_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(url) = lookup("REVISER_AI_ENDPOINT") {
            let url = url.trim();
            self.ai.url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(env_name) = lookup("REVISER_AI_API_KEY_ENV").filter(|v| !v.trim().is_empty()) {
            self.ai.api_key_env = Some(env_name.trim().to_string());
        }
        if let Some(raw) = lookup("REVISER_AI_TIMEOUT_MS") {
            self.ai.timeout_ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "REVISER_AI_TIMEOUT_MS".to_string(),
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = lookup("REVISER_EXPOSE_DIAGNOSTICS") {
            self.expose_diagnostics = raw != "0" && raw.to_lowercase() != "false";
        }

        *self = std::mem::take(self).normalized();
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.ai.timeout_ms = self.ai.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        self.budgets.initial.max_sections = self.budgets.initial.max_sections.max(1);
        self.budgets.escalated.max_sections = self.budgets.escalated.max_sections.max(1);
        self
    }
}

/// Load the nearest `.env` file from the working directory or its
/// ancestors. Returns the path that was loaded.
pub fn load_env_file() -> Option<PathBuf> {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return None;
        }
    };

    for dir in cwd.ancestors() {
        let candidate = dir.join(".env");
        if !candidate.exists() {
            continue;
        }
        return match dotenvy::from_path(&candidate) {
            Ok(()) => {
                tracing::info!(path = %candidate.display(), "Loaded environment from .env");
                Some(candidate)
            }
            Err(e) => {
                tracing::warn!(path = %candidate.display(), error = %e, "Failed to load .env file");
                None
            }
        };
    }

    tracing::debug!(cwd = %cwd.display(), "No .env file found; using process environment only");
    None
}
