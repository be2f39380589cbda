//! Configuration management for quotedesk.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/quotedesk/config.json`
//! 2. Environment variable: `QUOTEDESK_CONFIG_CONTENT`
//! 3. Project config: `quotedesk.jsonc` or `quotedesk.json` in the working directory
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use crate::permission::{Principal, Role};
use quotedesk_util::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable holding inline config content.
pub const CONFIG_CONTENT_ENV: &str = "QUOTEDESK_CONFIG_CONTENT";

/// Default lock time-to-live in seconds.
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 300;

/// Default listen address for `serve`.
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// Get the variable substitution regex, compiling it once on first use.
fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// HTTP server settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Resource lock settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockConfig>,

    /// Version record storage settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Bearer tokens accepted by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on, e.g. `0.0.0.0:8080`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Lock configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Seconds before an unrefreshed lock expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON file per record.
    #[default]
    Json,
    /// Process memory, lost on exit.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StorageKind>,

    /// Base directory for the JSON backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn merge(mut self, other: Self) -> Self {
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.path.is_some() {
            self.path = other.path;
        }
        self
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token value to the principal it authenticates.
    ///
    /// Supports variable substitution: `{env:QUOTEDESK_ADMIN_TOKEN}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<HashMap<String, TokenConfig>>,
}

/// The principal a bearer token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub user: String,
    pub role: Role,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/quotedesk/`
    /// 2. `QUOTEDESK_CONFIG_CONTENT` environment variable
    /// 3. Project config from working directory
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        // 1. Load global config
        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "quotedesk.json", "quotedesk.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        // 2. Load from environment variable
        if let Ok(content) = std::env::var(CONFIG_CONTENT_ENV) {
            let loaded = Self::parse_jsonc(&content, "<env>")?;
            config = config.merge(loaded);
        }

        // 3. Load project config
        if let Some(dir) = project_dir {
            for name in &["quotedesk.jsonc", "quotedesk.json"] {
                let path = dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        config.validate()?;
        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix systems, prefers `~/.config/quotedesk` over the
    /// platform-specific directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("quotedesk");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        dirs::config_dir().map(|d| d.join("quotedesk"))
    }

    /// Get the data directory.
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("quotedesk"))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> CoreResult<()> {
        if self.lock.as_ref().and_then(|l| l.ttl_seconds) == Some(0) {
            return Err(ConfigError::Validation {
                message: "lock.ttl_seconds must be greater than zero".to_string(),
            }
            .into());
        }

        if let Some(address) = self.server.as_ref().and_then(|s| s.address.as_deref()) {
            if address.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::Validation {
                    message: format!("server.address is not a socket address: {address}"),
                }
                .into());
            }
        }

        if let Some(tokens) = self.auth.as_ref().and_then(|a| a.tokens.as_ref()) {
            if tokens.keys().any(|token| token.trim().is_empty()) {
                return Err(ConfigError::Validation {
                    message: "auth.tokens must not contain an empty token".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Lock time-to-live, falling back to the default.
    pub fn lock_ttl(&self) -> Duration {
        let seconds = self
            .lock
            .as_ref()
            .and_then(|l| l.ttl_seconds)
            .unwrap_or(DEFAULT_LOCK_TTL_SECONDS);
        Duration::from_secs(seconds)
    }

    /// Server listen address, falling back to the default.
    pub fn server_address(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.address.as_deref())
            .unwrap_or(DEFAULT_SERVER_ADDRESS)
    }

    /// Configured storage backend kind.
    pub fn storage_kind(&self) -> StorageKind {
        self.storage
            .as_ref()
            .and_then(|s| s.backend)
            .unwrap_or_default()
    }

    /// Base directory for JSON storage: the configured path, or the data directory.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage
            .as_ref()
            .and_then(|s| s.path.clone())
            .or_else(|| Self::data_dir().map(|d| d.join("data")))
    }

    /// Configured bearer tokens and the principals they authenticate.
    pub fn principals(&self) -> Vec<(String, Principal)> {
        self.auth
            .as_ref()
            .and_then(|a| a.tokens.as_ref())
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|(token, cfg)| (token.clone(), Principal::new(&cfg.user, cfg.role)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip JSON comments.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if c == '\\' && in_string {
                result.push(c);
                escape_next = true;
                continue;
            }

            if c == '"' {
                in_string = !in_string;
                result.push(c);
                continue;
            }

            if in_string {
                result.push(c);
                continue;
            }

            if c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push('\n');
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = ' ';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            // Keep line numbers stable for parse errors
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Substitute `{env:NAME}` and `{file:path}` references.
    ///
    /// File paths are resolved relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex().captures_iter(content) {
            let (Some(full_match), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };

            let replacement = match kind.as_str() {
                "env" => std::env::var(value.as_str()).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.as_str().to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value.as_str());
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }

        self.server = merge_option(self.server, other.server);
        self.lock = merge_option(self.lock, other.lock);
        self.storage = match (self.storage, other.storage) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        };
        self.auth = match (self.auth, other.auth) {
            (Some(base), Some(other)) => Some(AuthConfig {
                tokens: merge_hashmap(base.tokens, other.tokens),
            }),
            (base, None) => base,
            (None, other) => other,
        };

        self
    }
}

/// Merge two Option values.
fn merge_option<T>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (_, Some(o)) => Some(o),
        (b, None) => b,
    }
}

/// Merge two HashMaps.
fn merge_hashmap<K: std::hash::Hash + Eq, V>(
    base: Option<HashMap<K, V>>,
    other: Option<HashMap<K, V>>,
) -> Option<HashMap<K, V>> {
    match (base, other) {
        (Some(mut b), Some(o)) => {
            b.extend(o);
            Some(b)
        }
        (b, None) => b,
        (None, o) => o,
    }
}
