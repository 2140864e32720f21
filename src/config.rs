use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::DEFAULT_TOP_K;

/// Environment variable overriding `[server].base_url`.
pub const BASE_URL_ENV: &str = "DQ_BASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Backend origin. The API lives under `/api`, health at `/health`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Maximum number of source tags under a chat answer.
    #[serde(default = "default_chat_source_limit")]
    pub chat_source_limit: usize,
    /// Delay before scrolling the transcript so layout can settle.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
    /// Preset example questions offered on the welcome screen.
    #[serde(default = "default_examples")]
    pub examples: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chat_source_limit: default_chat_source_limit(),
            scroll_settle_ms: default_scroll_settle_ms(),
            examples: default_examples(),
        }
    }
}

impl QueryConfig {
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}
fn default_chat_source_limit() -> usize {
    5
}
fn default_scroll_settle_ms() -> u64 {
    100
}
fn default_examples() -> Vec<String> {
    vec![
        "What documents are available?".to_string(),
        "Summarize the key points of the latest report.".to_string(),
        "What are the monthly sales figures by product?".to_string(),
        "List the main requirements described in the documents.".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// JSON file holding the persisted session token.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docquery")
        .join("storage.json")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds; `0` disables the timeout.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Apply environment overrides on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
        self
    }
}

/// Read and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.session.store_path = expand_home(&config.session.store_path);
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
/// Environment overrides are applied either way.
pub fn load_or_default(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        load_config(path)?
    } else {
        tracing::debug!("no config at {}; using defaults", path.display());
        Config::minimal()
    };
    let config = config.with_env_overrides();
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.server.base_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("server.base_url must start with http:// or https:// (got '{}')", url);
    }

    if config.query.top_k < 1 {
        anyhow::bail!("query.top_k must be >= 1");
    }

    if config.query.chat_source_limit < 1 {
        anyhow::bail!("query.chat_source_limit must be >= 1");
    }

    if config.query.examples.iter().any(|q| q.trim().is_empty()) {
        anyhow::bail!("query.examples must not contain empty questions");
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
