//! TOML configuration.
//!
//! Every section is optional; a missing config file yields [`Config::default`].
//!
//! ```toml
//! [store]
//! path = "./data/docscan.sqlite"
//!
//! [analysis]
//! endpoint = "http://127.0.0.1:3000/api/chat"
//! model = "gpt-4o-mini"
//!
//! [similarity]
//! min_score = 30
//! top_k = 5
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub analysis: AnalysisConfig,
    pub ingest: IngestConfig,
    pub similarity: SimilarityConfig,
    pub view: ViewConfig,
    pub chat: ChatConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub documents_key: String,
    pub chat_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/docscan.sqlite"),
            documents_key: "docscan_documents".to_string(),
            chat_key: "docscan_chat".to_string(),
        }
    }
}

/// Settings for the tag/keyword extraction call.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// When false, every document goes through the local heuristic.
    pub enabled: bool,
    /// Completion endpoint (normally the local proxy started by `docscan serve`).
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Number of body characters included in the prompt.
    pub max_prompt_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://127.0.0.1:3000/api/chat".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            timeout_secs: 60,
            max_prompt_chars: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
    pub max_body_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*.html".to_string(), "**/*.htm".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_body_chars: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Neighbors must score strictly above this value.
    pub min_score: u8,
    pub top_k: usize,
    /// Score at which two documents count as near-duplicates in `stats`.
    pub duplicate_score: u8,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            min_score: 30,
            top_k: 5,
            duplicate_score: 70,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ViewConfig {
    pub graph_width: u32,
    pub graph_height: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            graph_width: 1200,
            graph_height: 800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub context_documents: usize,
    pub history_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            max_tokens: 800,
            context_documents: 10,
            history_messages: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind: String,
    pub upstream_url: String,
    /// Environment variable holding the upstream credential.
    pub api_key_env: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            upstream_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Load and validate the config at `path`.
///
/// A path that does not exist yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.analysis.max_tokens == 0 {
        bail!("analysis.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.analysis.temperature) {
        bail!("analysis.temperature must be in [0.0, 2.0]");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 2.0]");
    }
    if config.similarity.min_score > 100 {
        bail!("similarity.min_score must be <= 100");
    }
    if config.similarity.top_k == 0 {
        bail!("similarity.top_k must be >= 1");
    }
    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must not be empty");
    }
    if config.view.graph_width < 200 || config.view.graph_height < 200 {
        bail!("view.graph_width and view.graph_height must be >= 200");
    }
    Ok(())
}
