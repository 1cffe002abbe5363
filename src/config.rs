//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/recall.sqlite"
//!
//! [archive]
//! root = "~/.claude/projects"
//! pattern = "*.jsonl"
//!
//! [embedding]
//! provider = "local"          # disabled | openai | ollama | local
//!
//! [oracle]
//! provider = "openai"         # disabled | openai (any OpenAI-compatible API)
//! base_url = "https://openrouter.ai/api/v1"
//!
//! [retrieval]
//! lexical_limit = 20
//! vector_limit = 20
//! rrf_k = 60
//!
//! [server]
//! bind = "127.0.0.1:8765"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use transcript_recall_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Directory holding one sub-directory per project.
    pub root: PathBuf,
    /// File-name glob for transcripts inside each project directory.
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    "*.jsonl".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
        }
    }
}

fn default_ingest_batch_size() -> usize {
    transcript_recall_core::indexer::DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_embedding_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_provider")]
    pub provider: String,
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_oracle_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_oracle_retries")]
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_oracle_provider(),
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            api_key_env: default_oracle_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_oracle_retries(),
        }
    }
}

fn default_oracle_provider() -> String {
    "disabled".to_string()
}
fn default_oracle_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_oracle_model() -> String {
    "google/gemini-2.0-flash-lite-001".to_string()
}
fn default_oracle_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_oracle_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub lexical_limit: i64,
    #[serde(default = "default_limit")]
    pub vector_limit: i64,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    #[serde(default = "default_format_limit")]
    pub format_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_limit: default_limit(),
            vector_limit: default_limit(),
            rrf_k: default_rrf_k(),
            format_limit: default_format_limit(),
        }
    }
}

fn default_limit() -> i64 {
    20
}
fn default_rrf_k() -> u32 {
    transcript_recall_core::fusion::DEFAULT_RRF_K
}
fn default_format_limit() -> usize {
    10
}

impl RetrievalConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            lexical_limit: self.lexical_limit,
            vector_limit: self.vector_limit,
            rrf_k: self.rrf_k,
            format_limit: self.format_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8765".to_string()
}

impl Config {
    /// All-defaults configuration with embeddings and the oracle disabled.
    pub fn minimal(db_path: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            archive: ArchiveConfig {
                root: archive_root.into(),
                pattern: default_pattern(),
            },
            ingest: IngestConfig::default(),
            embedding: EmbeddingConfig {
                provider: "disabled".to_string(),
                ..EmbeddingConfig::default()
            },
            oracle: OracleConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
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

pub fn validate(config: &Config) -> Result<()> {
    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }

    globset::Glob::new(&config.archive.pattern)
        .with_context(|| format!("Invalid archive.pattern: '{}'", config.archive.pattern))?;

    // Validate retrieval
    if config.retrieval.lexical_limit < 1 || config.retrieval.vector_limit < 1 {
        bail!("retrieval.lexical_limit and retrieval.vector_limit must be >= 1");
    }
    if config.retrieval.rrf_k < 1 {
        bail!("retrieval.rrf_k must be >= 1");
    }
    if config.retrieval.format_limit < 1 {
        bail!("retrieval.format_limit must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "disabled" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.oracle.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown oracle provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
