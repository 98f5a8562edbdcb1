use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Settings for the external model service (OpenAI-compatible API).
///
/// Model identifiers are configuration, not part of any core contract.
/// The API key is read from the `OPENAI_API_KEY` environment variable,
/// never from this file.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            vision_model: default_vision_model(),
            transcription_model: default_transcription_model(),
            timeout_secs: default_model_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_vision_model() -> String {
    "gpt-4o".to_string()
}
fn default_transcription_model() -> String {
    "whisper-1".to_string()
}
fn default_model_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_embedding_max_retries(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_embedding_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum results returned by a search.
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
    /// Vector search fetches `limit × vector_pool_factor` candidates
    /// before truncating.
    #[serde(default = "default_pool_factor")]
    pub vector_pool_factor: i64,
    /// Documents retrieved as context for each chat turn.
    #[serde(default = "default_chat_top_k")]
    pub chat_top_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            vector_pool_factor: default_pool_factor(),
            chat_top_k: default_chat_top_k(),
        }
    }
}

fn default_final_limit() -> i64 {
    12
}
fn default_pool_factor() -> i64 {
    8
}
fn default_chat_top_k() -> i64 {
    3
}

impl Config {
    /// Minimal config for tests and commands that only need a database.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            model: ModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.retrieval.chat_top_k < 1 {
        anyhow::bail!("retrieval.chat_top_k must be >= 1");
    }

    if !(4..=20).contains(&config.retrieval.vector_pool_factor) {
        anyhow::bail!("retrieval.vector_pool_factor must be in [4, 20]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let f = write_config("[db]\npath = \"/tmp/recall.sqlite\"\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
        assert_eq!(config.embedding.dims, 1536);
        assert_eq!(config.retrieval.chat_top_k, 3);
    }

    #[test]
    fn test_rejects_zero_dims() {
        let f = write_config("[db]\npath = \"/tmp/recall.sqlite\"\n\n[embedding]\ndims = 0\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_pool_factor_out_of_range() {
        let f = write_config(
            "[db]\npath = \"/tmp/recall.sqlite\"\n\n[retrieval]\nvector_pool_factor = 50\n",
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("vector_pool_factor"));
    }
}
