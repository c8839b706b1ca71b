
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// Project root every relative path below is resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Database name; the SQLite file is `<root>/<database>.db`
    pub database: String,
    pub connect_timeout_seconds: u64,
    pub busy_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "SmartSearch".to_string(),
            connect_timeout_seconds: 10,
            busy_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    pub user_agent: String,
    pub default_base_url: String,
    pub default_pages: u32,
    pub page_timeout_seconds: u64,
    pub image_timeout_seconds: u64,
    /// Pause after a failed detail page before moving on
    pub failure_backoff_ms: u64,
    /// Where downloaded images land, relative to the project root
    pub image_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            default_base_url: "https://nowtechcenter.com/boutique/".to_string(),
            default_pages: 150,
            page_timeout_seconds: 15,
            image_timeout_seconds: 10,
            failure_backoff_ms: 2000,
            image_dir: PathBuf::from("dataset").join("ImagesTech"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub text_batch_size: usize,
    pub image_batch_size: usize,
    /// Secondary base for image paths stored relative to the dataset folder
    pub legacy_image_root: PathBuf,
    pub image_model: String,
    pub ollama: OllamaConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_batch_size: 64,
            image_batch_size: 16,
            legacy_image_root: PathBuf::from("dataset"),
            image_model: "clip-vit-b32".to_string(),
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            timeout_seconds: 60,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Where `<name>.index` and `<name>_mapping.json` are written, relative to the root
    pub output_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("index"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackfillConfig {
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid {0} batch size: {1} (must be between 1 and 1000)")]
    InvalidBatchSize(&'static str, usize),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid {0} timeout: {1} (must be between 1 and 300 seconds)")]
    InvalidTimeout(&'static str, u64),
    #[error("Invalid database name: {0:?} (letters, digits, '-' and '_' only)")]
    InvalidDatabaseName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `<root>/config.toml`, falling back to defaults when the file is absent
    #[inline]
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                root: root.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.root = root.to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create project root: {}", self.root.display())
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_store()?;
        self.validate_harvest()?;
        self.validate_embeddings()?;
        validate_batch_size("backfill", self.backfill.batch_size)?;
        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        let name = &self.store.database;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidDatabaseName(name.clone()));
        }

        validate_timeout("connect", self.store.connect_timeout_seconds)?;
        validate_timeout("busy", self.store.busy_timeout_seconds)?;
        Ok(())
    }

    fn validate_harvest(&self) -> Result<(), ConfigError> {
        let harvest = &self.harvest;
        validate_timeout("page", harvest.page_timeout_seconds)?;
        validate_timeout("image", harvest.image_timeout_seconds)?;
        Url::parse(&harvest.default_base_url)
            .map_err(|_| ConfigError::InvalidUrl(harvest.default_base_url.clone()))?;
        Ok(())
    }

    fn validate_embeddings(&self) -> Result<(), ConfigError> {
        let embeddings = &self.embeddings;
        validate_batch_size("text", embeddings.text_batch_size)?;
        validate_batch_size("image", embeddings.image_batch_size)?;

        if embeddings.image_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(embeddings.image_model.clone()));
        }

        embeddings.ollama.validate()
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.root.join(format!("{}.db", self.store.database))
    }

    /// Absolute directory downloaded images are written to
    #[inline]
    pub fn image_dir(&self) -> PathBuf {
        self.root.join(&self.harvest.image_dir)
    }

    #[inline]
    pub fn legacy_image_root(&self) -> PathBuf {
        self.root.join(&self.embeddings.legacy_image_root)
    }

    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.root.join(&self.index.output_dir)
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.embeddings.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        validate_timeout("ollama", self.timeout_seconds)?;

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        let url = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidUrl(url_str));
        }
        Ok(url)
    }
}

fn validate_batch_size(kind: &'static str, batch_size: usize) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > 1000 {
        return Err(ConfigError::InvalidBatchSize(kind, batch_size));
    }
    Ok(())
}

fn validate_timeout(kind: &'static str, seconds: u64) -> Result<(), ConfigError> {
    if !(1..=300).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(kind, seconds));
    }
    Ok(())
}
