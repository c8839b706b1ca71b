// Configuration management module
// TOML settings resolved against an explicit project root

pub mod settings;


use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

pub use settings::{
    BackfillConfig, Config, ConfigError, EmbeddingConfig, HarvestConfig, IndexConfig,
    OllamaConfig, StoreConfig,
};

/// Project root used when none is given on the command line
#[inline]
pub fn default_root() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("smartsearch"))
        .ok_or(ConfigError::DirectoryError)
}

/// Resolve the root from an optional override and load its configuration
#[inline]
pub fn load_config(root: Option<&Path>) -> Result<Config> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => default_root()?,
    };
    Config::load(&root).with_context(|| format!("Failed to load config from {}", root.display()))
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Store:").bold().yellow());
    eprintln!("  Database: {}", style(&config.store.database).cyan());
    eprintln!(
        "  Path: {}",
        style(config.database_path().display()).cyan()
    );

    eprintln!("{}", style("Harvest:").bold().yellow());
    eprintln!(
        "  Base URL: {}",
        style(&config.harvest.default_base_url).cyan()
    );
    eprintln!("  Pages: {}", style(config.harvest.default_pages).cyan());
    eprintln!(
        "  Timeouts: page {}s, image {}s",
        style(config.harvest.page_timeout_seconds).cyan(),
        style(config.harvest.image_timeout_seconds).cyan()
    );
    eprintln!("  Images: {}", style(config.image_dir().display()).cyan());

    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!(
        "  Text model: {} (batch {})",
        style(&config.embeddings.ollama.model).cyan(),
        style(config.embeddings.text_batch_size).cyan()
    );
    eprintln!(
        "  Image model: {} (batch {})",
        style(&config.embeddings.image_model).cyan(),
        style(config.embeddings.image_batch_size).cyan()
    );
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!("  Output: {}", style(config.index_dir().display()).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
