//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File, FileFormat};
use std::path::Path;
use tracing::{debug, info};

use super::{global_config_path, Config};

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `CODEGRAPH_` and use double underscores
    /// for nested values. For example:
    /// - `CODEGRAPH_EMBEDDINGS__PROVIDER=openai`
    /// - `CODEGRAPH_INDEXER__MAX_CONCURRENCY=16`
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        if path.exists() {
            debug!(path = %path.display(), "Reading config file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        } else {
            debug!(path = %path.display(), "No config file, using defaults and environment");
        }

        builder = builder.add_source(
            Environment::with_prefix("CODEGRAPH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Conventional variables used by the OpenAI-compatible provider and Neo4j
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder = builder
                .set_default("embeddings.api_key", key)
                .map_err(|e| Error::config(format!("Failed to set OPENAI_API_KEY: {e}")))?;
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            builder = builder
                .set_default("storage.neo4j_password", password)
                .map_err(|e| Error::config(format!("Failed to set NEO4J_PASSWORD: {e}")))?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        let config: Config = config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        info!(
            path = %path.display(),
            graph_backend = %config.storage.graph_backend,
            vector_backend = %config.storage.vector_backend,
            embeddings_provider = %config.embeddings.provider,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`~/.codegraph/config.toml` or a custom path)
    /// 3. Environment variables (`CODEGRAPH_*`)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
