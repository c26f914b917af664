use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::schema::{DEFAULT_EMBEDDING_DIM, DEFAULT_ENTITY_TABLE, DEFAULT_RELATIONSHIP_TABLE};

/// Seconds after which a file-backed connection is reopened
pub const DEFAULT_POOL_RECYCLE_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string (`sqlite::memory:`, `sqlite://path`, or a bare path)
    pub database: String,
    pub entity_table: String,
    pub relationship_table: String,
    pub embedding_dim: usize,
    pub pool_recycle_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "relgraph.db".to_string(),
            entity_table: DEFAULT_ENTITY_TABLE.to_string(),
            relationship_table: DEFAULT_RELATIONSHIP_TABLE.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            pool_recycle_secs: DEFAULT_POOL_RECYCLE_SECS,
        }
    }
}

impl StoreConfig {
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn pool_recycle(&self) -> Option<Duration> {
        (self.pool_recycle_secs > 0).then(|| Duration::from_secs(self.pool_recycle_secs))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("relgraph.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
