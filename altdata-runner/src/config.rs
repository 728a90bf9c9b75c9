//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default so an absent file, or a partial one, still
//! yields a usable configuration.

use altdata_core::data::{DatasetKind, VintageTieBreak, DEFAULT_BUCKET, DEFAULT_EXCHANGE_SUFFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown dataset '{0}' in [databases]")]
    UnknownDataset(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Snapshot directory.
    pub data_dir: PathBuf,
    /// Root of the Parquet extract drops read by the remote loader.
    pub extract_dir: PathBuf,
    /// Root of the local object store.
    pub object_store_root: PathBuf,
    pub bucket: String,
    pub tie_break: VintageTieBreak,
    /// Appended to tickers before asking the price provider.
    pub exchange_suffix: String,
    /// Database name per dataset slug, e.g. `pos_retailer = "AIQ_POS"`.
    pub databases: BTreeMap<String, String>,
    pub schema_name: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            extract_dir: PathBuf::from("extracts"),
            object_store_root: PathBuf::from("objects"),
            bucket: DEFAULT_BUCKET.to_string(),
            tie_break: VintageTieBreak::default(),
            exchange_suffix: DEFAULT_EXCHANGE_SUFFIX.to_string(),
            databases: BTreeMap::new(),
            schema_name: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for slug in self.databases.keys() {
            slug.parse::<DatasetKind>()
                .map_err(|_| ConfigError::UnknownDataset(slug.clone()))?;
        }
        Ok(())
    }

    /// Database for `kind`: explicit override, then config, then the
    /// dataset's environment variable.
    pub fn database_for(&self, kind: DatasetKind, override_name: Option<&str>) -> Option<String> {
        self.database_with_env(kind, override_name, |var| std::env::var(var).ok())
    }

    pub fn database_with_env(
        &self,
        kind: DatasetKind,
        override_name: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        override_name
            .map(str::to_string)
            .or_else(|| self.databases.get(kind.slug()).cloned())
            .or_else(|| env(kind.database_env_var()).filter(|v| !v.is_empty()))
    }
}
