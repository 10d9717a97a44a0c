//! Run configuration

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("workers must be at least 1")]
    NoWorkers,
    #[error("provider name {0:?} is not usable as a directory name")]
    InvalidProviderName(String),
    #[error("duplicate provider name {0:?}")]
    DuplicateProviderName(String),
}

/// Configuration of a single aggregator run, loaded from a TOML file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Width of the provider worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Working folder the mirror directories are created in.
    pub folder: PathBuf,

    /// Web root the aggregate tree is published under.
    pub web: PathBuf,

    /// Interim runs only re-fetch documents updated within this window.
    /// When unset, an interim run degrades to a full pass.
    #[serde(default)]
    pub interim_window_days: Option<u64>,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Mirror name, also the published link name.
    pub name: String,

    /// Domain (or full origin) the provider metadata is discovered from.
    pub domain: String,
}

const fn default_workers() -> usize {
    10
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Provider names become directory and link names, check them early.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            let name = provider.name.as_str();
            if name.is_empty()
                || name.starts_with('.')
                || name.contains(['/', '\\'])
                || name.contains("..")
            {
                return Err(ConfigError::InvalidProviderName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateProviderName(name.to_string()));
            }
        }

        Ok(())
    }
}
