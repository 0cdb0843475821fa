use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::calls::PAGINATION_CALLS;
use super::metrics::StoreMetrics;

/// Prefix marking locally generated record ids.
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "client:";

/// Root calls whose identifying argument is the record id itself.
pub const DEFAULT_NODE_ROOT_CALLS: &[&str] = &["node", "nodes"];

/// Configuration options supplied when creating a [`super::RecordStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Ids starting with this prefix are client ids and need a provenance path.
    pub client_id_prefix: String,
    /// Root calls that bypass the root-call memo.
    pub node_root_calls: Vec<String>,
    /// Call names ignored when computing a range's filter calls.
    pub pagination_calls: Vec<String>,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn StoreMetrics>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_owned(),
            node_root_calls: DEFAULT_NODE_ROOT_CALLS.iter().map(|s| (*s).to_owned()).collect(),
            pagination_calls: PAGINATION_CALLS.iter().map(|s| (*s).to_owned()).collect(),
            metrics: None,
        }
    }

    /// Sets the client id prefix.
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }

    /// Replaces the set of node root calls.
    pub fn node_root_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_root_calls = calls.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the set of pagination call names.
    pub fn pagination_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pagination_calls = calls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Parses options from the `[store]` table of a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::ParseInline { source })?;
        raw.into_options()
    }

    /// Loads options from `explicit`, or from [`default_config_path`] when no
    /// path is given. A missing file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        match path {
            Some(config_path) if config_path.exists() => read_file(&config_path)?.into_options(),
            _ => Ok(Self::new()),
        }
    }
}

/// Location of the per-user config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphcache").join("config.toml"))
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    store: RawStore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStore {
    client_id_prefix: Option<String>,
    node_root_calls: Option<Vec<String>>,
    pagination_calls: Option<Vec<String>>,
}

impl RawConfig {
    fn into_options(self) -> Result<StoreOptions, ConfigError> {
        let mut opts = StoreOptions::new();
        if let Some(prefix) = self.store.client_id_prefix {
            if prefix.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "client_id_prefix",
                    reason: "must not be empty",
                });
            }
            opts.client_id_prefix = prefix;
        }
        if let Some(calls) = self.store.node_root_calls {
            opts.node_root_calls = calls;
        }
        if let Some(calls) = self.store.pagination_calls {
            opts.pagination_calls = calls;
        }
        Ok(opts)
    }
}

/// Errors raised while loading [`StoreOptions`] from TOML.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read store config {}: {source}", path.display())]
    Read {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for the `[store]` table.
    #[error("failed to parse store config {}: {source}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// TOML decoding error.
        source: toml::de::Error,
    },
    /// An in-memory config document is not valid.
    #[error("failed to parse store config: {source}")]
    ParseInline {
        /// TOML decoding error.
        source: toml::de::Error,
    },
    /// A value parsed but is not acceptable.
    #[error("store config `{field}` {reason}")]
    Invalid {
        /// Key under `[store]`.
        field: &'static str,
        /// What is wrong with the value.
        reason: &'static str,
    },
}
