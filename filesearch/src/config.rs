use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{SearchError, SearchResult};

/// How invalid UTF-8 in file contents is handled during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Reject the file with a per-file encoding error
    #[default]
    FailFast,
    /// Replace invalid sequences and continue
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = SearchError;

    fn from_str(s: &str) -> SearchResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            other => Err(SearchError::config_error(format!(
                "unknown encoding mode '{other}' (expected failfast|lossy)"
            ))),
        }
    }
}

/// Settings for the search pipeline.
///
/// `worker_count` bounds parallelism; `buffering` bounds how far the feeder
/// can run ahead of the workers (and the workers ahead of the drain). The
/// two are independent knobs, both at least 1 by construction.
///
/// # Configuration Locations
///
/// Settings can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.filesearch.yaml` in the current directory
/// 3. Global `$HOME/.config/filesearch/config.yaml`
///
/// CLI flags take precedence over any file value; the merging behavior is
/// defined in `merge_with_cli`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Number of search workers (default: CPU cores)
    #[serde(default = "default_worker_count")]
    pub worker_count: NonZeroUsize,

    /// Capacity of the record and result channels (default: 10)
    #[serde(default = "default_buffering")]
    pub buffering: NonZeroUsize,

    /// How to handle invalid UTF-8 in file contents
    #[serde(default)]
    pub encoding: EncodingMode,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_buffering() -> NonZeroUsize {
    NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            buffering: default_buffering(),
            encoding: EncodingMode::default(),
            log_level: default_log_level(),
        }
    }
}

/// CLI-side overrides layered on top of file-based settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub worker_count: Option<NonZeroUsize>,
    pub buffering: Option<NonZeroUsize>,
    pub encoding: Option<EncodingMode>,
    pub log_level: Option<String>,
}

impl SearchSettings {
    /// Builds settings from raw integers, rejecting zero values.
    pub fn from_raw(worker_count: usize, buffering: usize) -> SearchResult<Self> {
        let worker_count = NonZeroUsize::new(worker_count)
            .ok_or_else(|| SearchError::config_error("worker count must be at least 1"))?;
        let buffering = NonZeroUsize::new(buffering)
            .ok_or_else(|| SearchError::config_error("buffering must be at least 1"))?;
        Ok(Self {
            worker_count,
            buffering,
            ..Default::default()
        })
    }

    /// Loads settings from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads settings from a specific file, falling back to the defaults
    /// chain when `config_path` is `None`.
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("filesearch/config.yaml")),
            // Local config
            Some(PathBuf::from(".filesearch.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            } else if config_path == Some(path.as_path()) {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SearchError::config_error(e.to_string()))
    }

    /// Merges CLI flag values over file-based settings. A `None` override
    /// leaves the file (or default) value in place.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(worker_count) = cli.worker_count {
            self.worker_count = worker_count;
        }
        if let Some(buffering) = cli.buffering {
            self.buffering = buffering;
        }
        if let Some(encoding) = cli.encoding {
            self.encoding = encoding;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }
}
