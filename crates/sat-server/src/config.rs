//! Server configuration
//!
//! One TOML file per tool. Every field has a default, so an empty file (or
//! no file at all) yields a working server on `127.0.0.1:8000` that serves
//! the current directory and keeps its data under `./data`.
//!
//! ```toml
//! tool = "circleboard"
//! bind = "127.0.0.1:8010"
//! static_root = "tools/circleboard"
//! data_dir = "data/circleboard"
//!
//! [indicators]
//! format = "jsonl"
//! log = "indicators.jsonl"
//! document = "indicators.txt"
//! fallback_dir = "exports"
//!
//! [evidence]
//! file = "evidence.json"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        #[source]
        /// Underlying failure
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        #[source]
        /// Parser failure
        source: toml::de::Error,
    },
}

/// How `POST /api/save-indicators` interprets its body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorsFormat {
    /// JSON record, normalized and appended to the log
    #[default]
    Jsonl,
    /// Raw bulleted text, merged into the document
    Bulleted,
}

/// Indicator storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorsConfig {
    /// Body format of the save endpoint
    pub format: IndicatorsFormat,
    /// Append-only log
    pub log: PathBuf,
    /// Bulleted document refreshed from the log
    pub document: PathBuf,
    /// Where records go when the log cannot be written
    pub fallback_dir: Option<PathBuf>,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            format: IndicatorsFormat::Jsonl,
            log: PathBuf::from("indicators.jsonl"),
            document: PathBuf::from("indicators.txt"),
            fallback_dir: None,
        }
    }
}

/// Board tree storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidenceConfig {
    /// Tree file, replaced wholesale on save
    pub file: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("evidence.json"),
        }
    }
}

/// Per-tool server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Tool name, used in logs
    pub tool: String,
    /// Listen address
    pub bind: SocketAddr,
    /// Root for static assets
    pub static_root: PathBuf,
    /// Root for data files; relative data paths resolve here
    pub data_dir: PathBuf,
    /// Request body cap in bytes
    pub max_body_bytes: u64,
    /// Indicator storage
    pub indicators: IndicatorsConfig,
    /// Board tree storage
    pub evidence: EvidenceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tool: "sat".to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            static_root: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            indicators: IndicatorsConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

/// Command-line overrides, applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--tool`
    pub tool: Option<String>,
    /// `--bind`
    pub bind: Option<SocketAddr>,
    /// `--root`
    pub static_root: Option<PathBuf>,
    /// `--data`
    pub data_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration text
    ///
    /// # Errors
    /// `ConfigError::Parse` on invalid TOML or unknown keys.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file
    ///
    /// # Errors
    /// Read or parse failure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(tool) = overrides.tool {
            self.tool = tool;
        }
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(root) = overrides.static_root {
            self.static_root = root;
        }
        if let Some(data) = overrides.data_dir {
            self.data_dir = data;
        }
        self
    }

    /// Resolve a data path: absolute paths stay, relative ones go under `data_dir`
    #[must_use]
    pub fn data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Resolved indicator log path
    #[must_use]
    pub fn indicators_log(&self) -> PathBuf {
        self.data_path(&self.indicators.log)
    }

    /// Resolved bulleted document path
    #[must_use]
    pub fn indicators_document(&self) -> PathBuf {
        self.data_path(&self.indicators.document)
    }

    /// Resolved fallback export directory, if configured
    #[must_use]
    pub fn fallback_dir(&self) -> Option<PathBuf> {
        self.indicators.fallback_dir.as_deref().map(|p| self.data_path(p))
    }

    /// Resolved evidence tree path
    #[must_use]
    pub fn evidence_file(&self) -> PathBuf {
        self.data_path(&self.evidence.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ServerConfig::from_toml("", Path::new("x.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.indicators_log(), PathBuf::from("data/indicators.jsonl"));
    }

    #[test]
    fn example_config_parses() {
        let text = include_str!("../config/circleboard.toml");
        let config = ServerConfig::from_toml(text, Path::new("circleboard.toml")).unwrap();
        assert_eq!(config.tool, "circleboard");
        assert_eq!(config.indicators.format, IndicatorsFormat::Jsonl);
        assert_eq!(
            config.fallback_dir(),
            Some(PathBuf::from("data/circleboard/exports"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ServerConfig::from_toml("prot = 80", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn absolute_data_paths_are_kept() {
        let mut config = ServerConfig::default();
        config.evidence.file = std::env::temp_dir().join("evidence.json");
        assert_eq!(config.evidence_file(), std::env::temp_dir().join("evidence.json"));
    }

    #[test]
    fn overrides_win() {
        let config = ServerConfig::default().with_overrides(ConfigOverrides {
            bind: Some("0.0.0.0:9000".parse().unwrap()),
            data_dir: Some(PathBuf::from("/srv/data")),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.static_root, PathBuf::from("."));
    }
}
