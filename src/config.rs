//! CLI configuration, persisted as TOML.
//!
//! Looked up from `--config PATH`, else `akh-diag.toml` in the working
//! directory, else built-in defaults. Every field is optional in the file.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::explain::{ExplainConfig, Profile};
use crate::report::ReportConfig;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "akh-diag.toml";

/// Errors from loading or saving the configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(akh::config::read),
        help("Ensure the config file exists and is readable, or omit --config to use defaults.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(akh::config::parse),
        help("Check the TOML syntax. {message}")
    )]
    ConfigParse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(akh::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagConfig {
    /// Dataset file used when `--dataset` is not given. The bundled dataset is
    /// used when neither is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,
    /// Explanation profile used when `--profile` is not given.
    #[serde(default = "default_profile")]
    pub default_profile: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub explain: ExplainConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_profile() -> String {
    Profile::Client.as_str().into()
}
fn default_log_filter() -> String {
    "warn".into()
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            default_profile: default_profile(),
            log_filter: default_log_filter(),
            explain: ExplainConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl DiagConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ConfigWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::ConfigWrite {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `akh-diag.toml` in `dir` is used
    /// when present, and defaults when not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "using config file");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn profile(&self) -> Profile {
        Profile::parse(&self.default_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: DiagConfig = toml::from_str(
            r#"
            default_profile = "expert"

            [report]
            min_precision_pct = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(config.profile(), Profile::Expert);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.dataset, None);
        assert_eq!(config.explain, ExplainConfig::default());
        assert_eq!(config.report.min_coverage_pct, 70.0);
        assert_eq!(config.report.min_precision_pct, 90.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = DiagConfig {
            dataset: Some(PathBuf::from("data/knowledge/ev-ssb.json")),
            default_profile: "apprentice".into(),
            ..DiagConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(DiagConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            DiagConfig::discover(None, dir.path()).unwrap(),
            DiagConfig::default()
        );

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "log_filter = \"debug\"\n").unwrap();
        assert_eq!(DiagConfig::discover(None, dir.path()).unwrap().log_filter, "debug");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            DiagConfig::discover(Some(&missing), dir.path()),
            Err(ConfigError::ConfigRead { .. })
        ));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "default_profile = [").unwrap();
        assert!(matches!(
            DiagConfig::load(&path),
            Err(ConfigError::ConfigParse { .. })
        ));
    }
}
