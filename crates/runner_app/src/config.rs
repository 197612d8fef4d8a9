use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use runner_core::{ControllerConfig, IngestOptions, DEFAULT_DEBUG_PARAM, DEFAULT_STEP_DELAY_MS};
use runner_engine::NavigateSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

const DEFAULT_STORE_DIR: &str = ".nav-runner";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings of one `nav-runner` process. Every field may be omitted from the
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub store_dir: PathBuf,
    pub step_delay_ms: u64,
    pub debug_param: String,
    pub url_column: String,
    pub status_column: String,
    pub status_sentinel: String,
    pub log: LogDestination,
    pub verbose: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let ingest = IngestOptions::default();
        let navigate = NavigateSettings::default();
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            debug_param: DEFAULT_DEBUG_PARAM.to_string(),
            url_column: ingest.url_column,
            status_column: ingest.status_column,
            status_sentinel: ingest.status_sentinel,
            log: LogDestination::default(),
            verbose: false,
            connect_timeout_secs: navigate.connect_timeout.as_secs(),
            request_timeout_secs: navigate.request_timeout.as_secs(),
            redirect_limit: navigate.redirect_limit,
        }
    }
}

impl RunnerConfig {
    /// Reads `path` when given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debug_param.trim().is_empty() {
            return Err(ConfigError::Invalid("debug_param must not be empty".into()));
        }
        if self.url_column.trim().is_empty() || self.status_column.trim().is_empty() {
            return Err(ConfigError::Invalid("column labels must not be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            step_delay_ms: self.step_delay_ms,
            debug_param: self.debug_param.trim().to_string(),
            ingest: IngestOptions {
                url_column: self.url_column.clone(),
                status_column: self.status_column.clone(),
                status_sentinel: self.status_sentinel.clone(),
            },
        }
    }

    pub fn navigate(&self) -> NavigateSettings {
        NavigateSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            ..NavigateSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = RunnerConfig::parse("(step_delay_ms: 2500, log: both)").unwrap();
        assert_eq!(config.step_delay_ms, 2500);
        assert_eq!(config.log, LogDestination::Both);
        assert_eq!(config.debug_param, "gtm_debug");
        assert_eq!(config.store_dir, PathBuf::from(".nav-runner"));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        assert!(RunnerConfig::parse("(step_delay: 1)").is_err());
    }

    #[test]
    fn blank_debug_param_is_rejected() {
        let config = RunnerConfig {
            debug_param: "  ".into(),
            ..RunnerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn controller_config_carries_overrides() {
        let config = RunnerConfig {
            step_delay_ms: 1000,
            status_sentinel: "missing".into(),
            ..RunnerConfig::default()
        };
        let controller = config.controller();
        assert_eq!(controller.step_delay_ms, 1000);
        assert_eq!(controller.ingest.status_sentinel, "missing");
        assert_eq!(controller.countdown_seconds(), 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RunnerConfig::load(Some(Path::new("/nonexistent/nav-runner.ron"))).unwrap_err();
        assert!(err.to_string().contains("nav-runner.ron"));
    }
}
