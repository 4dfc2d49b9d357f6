// telemetry-gate-config/src/config.rs
// ============================================================================
// Module: Telemetry Gate Configuration
// Description: Loading and validation for the optional telemetry-gate.toml
//              harness configuration file.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from an optional TOML file with a hard size
//! limit. Every field also has a built-in default, so the harness runs with
//! sensible behavior when no file is present at all; CLI flags always win
//! over file values, field by field.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "telemetry-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TELEMETRY_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;

/// Errors surfaced while loading `telemetry-gate.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file exceeded [`MAX_CONFIG_FILE_SIZE`].
    #[error("config file {path} is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge {
        /// Path that was read.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit.
        limit: usize,
    },
    /// The file did not parse as valid TOML matching [`HarnessConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was read.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the atomics catalog.
    pub atomics: String,
    /// Root of the criteria tree.
    pub criteria: String,
    /// Root results directory for this harness invocation.
    pub results: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            atomics: "/opt/atomics".to_string(),
            criteria: "/opt/criteria".to_string(),
            results: "./results".to_string(),
        }
    }
}

/// `[runner]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Unprivileged user to drop to when running as root.
    pub default_user: String,
    /// Per-stage timeout for the `test` stage, in seconds.
    pub test_timeout_secs: u64,
    /// Per-stage timeout for the `prereq` stage, in seconds.
    pub prereq_timeout_secs: u64,
    /// Per-stage timeout for the `cleanup` stage, in seconds.
    pub cleanup_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_user: "nobody".to_string(),
            test_timeout_secs: 30,
            prereq_timeout_secs: 15,
            cleanup_timeout_secs: 15,
        }
    }
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Configured telemetry tool binary paths.
    pub tools: Vec<String>,
    /// Whether to pass `--clearcache` on the prepare pass.
    pub clear_cache: bool,
}

/// The full parsed (or defaulted) harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Catalog/criteria/results paths.
    pub paths: PathsConfig,
    /// Runner behavior.
    pub runner: RunnerConfig,
    /// Telemetry tool configuration.
    pub telemetry: TelemetryConfig,
}

/// Loads `telemetry-gate.toml` from `path`, or returns [`HarnessConfig::default`]
/// when `path` is `None` and the default filename does not exist in the
/// current directory. The file, when present, must fit in
/// [`MAX_CONFIG_FILE_SIZE`].
///
/// # Errors
///
/// Returns [`ConfigError`] when an explicitly configured path cannot be
/// read, is oversized, or fails to parse.
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
    let resolved = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = Path::new(DEFAULT_CONFIG_NAME);
            if default.exists() {
                Some(default.to_path_buf())
            } else {
                None
            }
        }
    };

    let Some(resolved) = resolved else {
        return Ok(HarnessConfig::default());
    };

    let metadata = fs::metadata(&resolved).map_err(|source| ConfigError::Read {
        path: resolved.display().to_string(),
        source,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE as u64 {
        return Err(ConfigError::TooLarge {
            path: resolved.display().to_string(),
            size: metadata.len(),
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    let contents = fs::read_to_string(&resolved).map_err(|source| ConfigError::Read {
        path: resolved.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: resolved.display().to_string(),
        source,
    })
}

/// Applies a CLI-supplied override to a config field, returning the CLI
/// value when present and the config value otherwise. CLI flags always win
/// over the config file.
#[must_use]
pub fn override_or<'a>(cli_value: Option<&'a str>, config_value: &'a str) -> &'a str {
    cli_value.unwrap_or(config_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_given() {
        let config = HarnessConfig::default();
        assert_eq!(config.paths.atomics, "/opt/atomics");
        assert_eq!(config.runner.test_timeout_secs, 30);
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let toml_text = "[paths]\natomics = \"/srv/atomics\"\n";
        let parsed: HarnessConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(parsed.paths.atomics, "/srv/atomics");
        assert_eq!(parsed.paths.criteria, "/opt/criteria");
    }

    #[test]
    fn cli_override_wins() {
        assert_eq!(override_or(Some("/cli/path"), "/config/path"), "/cli/path");
        assert_eq!(override_or(None, "/config/path"), "/config/path");
    }
}
