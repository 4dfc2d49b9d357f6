// telemetry-gate-config/src/lib.rs
// ============================================================================
// Module: Telemetry Gate Config Library
// Description: Optional harness-wide TOML configuration, plus servers.csv
//              loading for interpolation.
// Purpose: Single source of truth for telemetry-gate.toml and servers.csv
//          semantics.
// Dependencies: telemetry-gate-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `telemetry-gate-config` loads the optional `telemetry-gate.toml` harness
//! configuration file and the `servers.csv` interpolation table. Both are
//! fail-closed: malformed input is rejected rather than partially accepted.

pub mod config;
pub mod servers;

pub use config::ConfigError;
pub use config::HarnessConfig;
pub use config::PathsConfig;
pub use config::RunnerConfig;
pub use config::TelemetryConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::load_config;
pub use config::override_or;
pub use servers::ServerTableError;
pub use servers::load_servers_csv;
pub use servers::parse_servers_csv;
