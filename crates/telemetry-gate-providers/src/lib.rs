// telemetry-gate-providers/src/lib.rs
// ============================================================================
// Module: Telemetry Gate Providers
// Description: Host-fact collection and a subprocess-backed telemetry tool,
//              implementing telemetry-gate-core's plugin-shaped interfaces.
// Purpose: Give the CLI concrete backends for HostInfoProvider/TelemetryTool
//          without the orchestration crates knowing about process spawning.
// Dependencies: telemetry-gate-core, telemetry-gate-config, serde_json
// ============================================================================

//! ## Overview
//! This crate ships the only two implementations of `telemetry-gate-core`'s
//! interfaces that the CLI needs for a live run: [`OsHostInfoProvider`]
//! (shells out to `hostname`/`ip`/`ifconfig`/`route`) and
//! [`SubprocessTelemetryTool`] (invokes an external telemetry agent binary
//! twice per session: once to prepare, once to fetch).

pub mod hostinfo;
pub mod tool;

pub use hostinfo::OsHostInfoProvider;
pub use tool::SubprocessTelemetryTool;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}
