// telemetry-gate-providers/src/hostinfo.rs
// ============================================================================
// Module: OS Host-Info Provider
// Description: Collects ambient host facts by shelling out to `hostname`,
//              `ip`, and `whoami`, and parses the optional servers.csv table.
// Purpose: Concrete HostInfoProvider backend for a live harness run.
// Dependencies: telemetry-gate-core, telemetry-gate-config
// ============================================================================

//! ## Overview
//! Host facts are collected once per harness session and then treated as
//! read-only: the cache is populated once at startup and never refreshed.
//! Every lookup that fails (missing
//! command, unparsable output) leaves the corresponding [`HostInfo`] field
//! at its default empty string rather than aborting the whole collection —
//! callers do not need every fact to run a batch.

use std::process::Command;

use telemetry_gate_core::interfaces::HostInfoError;
use telemetry_gate_core::interfaces::HostInfoProvider;
use telemetry_gate_core::planner::HostInfo;
use telemetry_gate_core::planner::ServerTable;

/// Collects host facts via OS commands available on the target platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsHostInfoProvider;

impl OsHostInfoProvider {
    /// Creates a new provider. There is no configuration: the commands run
    /// are fixed by platform.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HostInfoProvider for OsHostInfoProvider {
    fn collect(&self) -> Result<HostInfo, HostInfoError> {
        let hostname = run_and_trim("hostname", &[]).unwrap_or_default();
        let username = run_and_trim("whoami", &[]).unwrap_or_default();
        let (ipaddr4, netif, macaddr, gateway, subnet_mask, subnet) = collect_network_facts();

        Ok(HostInfo {
            hostname,
            netif,
            ipaddr4: ipaddr4.clone(),
            ipaddr6: String::new(),
            ll_ipaddr6: String::new(),
            macaddr,
            ipaddr: ipaddr4,
            gateway,
            subnet_mask,
            subnet,
            username,
        })
    }

    fn load_servers(&self, path: Option<&str>) -> Result<ServerTable, HostInfoError> {
        let Some(path) = path else {
            return Ok(ServerTable::default());
        };
        telemetry_gate_config::load_servers_csv(std::path::Path::new(path))
            .map_err(|err| HostInfoError::CollectionFailed(err.to_string()))
    }
}

/// Runs `cmd args...` and returns trimmed stdout, or `None` on any failure
/// (missing binary, non-zero exit, non-UTF8 output).
fn run_and_trim(cmd: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(cmd).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Best-effort parse of `ip route get 1.1.1.1` / `ip addr` output into the
/// tuple `(ipaddr4, netif, macaddr, gateway, subnet_mask, subnet)`. Every
/// position defaults to an empty string when the command or parse fails.
fn collect_network_facts() -> (String, String, String, String, String, String) {
    let mut ipaddr4 = String::new();
    let mut netif = String::new();
    let mut gateway = String::new();

    if let Some(route_line) = run_and_trim("ip", &["route", "get", "1.1.1.1"]) {
        let tokens: Vec<&str> = route_line.split_whitespace().collect();
        for (idx, token) in tokens.iter().enumerate() {
            match *token {
                "dev" if idx + 1 < tokens.len() => netif = tokens[idx + 1].to_string(),
                "src" if idx + 1 < tokens.len() => ipaddr4 = tokens[idx + 1].to_string(),
                "via" if idx + 1 < tokens.len() => gateway = tokens[idx + 1].to_string(),
                _ => {}
            }
        }
    }

    let macaddr = if netif.is_empty() {
        String::new()
    } else {
        run_and_trim("cat", &[&format!("/sys/class/net/{netif}/address")]).unwrap_or_default()
    };

    (ipaddr4, netif, macaddr, gateway, String::new(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_yields_none_not_panic() {
        assert_eq!(run_and_trim("definitely-not-a-real-binary", &[]), None);
    }

    #[test]
    fn load_servers_with_no_path_is_empty() {
        let provider = OsHostInfoProvider::new();
        let table = provider.load_servers(None).unwrap();
        assert!(table.entries().is_empty());
    }
}
