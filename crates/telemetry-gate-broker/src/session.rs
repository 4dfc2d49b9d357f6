// telemetry-gate-broker/src/session.rs
// ============================================================================
// Module: Broker Session
// Description: Wires a batch's configured tool handles together: prepare
//              before any test, fetch plus paired-file read after the batch.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! [`BrokerSession`] is a small registry, keyed by suffix, that the rest
//! of the harness drives through two calls — `prepare_all` once at batch
//! start, `fetch_all` once at batch end — rather than reaching into
//! individual [`ToolHandle`]s itself.

use std::collections::BTreeMap;
use std::path::PathBuf;

use telemetry_gate_core::interfaces::TelemetryToolError;
use thiserror::Error;

use crate::parallel::PairedEvent;
use crate::parallel::ParallelReadError;
use crate::parallel::read_paired_events;
use crate::tool::ToolHandle;

/// Errors surfaced by a [`BrokerSession`].
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A tool's prepare or fetch subprocess call failed.
    #[error(transparent)]
    Tool(#[from] TelemetryToolError),
    /// A tool's paired output files were malformed or misaligned.
    #[error(transparent)]
    Parallel(#[from] ParallelReadError),
}

/// A batch's configured telemetry tools, addressable by suffix.
#[derive(Debug, Default)]
pub struct BrokerSession {
    tools: BTreeMap<String, ToolHandle>,
}

impl BrokerSession {
    /// Builds a session from `(tool_path, suffix)` pairs, all sharing
    /// `results_dir`, as parsed from a comma-delimited tool list.
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>, tool_specs: &[(String, String)]) -> Self {
        let results_dir = results_dir.into();
        let tools = tool_specs
            .iter()
            .map(|(path, suffix)| (suffix.clone(), ToolHandle::new(path.clone(), suffix.clone(), results_dir.clone())))
            .collect();
        Self {
            tools,
        }
    }

    /// Whether any tools are configured for this session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs `--prepare` for every configured tool, in suffix order. Stops
    /// at the first failure: a tool that cannot prepare should not be
    /// allowed to silently miss the whole batch's telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Tool`] from the first tool that fails to
    /// prepare.
    pub fn prepare_all(&self, clear_cache: bool) -> Result<(), BrokerError> {
        for tool in self.tools.values() {
            tool.prepare(clear_cache)?;
        }
        Ok(())
    }

    /// Runs `--fetch` for every configured tool over `[start_ns, end_ns)`,
    /// then reads and pairs each tool's two output files, returning the
    /// paired event stream keyed by suffix.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] from the first tool that fails to fetch or
    /// whose output files fail to parse or pair.
    pub fn fetch_all(&self, start_ns: i64, end_ns: i64) -> Result<BTreeMap<String, Vec<PairedEvent>>, BrokerError> {
        let mut out = BTreeMap::new();
        for (suffix, tool) in &self.tools {
            tool.fetch(start_ns, end_ns)?;
            let paired = read_paired_events(&tool.simple_telemetry_path(), &tool.telemetry_path())?;
            out.insert(suffix.clone(), paired);
        }
        Ok(out)
    }

    /// Borrows the handle for `suffix`, if configured.
    #[must_use]
    pub fn tool(&self, suffix: &str) -> Option<&ToolHandle> {
        self.tools.get(suffix)
    }

    /// Iterates all configured handles in suffix order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolHandle> {
        self.tools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_has_no_tools() {
        let session = BrokerSession::new("/tmp/results", &[]);
        assert!(session.is_empty());
        assert!(session.tool("_x").is_none());
    }

    #[test]
    fn looks_up_configured_tools_by_suffix() {
        let session = BrokerSession::new(
            "/tmp/results",
            &[("/opt/tool/agent".to_string(), "_edr1".to_string())],
        );
        assert!(!session.is_empty());
        assert_eq!(session.tool("_edr1").unwrap().suffix(), "_edr1");
        assert_eq!(session.tools().count(), 1);
    }
}
