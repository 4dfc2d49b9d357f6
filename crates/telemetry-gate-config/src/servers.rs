// telemetry-gate-config/src/servers.rs
// ============================================================================
// Module: Server Table Loader
// Description: Parses servers.csv into the ServerTable consumed by
//              telemetry-gate-core's interpolation for $SERVER[...] refs.
// ============================================================================

use std::path::Path;

use telemetry_gate_core::planner::ServerEntry;
use telemetry_gate_core::planner::ServerTable;
use thiserror::Error;

/// Errors surfaced while loading `servers.csv`.
#[derive(Debug, Error)]
pub enum ServerTableError {
    /// The file could not be read.
    #[error("failed to read servers file {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Parses `servers.csv` contents: `id, type, hostname, addr, port, username,
/// password, pubkey`. Header row is skipped; malformed rows (wrong field
/// count) are dropped, matching the loader's "log and skip" policy for
/// malformed rows elsewhere in the harness.
#[must_use]
pub fn parse_servers_csv(contents: &str) -> ServerTable {
    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line_no == 0 {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 8 {
            continue;
        }
        entries.push(ServerEntry {
            id: fields[0].to_string(),
            server_type: fields[1].to_string(),
            hostname: fields[2].to_string(),
            addr: fields[3].to_string(),
            port: fields[4].to_string(),
            username: fields[5].to_string(),
            password: fields[6].to_string(),
            pubkey: fields[7].to_string(),
        });
    }
    ServerTable::new(entries)
}

/// Loads and parses `servers.csv` at `path`.
///
/// # Errors
///
/// Returns [`ServerTableError::Read`] when the file cannot be read.
pub fn load_servers_csv(path: &Path) -> Result<ServerTable, ServerTableError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ServerTableError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_servers_csv(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_server_row() {
        let csv = "id,type,hostname,addr,port,username,password,pubkey\ns1,c2,victim-host,10.0.0.7,443,op,hunter2,\n";
        let table = parse_servers_csv(csv);
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].addr, "10.0.0.7");
    }
}
