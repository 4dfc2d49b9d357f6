// telemetry-gate-broker/src/parallel.rs
// ============================================================================
// Module: Parallel JSONL Reader
// Description: Reads a tool's two parallel output files line-by-line,
//              pairing each normalized event with its native representation.
// Dependencies: telemetry-gate-core, serde_json
// ============================================================================

//! ## Overview
//! `simple_telemetry<suffix>.json` and `telemetry<suffix>.json` must stay
//! line-for-line aligned: line `i` of each
//! describes the same event. [`read_paired_events`] enforces that
//! invariant while streaming both files — the bound here is exact
//! line-count and per-line parse success on both sides, not
//! a byte limit, since a misaligned tool makes every later event
//! meaningless for the matcher rather than merely oversized.

use std::fs;
use std::path::Path;

use telemetry_gate_core::model::NormalizedEvent;
use thiserror::Error;

/// Errors reading a tool's paired telemetry files.
#[derive(Debug, Error)]
pub enum ParallelReadError {
    /// A parallel file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A line of `simple_telemetry<suffix>.json` failed to parse as a
    /// [`NormalizedEvent`].
    #[error("malformed normalized event at {path}:{line}: {source}")]
    MalformedNormalized {
        /// Path of the file being parsed.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A line of `telemetry<suffix>.json` failed to parse as JSON.
    #[error("malformed native event at {path}:{line}: {source}")]
    MalformedNative {
        /// Path of the file being parsed.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The two files did not have the same number of lines.
    #[error("parallel-file parity violation: {normalized_path} has {normalized_lines} lines, {native_path} has {native_lines}")]
    LineCountMismatch {
        /// Path of the normalized-event file.
        normalized_path: String,
        /// Its line count.
        normalized_lines: usize,
        /// Path of the native-event file.
        native_path: String,
        /// Its line count.
        native_lines: usize,
    },
}

/// One matched pair: a normalized event and the raw native JSON it was
/// derived from, kept together so a matched line can be re-emitted verbatim
/// into `matches<suffix>.json` without re-deriving it.
#[derive(Debug, Clone)]
pub struct PairedEvent {
    /// Index into the paired stream (0-based, shared by both files).
    pub line: usize,
    /// Parsed normalized event, fed to the matcher.
    pub normalized: NormalizedEvent,
    /// Raw native JSON value, carried through for `matches<suffix>.json`.
    pub native: serde_json::Value,
}

fn read_lines(path: &Path) -> Result<Vec<String>, ParallelReadError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).map_err(|source| ParallelReadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(contents.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect())
}

/// Reads and pairs `normalized_path` (`simple_telemetry<suffix>.json`) and
/// `native_path` (`telemetry<suffix>.json`), enforcing line-count parity and
/// parsing every line on both sides.
///
/// # Errors
///
/// Returns [`ParallelReadError`] when either file cannot be read, a line on
/// either side fails to parse, or the two files disagree on line count.
/// Missing files are treated as zero lines on that side, so a tool that
/// observed nothing yields an empty, non-erroring stream.
pub fn read_paired_events(normalized_path: &Path, native_path: &Path) -> Result<Vec<PairedEvent>, ParallelReadError> {
    let normalized_lines = read_lines(normalized_path)?;
    let native_lines = read_lines(native_path)?;

    if normalized_lines.len() != native_lines.len() {
        return Err(ParallelReadError::LineCountMismatch {
            normalized_path: normalized_path.display().to_string(),
            normalized_lines: normalized_lines.len(),
            native_path: native_path.display().to_string(),
            native_lines: native_lines.len(),
        });
    }

    let mut paired = Vec::with_capacity(normalized_lines.len());
    for (line, (normalized_raw, native_raw)) in normalized_lines.iter().zip(native_lines.iter()).enumerate() {
        let normalized: NormalizedEvent =
            serde_json::from_str(normalized_raw).map_err(|source| ParallelReadError::MalformedNormalized {
                path: normalized_path.display().to_string(),
                line: line + 1,
                source,
            })?;
        let native: serde_json::Value =
            serde_json::from_str(native_raw).map_err(|source| ParallelReadError::MalformedNative {
                path: native_path.display().to_string(),
                line: line + 1,
                source,
            })?;
        paired.push(PairedEvent {
            line,
            normalized,
            native,
        });
    }
    Ok(paired)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_lines(path: &Path, lines: &[&str]) {
        let mut file = fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[test]
    fn pairs_aligned_lines() {
        let dir = tempfile::tempdir().unwrap();
        let normalized_path = dir.path().join("simple_telemetry.json");
        let native_path = dir.path().join("telemetry.json");
        write_lines(
            &normalized_path,
            &[r#"{"timestamp_ns":1,"evt_type":"F","action":"OpenWrite","exit_code":0,"target_path":"/tmp/x"}"#],
        );
        write_lines(&native_path, &[r#"{"raw":"native-event"}"#]);

        let paired = read_paired_events(&normalized_path, &native_path).unwrap();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].line, 0);
        assert_eq!(paired[0].native, serde_json::json!({"raw": "native-event"}));
    }

    #[test]
    fn missing_files_are_an_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let paired = read_paired_events(&dir.path().join("a.json"), &dir.path().join("b.json")).unwrap();
        assert!(paired.is_empty());
    }

    #[test]
    fn mismatched_line_counts_are_a_parity_violation() {
        let dir = tempfile::tempdir().unwrap();
        let normalized_path = dir.path().join("simple_telemetry.json");
        let native_path = dir.path().join("telemetry.json");
        write_lines(
            &normalized_path,
            &[
                r#"{"timestamp_ns":1,"evt_type":"F","action":"OpenWrite","exit_code":0,"target_path":"/tmp/x"}"#,
                r#"{"timestamp_ns":2,"evt_type":"F","action":"OpenWrite","exit_code":0,"target_path":"/tmp/y"}"#,
            ],
        );
        write_lines(&native_path, &[r#"{"raw":"one"}"#]);

        let err = read_paired_events(&normalized_path, &native_path).unwrap_err();
        assert!(matches!(err, ParallelReadError::LineCountMismatch { .. }));
    }
}
