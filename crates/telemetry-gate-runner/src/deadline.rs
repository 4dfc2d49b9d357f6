// telemetry-gate-runner/src/deadline.rs
// ============================================================================
// Module: Deadline Token
// Description: Spawns a subprocess in its own process group and cancels it
//              if it outlives a per-stage deadline.
// Dependencies: stdlib, libc (unix)
// ============================================================================

//! ## Overview
//! Every stage subprocess (`prereq`, `test`, `cleanup`) is launched under a
//! deadline. The deadline is "cooperative": the orchestrator thread polls
//! the child rather than relying on a signal, so partial stdout/stderr is
//! always captured regardless of which exit path is taken. On Unix the
//! child becomes its own session leader so that a timeout kills the whole
//! process group, not just the immediate child — a script that backgrounds
//! work would otherwise leak it past the deadline.

use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of running one subprocess under a deadline.
#[derive(Debug, Clone)]
pub struct DeadlineOutcome {
    /// Exit code, or `None` if the process was killed before exiting or
    /// never started.
    pub exit_code: Option<i32>,
    /// Combined stdout+stderr.
    pub stdout: String,
    /// Nanosecond timestamp at spawn.
    pub start_ns: i64,
    /// Nanosecond timestamp at exit or deadline expiry.
    pub end_ns: i64,
    /// Whether the deadline was exceeded.
    pub timed_out: bool,
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[must_use]
pub fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Runs `command` to completion or until `timeout` elapses, whichever comes
/// first. `command` should already have its working directory, environment,
/// and arguments configured; this function takes over its stdio.
///
/// # Errors
///
/// Returns the underlying [`std::io::Error`] when the process fails to
/// spawn.
pub fn run_with_deadline(command: &mut Command, timeout: Duration) -> std::io::Result<DeadlineOutcome> {
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    place_in_own_process_group(command);

    let start_ns = now_ns();
    let start = Instant::now();
    let mut child = command.spawn()?;

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let mut timed_out = false;
    let exit_code = loop {
        match child.try_wait()? {
            Some(status) => break status.code(),
            None => {
                if start.elapsed() >= timeout {
                    kill_process_group(&child);
                    timed_out = true;
                    thread::sleep(Duration::from_millis(100));
                    let _ = child.try_wait();
                    break None;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };
    let end_ns = now_ns();

    let mut combined = Vec::new();
    if let Some(handle) = stdout_reader {
        combined.extend(handle.join().unwrap_or_default());
    }
    if let Some(handle) = stderr_reader {
        combined.extend(handle.join().unwrap_or_default());
    }

    Ok(DeadlineOutcome {
        exit_code,
        stdout: String::from_utf8_lossy(&combined).into_owned(),
        start_ns,
        end_ns,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

#[cfg(unix)]
fn place_in_own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid() is async-signal-safe and is the only call made
    // between fork and exec here.
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn place_in_own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let pid = i32::try_from(child.id()).unwrap_or(0);
    if pid > 0 {
        // SAFETY: a negative pid targets the whole process group created by
        // place_in_own_process_group's setsid() call; no memory is touched.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &Child) {
    let _ = child.id();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_normally_within_the_deadline() {
        let mut command = Command::new("echo");
        command.arg("hello");
        let outcome = run_with_deadline(&mut command, Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("hello"));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn kills_a_process_that_outlives_its_deadline() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let outcome = run_with_deadline(&mut command, Duration::from_millis(100)).unwrap();
        assert!(outcome.timed_out);
        assert_ne!(outcome.exit_code, Some(0));
    }
}
