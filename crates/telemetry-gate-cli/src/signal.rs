// telemetry-gate-cli/src/signal.rs
// ============================================================================
// Module: Signal-Driven Shutdown
// Description: SIGINT/SIGTERM watcher that flips a shared flag the batch
//              loop checks between tests.
// Dependencies: ctrlc
// ============================================================================

//! ## Overview
//! A graceful stop finishes the in-flight test's cleanup stage rather than
//! killing it mid-script,
//! then stops picking up new tests. [`ctrlc`] runs the handler on its own
//! thread: a background watcher mutates one `Arc<AtomicBool>` the main
//! loop polls between tests.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Shared flag the batch loop polls between tests. `true` means "keep
/// running"; a caught signal flips it to `false` exactly once.
#[derive(Debug, Clone)]
pub struct KeepRunning(Arc<AtomicBool>);

impl KeepRunning {
    /// Builds a flag starting in the running state and installs the
    /// SIGINT/SIGTERM handler that will clear it.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler is already installed in this
    /// process (`ctrlc` only allows one).
    pub fn install() -> Result<Self, ctrlc::Error> {
        let flag = Arc::new(AtomicBool::new(true));
        let handler_flag = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            handler_flag.store(false, Ordering::SeqCst);
        })?;
        Ok(Self(flag))
    }

    /// `true` while no shutdown signal has been observed yet.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Builds a flag with no signal handler attached, for tests and for
    /// `--norun`'s dry-run path where no loop body ever checks it.
    #[must_use]
    pub fn always_running() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_running_never_stops_on_its_own() {
        let flag = KeepRunning::always_running();
        assert!(flag.should_continue());
        assert!(flag.should_continue());
    }
}
