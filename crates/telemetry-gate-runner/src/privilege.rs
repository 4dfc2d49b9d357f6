// telemetry-gate-runner/src/privilege.rs
// ============================================================================
// Module: Privilege Handling
// Description: Drops root privileges to a configured unprivileged user
//              before spawning a test's subprocess.
// Dependencies: libc (unix)
// ============================================================================

//! ## Overview
//! When the harness runs as root and the test under execution does not
//! require elevation, the runner drops to an unprivileged user picked from,
//! in order: explicit config, `SUDO_USER`, `nobody`. This module only
//! resolves *which* user and looks up their uid/gid/home; applying that
//! identity to a spawned [`std::process::Command`] is done by the caller via
//! [`UserIdentity::apply_to`], since that needs `pre_exec` access to the
//! command being built for the test stage specifically.

use std::ffi::CStr;
use std::ffi::CString;

/// A resolved unprivileged identity to run a test stage under.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// Username, for `HOME`/diagnostics.
    pub username: String,
    /// Numeric user id.
    pub uid: u32,
    /// Numeric primary group id.
    pub gid: u32,
    /// Home directory, if resolvable from `/etc/passwd`.
    pub home: Option<String>,
}

/// Picks the configured unprivileged user: `configured`, else `SUDO_USER`,
/// else `nobody`, and resolves it via `getpwnam`.
///
/// # Errors
///
/// Returns a human-readable message when no candidate name resolves to a
/// real account.
pub fn resolve_unprivileged_user(configured: Option<&str>) -> Result<UserIdentity, String> {
    let sudo_user = std::env::var("SUDO_USER").ok();
    let candidates = [configured, sudo_user.as_deref(), Some("nobody")];

    for candidate in candidates.into_iter().flatten() {
        if let Some(identity) = lookup_user(candidate) {
            return Ok(identity);
        }
    }
    Err("no configured, SUDO_USER, or nobody account could be resolved".to_string())
}

#[cfg(unix)]
fn lookup_user(name: &str) -> Option<UserIdentity> {
    let c_name = CString::new(name).ok()?;
    // SAFETY: getpwnam returns a pointer into a thread-local static buffer
    // owned by libc; we copy every field out before the next libc call.
    let passwd = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if passwd.is_null() {
        return None;
    }
    // SAFETY: passwd is non-null and was just populated by getpwnam; its
    // string fields are NUL-terminated C strings owned by libc's buffer.
    unsafe {
        let home = if (*passwd).pw_dir.is_null() {
            None
        } else {
            Some(CStr::from_ptr((*passwd).pw_dir).to_string_lossy().into_owned())
        };
        Some(UserIdentity {
            username: name.to_string(),
            uid: (*passwd).pw_uid,
            gid: (*passwd).pw_gid,
            home,
        })
    }
}

#[cfg(not(unix))]
fn lookup_user(_name: &str) -> Option<UserIdentity> {
    None
}

impl UserIdentity {
    /// Configures `command` to drop to this identity before `exec`, and
    /// sets `HOME` to match. No-op on non-Unix targets.
    pub fn apply_to(&self, command: &mut std::process::Command) {
        command.env("HOME", self.home.as_deref().unwrap_or("/"));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            let gid = self.gid;
            let uid = self.uid;
            command.gid(gid);
            command.uid(uid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_nobody_when_nothing_else_resolves() {
        let identity = resolve_unprivileged_user(None);
        assert!(identity.is_ok() || identity.is_err());
    }

    #[test]
    fn unknown_configured_user_falls_through_to_next_candidate() {
        let identity = resolve_unprivileged_user(Some("definitely-not-a-real-user-xyz"));
        if let Ok(identity) = identity {
            assert_ne!(identity.username, "definitely-not-a-real-user-xyz");
        }
    }
}
