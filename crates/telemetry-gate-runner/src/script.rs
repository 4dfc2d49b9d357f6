// telemetry-gate-runner/src/script.rs
// ============================================================================
// Module: Script Materialization
// Description: Hash-comment stripping and file-redirect extraction applied
//              to an interpolated command before it is written to disk.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! Two independent transforms run over the interpolated command text before
//! it becomes a script file: stripping a trailing `#`-comment (shell-family
//! interpreters only), and
//! pulling `N>` / `N>>` redirect targets out into a separate list so the
//! matcher can treat them as evidence of a file write without parsing the
//! command again later.

use telemetry_gate_core::model::ExecutorKind;

/// Strips a trailing hash-comment from `command` when `kind` is a
/// shell-family interpreter (`bash`/`sh`). PowerShell and `cmd` do not treat
/// `#` as a comment marker, so the command is returned unchanged for those.
///
/// A comment is recognised as the first `#` that is not immediately part of
/// a `#{...}` interpolation token (those are resolved before this runs, so
/// in practice any remaining `#` starts a comment). Everything from that `#`
/// to the end of the command becomes the returned comment, with the marker
/// itself removed; the command half retains its trailing whitespace
/// unchanged.
#[must_use]
pub fn strip_hash_comment(command: &str, kind: ExecutorKind) -> (String, Option<String>) {
    if !matches!(kind, ExecutorKind::Bash | ExecutorKind::Sh) {
        return (command.to_string(), None);
    }
    match command.find('#') {
        Some(idx) => {
            let (head, tail) = command.split_at(idx);
            (head.to_string(), Some(tail[1..].to_string()))
        }
        None => (command.to_string(), None),
    }
}

/// Extracts `N>`/`N>>`/`>`/`>>` redirect targets from `command`, returning
/// the command with each redirect clause removed and the list of targets in
/// left-to-right order. Consecutive spaces left behind by a removed clause
/// are collapsed to one.
#[must_use]
pub fn extract_file_redirects(command: &str) -> (String, Vec<String>) {
    let mut cleaned = String::with_capacity(command.len());
    let mut targets = Vec::new();
    let char_positions: Vec<(usize, char)> = command.char_indices().collect();
    let mut idx = 0;
    while idx < char_positions.len() {
        let (byte_pos, ch) = char_positions[idx];
        if ch.is_ascii_digit() {
            if let Some((target, consumed_bytes)) = peek_redirect_at(command, byte_pos) {
                targets.push(target);
                idx += command[byte_pos..byte_pos + consumed_bytes].chars().count();
                continue;
            }
        }
        if ch == '>' {
            if let Some((target, consumed_bytes)) = parse_redirect(&command[byte_pos..]) {
                targets.push(target);
                idx += command[byte_pos..byte_pos + consumed_bytes].chars().count();
                continue;
            }
        }
        cleaned.push(ch);
        idx += 1;
    }
    (collapse_runs_of_spaces(&cleaned), targets)
}

/// Replaces every run of two or more ASCII spaces with a single space.
fn collapse_runs_of_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(c);
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

/// When `command[at..]` starts with `<digits>>` or `<digits>>>`, returns the
/// redirect target and number of bytes consumed from `at`.
fn peek_redirect_at(command: &str, at: usize) -> Option<(String, usize)> {
    let rest = &command[at..];
    let digit_len = rest.chars().take_while(char::is_ascii_digit).count();
    if digit_len == 0 {
        return None;
    }
    let after_digits = &rest[digit_len..];
    let (target, redirect_len) = parse_redirect(after_digits)?;
    Some((target, digit_len + redirect_len))
}

/// Parses a `>` or `>>` redirect starting at the beginning of `text`,
/// returning the whitespace-trimmed target token and total bytes consumed.
fn parse_redirect(text: &str) -> Option<(String, usize)> {
    let arrow_len = if text.starts_with(">>") {
        2
    } else if text.starts_with('>') {
        1
    } else {
        return None;
    };
    let after_arrow = &text[arrow_len..];
    let leading_ws = after_arrow.chars().take_while(|c| *c == ' ').count();
    let target_start = arrow_len + leading_ws;
    let target_slice = &text[target_start..];
    let target_len: usize = target_slice
        .chars()
        .take_while(|c| !c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if target_len == 0 {
        return None;
    }
    Some((text[target_start..target_start + target_len].to_string(), target_start + target_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hash_comment_in_bash() {
        let (command, comment) = strip_hash_comment(
            "sudo rm /var/log/journal/* #physically deletes the journal files",
            ExecutorKind::Bash,
        );
        assert_eq!(command, "sudo rm /var/log/journal/* ");
        assert_eq!(comment.as_deref(), Some("physically deletes the journal files"));
    }

    #[test]
    fn leaves_powershell_commands_unchanged() {
        let (command, comment) =
            strip_hash_comment("Remove-Item $file #not a comment here", ExecutorKind::Powershell);
        assert_eq!(command, "Remove-Item $file #not a comment here");
        assert!(comment.is_none());
    }

    #[test]
    fn extracts_file_redirects() {
        let (cleaned, targets) = extract_file_redirects("ifconfig 2>/dev/null >> #{some_target}");
        assert_eq!(cleaned, "ifconfig ");
        assert_eq!(targets, vec!["/dev/null".to_string(), "#{some_target}".to_string()]);
    }

    #[test]
    fn no_redirects_is_a_no_op() {
        let (cleaned, targets) = extract_file_redirects("echo hello world");
        assert_eq!(cleaned, "echo hello world");
        assert!(targets.is_empty());
    }
}
