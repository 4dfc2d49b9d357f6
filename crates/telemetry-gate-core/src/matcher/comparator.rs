// telemetry-gate-core/src/matcher/comparator.rs
// ============================================================================
// Module: Field Predicate Comparator
// Description: Evaluates a single FieldPredicate against an eventpayload
//              fields, failing closed when the named field is absent.
// ============================================================================

//! One match arm per operator, each returning `Option<bool>` where `None`
//! means "the field was not present on this payload" rather than true or
//! false. Callers treat `None` as a non-match. `None` never propagates
//! through a boolean algebra here — every predicate in an `ExpectedEvent`
//! is a flat conjunction, so a missing field simply fails that one
//! predicate.

use regex::Regex;

use crate::model::EventKind;
use crate::model::EventPayload;
use crate::model::FieldPredicate;
use crate::model::FileFields;
use crate::model::NetflowFields;
use crate::model::PredicateOp;
use crate::model::ProcessFields;

fn process_field<'a>(fields: &'a ProcessFields, name: &str) -> Option<String> {
    match name {
        "cmdline" => Some(fields.cmdline.clone()),
        "exepath" | "exe_path" => fields.exe_path.clone(),
        "env" => fields.env.clone(),
        "is_elevated" => Some(fields.is_elevated.to_string()),
        "pid" => Some(fields.pid.to_string()),
        "unique_pid" => fields.unique_pid.clone(),
        "parent_unique_pid" => fields.parent_unique_pid.clone(),
        "chain_id" => fields.chain_id.clone(),
        _ => None,
    }
}

fn file_field(fields: &FileFields, name: &str) -> Option<String> {
    match name {
        "path" | "target_path" => Some(fields.target_path.clone()),
        "dest_path" => fields.dest_path.clone(),
        "perm_flags" => fields.perm_flags.clone(),
        "exepath" | "exe_path" => fields.exe_path.clone(),
        "pid" => fields.pid.map(|p| p.to_string()),
        _ => None,
    }
}

fn file_field_with_fallback(fields: &FileFields, name: &str) -> Option<String> {
    if name == "path" {
        return fields.dest_path.clone().or_else(|| Some(fields.target_path.clone()));
    }
    file_field(fields, name)
}

/// Stringifies a raw JSON field value for predicate comparison: strings
/// pass through unquoted, everything else uses its JSON text.
fn other_field(raw: &serde_json::Map<String, serde_json::Value>, name: &str) -> Option<String> {
    raw.get(name).map(|value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn netflow_field(fields: &NetflowFields, name: &str) -> Option<String> {
    match name {
        "flow_str" => fields.flow_str.clone(),
        "flow_dns" => fields.flow_dns.clone(),
        "flags" => fields.flags.clone(),
        "exepath" | "exe_path" => fields.exe_path.clone(),
        "pid" => fields.pid.map(|p| p.to_string()),
        _ => None,
    }
}

/// Extracts a named fieldstring value from a payload. `None` means the
/// field is absent, which evaluates every predicate against it as false.
fn extract_field(payload: &EventPayload, kind: EventKind, name: &str) -> Option<String> {
    match (kind, payload) {
        (EventKind::Process, EventPayload::Process(p)) => process_field(p, name),
        (EventKind::File, EventPayload::File(f) | EventPayload::FileRead(f)) => {
            if name == "path" {
                file_field(f, "target_path")
            } else {
                file_field(f, name)
            }
        }
        (EventKind::Netflow, EventPayload::Netflow(n)) => netflow_field(n, name),
        (_, EventPayload::Other(fields)) => other_field(&fields.raw, name),
        _ => None,
    }
}

/// Like [`extract_field`] but tries `target_path` then `dest_path` for a
/// `path` predicate File sub-kind handling.
fn extract_field_file_fallback(payload: &EventPayload, name: &str) -> Option<String> {
    match payload {
        EventPayload::File(f) | EventPayload::FileRead(f) => {
            if name == "path" {
                Some(f.target_path.clone())
            } else {
                file_field_with_fallback(f, name)
            }
        }
        _ => None,
    }
}

/// Evaluates one field predicateoperator against an extracted string
/// value.
fn evaluate_op(op: PredicateOp, actual: &str, expected: &str) -> Result<bool, regex::Error> {
    Ok(match op {
        PredicateOp::Equals => actual == expected,
        PredicateOp::Contains => actual.contains(expected),
        PredicateOp::Regex => Regex::new(expected)?.is_match(actual),
    })
}

/// Evaluates one [`FieldPredicate`] against a `Process` or `Netflow`
/// payload. Returns `false` (not an error) when the field is absent —
/// fail-closed matches intent that an expectation referencing a
/// field the agent never emitted simply does not match.
///
/// # Errors
///
/// Returns a regex compile error when `predicate.op` is
/// [`PredicateOp::Regex`] and `predicate.value` is not a valid pattern.
pub fn evaluate_predicate(
    payload: &EventPayload,
    kind: EventKind,
    predicate: &FieldPredicate,
) -> Result<bool, regex::Error> {
    let Some(actual) = extract_field(payload, kind, &predicate.field) else {
        return Ok(false);
    };
    evaluate_op(predicate.op, &actual, &predicate.value)
}

/// Like [`evaluate_predicate`] but for `File` events, where `path` checks
/// `target_path` first and falls back to `dest_path` (the rename
/// destination)
///
/// # Errors
///
/// Returns a regex compile error for an invalid pattern.
pub fn evaluate_file_predicate(payload: &EventPayload, predicate: &FieldPredicate) -> Result<bool, regex::Error> {
    if predicate.field == "path" {
        let target_hit = extract_field_file_fallback(payload, "target_path")
            .map(|v| evaluate_op(predicate.op, &v, &predicate.value))
            .transpose()?
            .unwrap_or(false);
        if target_hit {
            return Ok(true);
        }
        return extract_field_file_fallback(payload, "dest_path")
            .map(|v| evaluate_op(predicate.op, &v, &predicate.value))
            .transpose()
            .map(|r| r.unwrap_or(false));
    }
    let Some(actual) = extract_field_file_fallback(payload, &predicate.field) else {
        return Ok(false);
    };
    evaluate_op(predicate.op, &actual, &predicate.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessFields;

    #[test]
    fn process_contains_matches_substring() {
        let payload = EventPayload::Process(ProcessFields {
            cmdline: "tar czf /tmp/x .".to_string(),
            ..ProcessFields::default()
        });
        let predicate = FieldPredicate {
            field: "cmdline".to_string(),
            op: PredicateOp::Contains,
            value: "tar czf".to_string(),
        };
        assert!(evaluate_predicate(&payload, EventKind::Process, &predicate).unwrap());
    }

    #[test]
    fn missing_field_fails_closed() {
        let payload = EventPayload::Process(ProcessFields::default());
        let predicate = FieldPredicate {
            field: "nonexistent".to_string(),
            op: PredicateOp::Equals,
            value: "x".to_string(),
        };
        assert!(!evaluate_predicate(&payload, EventKind::Process, &predicate).unwrap());
    }
}
