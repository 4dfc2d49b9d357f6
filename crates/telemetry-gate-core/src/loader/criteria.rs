// telemetry-gate-core/src/loader/criteria.rs
// ============================================================================
// Module: Criteria Loader
// Description: Stateful row-kind CSV parser for expected-evidence criteria.
// ============================================================================

//! A criteria file is a stream of rows, each tagged by its first column. A
//! `T<tid>` row opens a new [`ExpectedEvidence`] block; every row until the
//! next `T…` row or end of file belongs to it. This is modelled as a small
//! table-driven parser producing an event stream, rather than assuming one
//! file equals one technique.

use std::collections::BTreeMap;

use crate::loader::LoaderError;
use crate::model::Correlation;
use crate::model::CorrelationKind;
use crate::model::EventKind;
use crate::model::ExpectedEvent;
use crate::model::ExpectedEvidence;
use crate::model::FieldPredicate;
use crate::model::PredicateOp;
use crate::model::TechniqueId;
use crate::model::TestIndexOrGuid;

/// A non-fatal issue encountered while parsing one criteria row. Callers
/// collect these for diagnostics; they never abort the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriteriaWarning {
    /// 1-based source line number.
    pub line: usize,
    /// Human-readable description of the problem.
    pub message: String,
}

fn parse_kind(token: &str) -> Option<EventKind> {
    match token {
        "Process" => Some(EventKind::Process),
        "File" => Some(EventKind::File),
        "FileRead" => Some(EventKind::File),
        "Netflow" => Some(EventKind::Netflow),
        "Module" => Some(EventKind::Module),
        "Alert" => Some(EventKind::Alert),
        "Auth" => Some(EventKind::Auth),
        "PTrace" => Some(EventKind::PTrace),
        "Netsniff" => Some(EventKind::Netsniff),
        "Volume" => Some(EventKind::Volume),
        "Registry" => Some(EventKind::Registry),
        "ETW" => Some(EventKind::Etw),
        "AMSI" => Some(EventKind::Amsi),
        "API" => Some(EventKind::Api),
        _ => None,
    }
}

/// Splits a CSV line on commas honoring the dialect's `lazy_quotes`
/// behaviour: a field may contain an unescaped quote; quoting is only
/// respected when a field both starts and ends with `"`.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Parses one `name<op>value` cell into a [`FieldPredicate`]. For `File`
/// events a bare cell with no `=` is interpreted as `path=<cell>`.
fn parse_field_predicate(cell: &str, kind: EventKind) -> Option<FieldPredicate> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    let Some(eq_pos) = cell.find('=') else {
        return if kind == EventKind::File {
            Some(FieldPredicate {
                field: "path".to_string(),
                op: PredicateOp::Equals,
                value: cell.to_string(),
            })
        } else {
            None
        };
    };
    let (name_run, value) = cell.split_at(eq_pos);
    let value = &value[1..];
    let op_char = name_run.chars().last();
    let (field, op) = if matches!(op_char, Some('~') | Some('*')) {
        (&name_run[..name_run.len() - 1], PredicateOp::from_suffix_char(op_char))
    } else {
        (name_run, PredicateOp::Equals)
    };
    Some(FieldPredicate {
        field: field.to_string(),
        op,
        value: value.to_string(),
    })
}

struct OpenBlock {
    evidence: ExpectedEvidence,
    next_event_id: usize,
}

/// Parses the full contents of one criteria file into zero or more
/// [`ExpectedEvidence`] blocks, collecting non-fatal warnings along the way.
#[must_use]
pub fn parse_criteria(contents: &str) -> (Vec<ExpectedEvidence>, Vec<CriteriaWarning>) {
    let mut blocks = Vec::new();
    let mut warnings = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        let first_char = line.chars().next();
        if first_char == Some('#') {
            continue;
        }
        let fields = split_row(line);
        let Some(kind_tag) = fields.first().map(String::as_str) else {
            continue;
        };

        if kind_tag.starts_with('T') && fields.len() >= 4 {
            if let Some(block) = open.take() {
                blocks.push(block.evidence);
            }
            let Some(test_ref) = TestIndexOrGuid::parse(&fields[2]) else {
                warnings.push(CriteriaWarning {
                    line: line_no,
                    message: format!("unparseable index/guid cell: {}", fields[2]),
                });
                continue;
            };
            open = Some(OpenBlock {
                evidence: ExpectedEvidence {
                    technique_id: TechniqueId::new(kind_tag),
                    test_ref,
                    display_name: fields.get(3).cloned().unwrap_or_default(),
                    platform: fields.get(1).filter(|p| !p.is_empty()).cloned(),
                    args: BTreeMap::new(),
                    events: Vec::new(),
                    correlations: Vec::new(),
                    infos: Vec::new(),
                    warnings: Vec::new(),
                },
                next_event_id: 0,
            });
            continue;
        }

        let Some(block) = open.as_mut() else {
            warnings.push(CriteriaWarning {
                line: line_no,
                message: "row outside any open block".to_string(),
            });
            continue;
        };

        match kind_tag {
            "_E_" | "_?_" => {
                let Some(kind_token) = fields.get(1) else {
                    warnings.push(CriteriaWarning { line: line_no, message: "missing event kind".to_string() });
                    continue;
                };
                let Some(kind) = parse_kind(kind_token) else {
                    warnings.push(CriteriaWarning { line: line_no, message: format!("unknown event kind: {kind_token}") });
                    continue;
                };
                let has_sub_kind = matches!(
                    kind,
                    EventKind::File | EventKind::Netflow | EventKind::Module | EventKind::Alert | EventKind::Netsniff
                );
                let (sub_kind, predicate_start) = if has_sub_kind {
                    (fields.get(2).cloned(), 3)
                } else {
                    (None, 2)
                };
                let field_predicates = fields[predicate_start.min(fields.len())..]
                    .iter()
                    .filter_map(|cell| parse_field_predicate(cell, kind))
                    .collect();
                let id = format!("e{}", block.next_event_id);
                block.next_event_id += 1;
                block.evidence.events.push(ExpectedEvent {
                    id,
                    kind,
                    sub_kind,
                    field_predicates,
                    is_optional: kind_tag == "_?_",
                    min_count: 1,
                });
            }
            "_C_" => {
                let Some(kind_token) = fields.get(1) else {
                    warnings.push(CriteriaWarning { line: line_no, message: "missing correlation kind".to_string() });
                    continue;
                };
                let Some(kind) = parse_kind(kind_token) else {
                    warnings.push(CriteriaWarning { line: line_no, message: format!("unknown correlation kind: {kind_token}") });
                    continue;
                };
                let Some(sub_kind_token) = fields.get(2) else {
                    warnings.push(CriteriaWarning { line: line_no, message: "missing correlation sub-kind".to_string() });
                    continue;
                };
                let Some(sub_kind) = CorrelationKind::parse(sub_kind_token) else {
                    warnings.push(CriteriaWarning { line: line_no, message: format!("unknown correlation sub-kind: {sub_kind_token}") });
                    continue;
                };
                let event_indexes = fields[3.min(fields.len())..].iter().map(|s| format!("e{s}")).collect();
                block.evidence.correlations.push(Correlation {
                    kind,
                    sub_kind,
                    event_indexes,
                    is_met: false,
                });
            }
            "ARG" => {
                if let (Some(name), Some(value)) = (fields.get(1), fields.get(2)) {
                    block.evidence.args.insert(name.clone(), value.clone());
                } else {
                    warnings.push(CriteriaWarning { line: line_no, message: "malformed ARG row".to_string() });
                }
            }
            "FYI" => {
                block.evidence.infos.push(fields[1..].join(","));
            }
            "!!!" => {
                block.evidence.warnings.push(fields[1..].join(","));
            }
            other => {
                warnings.push(CriteriaWarning { line: line_no, message: format!("unrecognised row kind: {other}") });
            }
        }
    }

    if let Some(block) = open.take() {
        blocks.push(block.evidence);
    }

    (blocks, warnings)
}

/// Reads and parses a criteria file at `path`.
///
/// # Errors
///
/// Returns [`LoaderError::CriteriaRead`] when the file cannot be read.
pub fn load_criteria_file(path: &std::path::Path) -> Result<(Vec<ExpectedEvidence>, Vec<CriteriaWarning>), LoaderError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoaderError::CriteriaRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_criteria(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_process_event_with_predicates() {
        let predicate = parse_field_predicate("cmdline~=tar czf", EventKind::Process).unwrap();
        assert_eq!(predicate.field, "cmdline");
        assert_eq!(predicate.op, PredicateOp::Contains);
        assert_eq!(predicate.value, "tar czf");
    }

    #[test]
    fn bare_file_cell_becomes_path_predicate() {
        let predicate = parse_field_predicate("/etc/ufw/ufw.conf", EventKind::File).unwrap();
        assert_eq!(predicate.field, "path");
        assert_eq!(predicate.op, PredicateOp::Equals);
    }

    #[test]
    fn opens_and_closes_blocks_on_t_rows() {
        let csv = "T1027,linux,1,Obfuscated Files\n_E_,Process,cmdline=echo hi\nT1027,linux,2,Other\n_E_,File,WRITE,path=/tmp/x\n";
        let (blocks, warnings) = parse_criteria(csv);
        assert!(warnings.is_empty());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].events.len(), 1);
        assert_eq!(blocks[1].events[0].sub_kind.as_deref(), Some("WRITE"));
    }

    #[test]
    fn blocking_warning_row_is_recorded() {
        let csv = "T1562.004,linux,7,Stop UFW\n!!!,destructive operation\n";
        let (blocks, _) = parse_criteria(csv);
        assert!(blocks[0].is_blocked());
    }

    #[test]
    fn whole_line_comment_is_skipped() {
        let csv = "# just a note\nT1027,linux,1,Test\n_E_,Process,cmdline=echo hi\n";
        let (blocks, _) = parse_criteria(csv);
        assert_eq!(blocks.len(), 1);
    }
}
