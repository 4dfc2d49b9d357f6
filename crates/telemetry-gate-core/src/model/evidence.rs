// telemetry-gate-core/src/model/evidence.rs
// ============================================================================
// Module: Expected Evidence Data Model
// Description: The per-test validation specification parsed from criteria.
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::TechniqueId;
use crate::model::identifiers::TestIndexOrGuid;

/// Comparison operator for a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateOp {
    /// Exact string equality.
    Equals,
    /// Substring containment.
    Contains,
    /// Regular-expression match.
    Regex,
}

impl PredicateOp {
    /// The trailing character used on the field name in `_E_` rows to pick
    /// this operator (`*` regex, `~` substring, none means equals).
    #[must_use]
    pub fn suffix_char(self) -> Option<char> {
        match self {
            Self::Equals => None,
            Self::Contains => Some('~'),
            Self::Regex => Some('*'),
        }
    }

    /// Parses the trailing operator character, defaulting to `Equals` when
    /// none of the recognised suffixes are present.
    #[must_use]
    pub fn from_suffix_char(c: Option<char>) -> Self {
        match c {
            Some('~') => Self::Contains,
            Some('*') => Self::Regex,
            _ => Self::Equals,
        }
    }
}

/// One `{field, op, value}` check against a normalized event's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Payload field name, e.g. `cmdline`, `target_path`.
    pub field: String,
    /// Comparison operator.
    pub op: PredicateOp,
    /// Comparison value, already interpolated.
    pub value: String,
}

impl FieldPredicate {
    /// Round-trips this predicate back to its `name<op>value` textual form,
    /// the inverse of the criteria-row parser. The round-trip property is
    /// only guaranteed for values that do not themselves end in `*` or `~`.
    #[must_use]
    pub fn to_cell(&self) -> String {
        match self.op.suffix_char() {
            Some(c) => format!("{}{c}={}", self.field, self.value),
            None => format!("{}={}", self.field, self.value),
        }
    }
}

/// Kind of an expected (or observed) event, a fixed closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Process start/exit.
    Process,
    /// File-system mutation.
    File,
    /// Network flow.
    Netflow,
    /// Kernel/user module load.
    Module,
    /// Detection/alert record.
    Alert,
    /// Authentication event.
    Auth,
    /// Process tracing event.
    PTrace,
    /// Network packet capture event.
    Netsniff,
    /// Volume mount/unmount/remount.
    Volume,
    /// Registry mutation.
    Registry,
    /// Windows ETW record.
    Etw,
    /// Windows AMSI scan result.
    Amsi,
    /// Generic API call record.
    Api,
}

impl EventKind {
    /// The single-character code used in the compact match string and
    /// glossary table.
    #[must_use]
    pub fn char_code(self) -> char {
        match self {
            Self::Process => 'P',
            Self::Netflow => 'N',
            Self::File => 'F',
            Self::Module => 'M',
            Self::Alert => 'W',
            Self::Auth => 'A',
            Self::PTrace => 'T',
            Self::Netsniff => 'S',
            Self::Volume => 'V',
            Self::Registry => 'R',
            Self::Etw => 'E',
            Self::Amsi => 'I',
            Self::Api => 'X',
        }
    }

    /// The inverse of [`Self::char_code`], for the kinds carried opaquely as
    /// `EventPayload::Other`: `Process`, `File`, and `Netflow` have a
    /// dedicated payload struct and are never reached through this path.
    #[must_use]
    pub fn from_other_tag(tag: &str) -> Option<Self> {
        match tag {
            "M" => Some(Self::Module),
            "W" => Some(Self::Alert),
            "A" => Some(Self::Auth),
            "T" => Some(Self::PTrace),
            "S" => Some(Self::Netsniff),
            "V" => Some(Self::Volume),
            "R" => Some(Self::Registry),
            "E" => Some(Self::Etw),
            "I" => Some(Self::Amsi),
            "X" => Some(Self::Api),
            _ => None,
        }
    }
}

/// Sub-kind for `File` expected events, the normalized action family an
/// observed event must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSubKind {
    /// A write, rename, or create counts.
    Write,
    /// A create counts (but plain writes to existing files do not).
    Create,
    /// `chmod`.
    Chmod,
    /// `chown`.
    Chown,
    /// extended-attribute change.
    Chattr,
    /// Rename only.
    Rename,
    /// Delete.
    Delete,
    /// Unlink (alias of delete in the normalized schema).
    Unlink,
    /// Read.
    Read,
}

impl FileSubKind {
    /// Parses a criteria-row sub-kind token, accepting the `CREAT` alias for
    /// `Create`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "WRITE" => Some(Self::Write),
            "CREATE" | "CREAT" => Some(Self::Create),
            "CHMOD" => Some(Self::Chmod),
            "CHOWN" => Some(Self::Chown),
            "CHATTR" => Some(Self::Chattr),
            "RENAME" => Some(Self::Rename),
            "DELETE" => Some(Self::Delete),
            "UNLINK" => Some(Self::Unlink),
            "READ" => Some(Self::Read),
            _ => None,
        }
    }
}

/// One expected piece of evidence: an event kind plus the predicates that
/// must hold for an observed event to satisfy it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEvent {
    /// Identifier of this expected event within its `ExpectedEvidence`
    /// block, used as an index target from `Correlation::event_indexes`.
    pub id: String,
    /// Event kind.
    pub kind: EventKind,
    /// Sub-kind, present for `File`, `Netflow`, `Module`, `Alert`,
    /// `Netsniff`.
    pub sub_kind: Option<String>,
    /// Field predicates that must all hold.
    pub field_predicates: Vec<FieldPredicate>,
    /// When true, absence does not prevent a `Validated` verdict and this
    /// event does not enter the coverage denominator.
    pub is_optional: bool,
    /// Minimum number of distinct observed events required to satisfy this
    /// expectation; defaults to 1 when the criteria row leaves it unset.
    pub min_count: u32,
}

impl Default for ExpectedEvent {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: EventKind::Process,
            sub_kind: None,
            field_predicates: Vec::new(),
            is_optional: false,
            min_count: 1,
        }
    }
}

/// Relation kind between two already-matched expected events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationKind {
    /// Events share the same shell pipeline (`chain_id`).
    Pipe,
    /// One event's process is the parent of the other.
    ParentChild,
}

impl CorrelationKind {
    /// Parses a criteria-row correlation sub-kind.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "Pipe" => Some(Self::Pipe),
            "ParentChild" => Some(Self::ParentChild),
            _ => None,
        }
    }
}

/// A relation the matcher must verify between two concrete matched events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Always `Process` today; kept for forward compatibility with the
    /// criteria row format.
    pub kind: EventKind,
    /// Relation kind.
    pub sub_kind: CorrelationKind,
    /// Identifiers of the two `ExpectedEvent`s this correlation relates.
    pub event_indexes: Vec<String>,
    /// Whether the relation has been observed; starts false, set by the
    /// matcher.
    pub is_met: bool,
}

/// The per-test validation specification, joined to its `TestCase` by
/// `(technique_id, test_index)` or GUID prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEvidence {
    /// Owning technique.
    pub technique_id: TechniqueId,
    /// Index or GUID used to join this block to its `TestCase`.
    pub test_ref: TestIndexOrGuid,
    /// Display name carried from the `T<tid>` row, for reporting.
    pub display_name: String,
    /// Declared platform for this block, if present.
    pub platform: Option<String>,
    /// Argument overrides from `ARG` rows, fed back into interpolation.
    pub args: BTreeMap<String, String>,
    /// Expected events, in file order.
    pub events: Vec<ExpectedEvent>,
    /// Expected correlations, in file order.
    pub correlations: Vec<Correlation>,
    /// Informational notes from `FYI` rows.
    pub infos: Vec<String>,
    /// Blocking warnings from `!!!` rows; non-empty forces `Skipped`.
    pub warnings: Vec<String>,
}

impl ExpectedEvidence {
    /// True when this block carries at least one blocking warning.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Coverage denominator: required events plus all correlations
    /// (optional events are excluded).
    #[must_use]
    pub fn coverage_denominator(&self) -> usize {
        let required_events = self.events.iter().filter(|e| !e.is_optional).count();
        required_events + self.correlations.len()
    }
}
