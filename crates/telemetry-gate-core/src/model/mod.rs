// telemetry-gate-core/src/model/mod.rs
// ============================================================================
// Module: Data Model
// Description: Re-exports the entity types shared by the loader, planner,
//              runner, and matcher.
// ============================================================================

pub mod catalog;
pub mod evidence;
pub mod events;
pub mod identifiers;
pub mod run;

pub use catalog::Dependency;
pub use catalog::Executor;
pub use catalog::ExecutorKind;
pub use catalog::InputArg;
pub use catalog::Platform;
pub use catalog::TestCase;
pub use evidence::Correlation;
pub use evidence::CorrelationKind;
pub use evidence::EventKind;
pub use evidence::ExpectedEvent;
pub use evidence::ExpectedEvidence;
pub use evidence::FieldPredicate;
pub use evidence::FileSubKind;
pub use evidence::PredicateOp;
pub use events::EventPayload;
pub use events::FileAction;
pub use events::FileFields;
pub use events::NetflowFields;
pub use events::NormalizedEvent;
pub use events::OtherFields;
pub use events::ProcessExitFields;
pub use events::ProcessFields;
pub use identifiers::TechniqueId;
pub use identifiers::TestGuid;
pub use identifiers::TestIndexOrGuid;
pub use identifiers::TestKey;
pub use run::AttributionWindow;
pub use run::RunResult;
pub use run::RunSpec;
pub use run::Stage;
pub use run::StageResult;
pub use run::TestState;
pub use run::TestStatus;
