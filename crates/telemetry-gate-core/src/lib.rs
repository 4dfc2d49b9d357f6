// telemetry-gate-core/src/lib.rs
// ============================================================================
// Crate: telemetry-gate-core
// Description: Data model, catalog/criteria loader, test planner, and
//              matcher for the Telemetry Gate adversary-emulation harness.
// ============================================================================

//! ## Overview
//! `telemetry-gate-core` is backend-agnostic: it owns the data model and the
//! pure/file-reading logic (loading, planning, matching) but never spawns a
//! subprocess and never talks to a telemetry tool directly. Those concerns
//! live in `telemetry-gate-runner`, `telemetry-gate-providers`, and
//! `telemetry-gate-broker`, which depend on this crate and implement the
//! traits in [`interfaces`].

pub mod interfaces;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod planner;

pub use interfaces::HostInfoError;
pub use interfaces::HostInfoProvider;
pub use interfaces::RunRecordStore;
pub use interfaces::RunRecordStoreError;
pub use interfaces::TelemetryTool;
pub use interfaces::TelemetryToolError;
pub use loader::LoaderError;
pub use matcher::MatcherError;
pub use model::AttributionWindow;
pub use model::Correlation;
pub use model::CorrelationKind;
pub use model::EventKind;
pub use model::EventPayload;
pub use model::Executor;
pub use model::ExecutorKind;
pub use model::ExpectedEvent;
pub use model::ExpectedEvidence;
pub use model::FieldPredicate;
pub use model::FileSubKind;
pub use model::NormalizedEvent;
pub use model::PredicateOp;
pub use model::RunResult;
pub use model::RunSpec;
pub use model::Stage;
pub use model::StageResult;
pub use model::TechniqueId;
pub use model::TestCase;
pub use model::TestGuid;
pub use model::TestState;
pub use model::TestStatus;
pub use planner::PlannerError;
