//! Control status computation: evidence rules evaluated against linked evidence and
//! verification records, rolled up per control and cached for dashboards and batches.

pub mod alerts;
pub mod batch;
pub mod catalog;
pub mod clock;
pub mod dashboard;
pub mod domain;
pub mod evaluation;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use alerts::{AlertKind, AlertLedger, ComplianceAlert};
pub use batch::{
    run_batch, BatchArgs, BatchError, BatchFilter, BatchOutcome, BatchReport, BatchRequest,
    BatchSelectorError, ControlFailure,
};
pub use catalog::{
    EvidenceRule, RuleDraft, RuleId, RuleKind, RuleScope, RuleType, RuleValidationError,
    RuleViolation, ScopeType,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dashboard::{
    is_near_due, DashboardSummary, DashboardTotals, SectionBreakdown, StatusCounts, UpcomingDue,
};
pub use domain::{
    section_code_for, Actor, Control, ControlId, ControlNote, ControlVerification, EvidenceId,
    EvidenceItem, EvidenceLink, NoteId, NoteType, PackId, StandardPack, VerificationId,
    VerificationStatus, UNKNOWN_SECTION,
};
pub use evaluation::{
    applicable_rules, compute_control_status, evaluate, matching_evidence, ComputedStatus,
    ControlInputs, ControlStatus, RuleVerdict, StatusDetails, StatusHint, VerificationFreshness,
};
pub use memory::InMemoryComplianceStore;
pub use repository::{
    AlertError, AlertPublisher, ComplianceRepository, ControlStatusCache, RepositoryError,
    StatusCacheStore, StatusTransition,
};
pub use router::control_status_router;
pub use service::{ControlStatusService, PackSelector, StatusServiceError, VerificationOutcome};
pub use snapshot::{ComplianceSnapshot, SnapshotError};
