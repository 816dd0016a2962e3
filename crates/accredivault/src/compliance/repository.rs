use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::EvidenceRule;
use super::domain::{
    Control, ControlId, ControlNote, ControlVerification, EvidenceId, EvidenceItem, EvidenceLink,
    PackId, StandardPack,
};
use super::evaluation::{ComputedStatus, ControlStatus, StatusDetails};

/// Persisted, disposable status row; exactly one per control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStatusCache {
    pub control_id: ControlId,
    pub computed_status: ComputedStatus,
    pub last_evidence_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub computed_at: DateTime<Utc>,
    pub details: StatusDetails,
}

impl ControlStatusCache {
    pub fn from_status(status: ControlStatus, computed_at: DateTime<Utc>) -> Self {
        Self {
            control_id: status.control_id,
            computed_status: status.status,
            last_evidence_date: status.last_evidence_date,
            next_due_date: status.next_due_date,
            computed_at,
            details: status.details,
        }
    }
}

/// Read access to the catalog, evidence and verification collaborators, plus the
/// link and verification writes that trigger recomputation.
pub trait ComplianceRepository: Send + Sync {
    fn pack(&self, id: PackId) -> Result<Option<StandardPack>, RepositoryError>;
    /// Most recently created pack.
    fn latest_pack(&self) -> Result<Option<StandardPack>, RepositoryError>;
    /// Most recently created pack carrying the version string.
    fn pack_by_version(&self, version: &str) -> Result<Option<StandardPack>, RepositoryError>;
    fn control(&self, id: ControlId) -> Result<Option<Control>, RepositoryError>;
    /// Controls in configured sort order.
    fn controls_for_pack(&self, pack_id: PackId) -> Result<Vec<Control>, RepositoryError>;
    fn rules_for_pack(&self, pack_id: PackId) -> Result<Vec<EvidenceRule>, RepositoryError>;
    fn evidence_item(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>, RepositoryError>;
    /// Evidence linked to the control, newest event first.
    fn linked_evidence(&self, control_id: ControlId) -> Result<Vec<EvidenceItem>, RepositoryError>;
    fn latest_link_at(
        &self,
        control_id: ControlId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;
    fn verifications(
        &self,
        control_id: ControlId,
    ) -> Result<Vec<ControlVerification>, RepositoryError>;
    /// Fails with `Conflict` when the pair is already linked.
    fn insert_link(&self, link: EvidenceLink) -> Result<(), RepositoryError>;
    /// Fails with `NotFound` when the pair is not linked.
    fn remove_link(
        &self,
        control_id: ControlId,
        evidence_id: &EvidenceId,
    ) -> Result<(), RepositoryError>;
    fn append_verification(&self, record: ControlVerification) -> Result<(), RepositoryError>;
    /// Notes on the control, newest first.
    fn notes(&self, control_id: ControlId) -> Result<Vec<ControlNote>, RepositoryError>;
    /// Fails with `Conflict` when the id is taken.
    fn insert_note(&self, note: ControlNote) -> Result<(), RepositoryError>;
    /// Replace a stored note; fails with `NotFound` when it does not exist.
    fn update_note(&self, note: ControlNote) -> Result<(), RepositoryError>;
}

/// Persistence collaborator for the status cache with per-control upsert semantics.
pub trait StatusCacheStore: Send + Sync {
    /// Insert or overwrite the row for `row.control_id`, returning the replaced row.
    fn upsert_by_control(
        &self,
        row: ControlStatusCache,
    ) -> Result<Option<ControlStatusCache>, RepositoryError>;
    fn fetch(&self, control_id: ControlId) -> Result<Option<ControlStatusCache>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Status change handed to the alerting collaborator after each persisted recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub control_id: ControlId,
    pub control_code: String,
    pub previous: Option<ComputedStatus>,
    pub current: ComputedStatus,
    pub next_due_date: Option<NaiveDate>,
    pub today: NaiveDate,
    pub at: DateTime<Utc>,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }

    pub fn escalated(&self) -> bool {
        match self.previous {
            Some(previous) => self.current.severity() > previous.severity(),
            None => self.current == ComputedStatus::Overdue,
        }
    }
}

/// Outbound hook for alert bookkeeping.
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, transition: &StatusTransition) -> Result<(), AlertError>;
}

/// Alert dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
}
