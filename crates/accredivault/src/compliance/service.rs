use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::dashboard::{summarize, DashboardSummary};
use super::domain::{
    Actor, Control, ControlId, ControlNote, ControlVerification, EvidenceId, EvidenceLink, NoteId,
    NoteType, StandardPack, VerificationId, VerificationStatus,
};
use super::evaluation::{applicable_rules, compute_control_status, ControlInputs, ControlStatus};
use super::repository::{
    AlertError, AlertPublisher, ComplianceRepository, ControlStatusCache, RepositoryError,
    StatusCacheStore, StatusTransition,
};
use crate::config::EngineConfig;

/// How a batch or dashboard request names its pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackSelector {
    Version(String),
    Latest,
}

impl fmt::Display for PackSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(version) => write!(f, "version {version}"),
            Self::Latest => write!(f, "latest pack"),
        }
    }
}

/// Verification record together with the status it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub verification: ControlVerification,
    pub status: ControlStatusCache,
}

/// Recomputes control statuses and keeps the cache in step with evidence and verification writes.
pub struct ControlStatusService<R, S, A> {
    repository: Arc<R>,
    cache: Arc<S>,
    alerts: Arc<A>,
    clock: Arc<dyn Clock>,
    engine: EngineConfig,
    verification_sequence: AtomicU64,
    note_sequence: AtomicU64,
}

impl<R, S, A> ControlStatusService<R, S, A>
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    pub fn new(repository: Arc<R>, cache: Arc<S>, alerts: Arc<A>) -> Self {
        Self::with_clock(repository, cache, alerts, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        cache: Arc<S>,
        alerts: Arc<A>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            cache,
            alerts,
            clock,
            engine: EngineConfig::default(),
            verification_sequence: AtomicU64::new(1),
            note_sequence: AtomicU64::new(1),
        }
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Continue `ver-NNNNNN` numbering past the highest id among `existing`.
    pub fn resume_verification_sequence<'a>(
        mut self,
        existing: impl IntoIterator<Item = &'a VerificationId>,
    ) -> Self {
        let next = existing
            .into_iter()
            .filter_map(|id| id.0.strip_prefix("ver-")?.parse::<u64>().ok())
            .max()
            .map_or(1, |highest| highest.saturating_add(1));
        self.verification_sequence = AtomicU64::new(next);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn resolve_pack(&self, selector: &PackSelector) -> Result<StandardPack, StatusServiceError> {
        let pack = match selector {
            PackSelector::Version(version) => self.repository.pack_by_version(version)?,
            PackSelector::Latest => self.repository.latest_pack()?,
        };
        pack.ok_or_else(|| StatusServiceError::PackNotFound(selector.to_string()))
    }

    pub fn controls_for_pack(&self, pack: &StandardPack) -> Result<Vec<Control>, StatusServiceError> {
        Ok(self.repository.controls_for_pack(pack.id)?)
    }

    pub fn control(&self, control_id: ControlId) -> Result<Control, StatusServiceError> {
        self.repository
            .control(control_id)?
            .ok_or(StatusServiceError::ControlNotFound(control_id))
    }

    /// Compute the status of one control as of `today` without touching the cache.
    pub fn compute(
        &self,
        control: &Control,
        today: NaiveDate,
    ) -> Result<ControlStatus, StatusServiceError> {
        let catalog = self.repository.rules_for_pack(control.pack_id)?;
        let rules = applicable_rules(control, &catalog);
        let evidence = self.repository.linked_evidence(control.id)?;
        let verifications = self.repository.verifications(control.id)?;
        let latest_linked_at = self.repository.latest_link_at(control.id)?;

        Ok(compute_control_status(
            ControlInputs {
                control,
                rules: &rules,
                evidence: &evidence,
                verifications: &verifications,
                latest_linked_at,
            },
            today,
        ))
    }

    /// Upsert the cache row for the control and hand the transition to the alert publisher.
    pub fn persist(
        &self,
        control: &Control,
        status: ControlStatus,
        today: NaiveDate,
        actor: &Actor,
    ) -> Result<ControlStatusCache, StatusServiceError> {
        let now = self.clock.now();
        let row = ControlStatusCache::from_status(status, now);
        let previous = self.cache.upsert_by_control(row.clone())?;

        let transition = StatusTransition {
            control_id: control.id,
            control_code: control.control_code.clone(),
            previous: previous.map(|prior| prior.computed_status),
            current: row.computed_status,
            next_due_date: row.next_due_date,
            today,
            at: now,
        };

        tracing::debug!(
            control_id = %control.id,
            control_code = %control.control_code,
            status = row.computed_status.as_str(),
            next_due = ?row.next_due_date,
            actor = %actor,
            changed = transition.changed(),
            "control status recomputed"
        );
        if transition.escalated() {
            tracing::info!(
                control_id = %control.id,
                control_code = %control.control_code,
                from = transition.previous.map(|status| status.as_str()),
                to = row.computed_status.as_str(),
                "control status escalated"
            );
        }

        self.alerts.publish(&transition)?;
        Ok(row)
    }

    /// Recompute as of the clock's today and persist. Also serves status reads.
    pub fn recompute_and_persist(
        &self,
        control_id: ControlId,
        actor: &Actor,
    ) -> Result<ControlStatusCache, StatusServiceError> {
        let control = self.control(control_id)?;
        let today = self.clock.today();
        let status = self.compute(&control, today)?;
        self.persist(&control, status, today, actor)
    }

    pub fn link_evidence(
        &self,
        control_id: ControlId,
        evidence_id: EvidenceId,
        relevance_note: Option<String>,
        actor: &Actor,
    ) -> Result<ControlStatusCache, StatusServiceError> {
        self.control(control_id)?;
        if self.repository.evidence_item(&evidence_id)?.is_none() {
            return Err(StatusServiceError::EvidenceNotFound(evidence_id));
        }

        self.repository.insert_link(EvidenceLink {
            control_id,
            evidence_id,
            linked_at: self.clock.now(),
            linked_by: actor.username().map(str::to_string),
            relevance_note,
        })?;
        self.recompute_and_persist(control_id, actor)
    }

    pub fn unlink_evidence(
        &self,
        control_id: ControlId,
        evidence_id: &EvidenceId,
        actor: &Actor,
    ) -> Result<ControlStatusCache, StatusServiceError> {
        self.control(control_id)?;
        self.repository.remove_link(control_id, evidence_id)?;
        self.recompute_and_persist(control_id, actor)
    }

    pub fn verify(
        &self,
        control_id: ControlId,
        remarks: Option<String>,
        actor: &Actor,
    ) -> Result<VerificationOutcome, StatusServiceError> {
        self.record_verification(control_id, VerificationStatus::Verified, remarks, actor)
    }

    pub fn reject(
        &self,
        control_id: ControlId,
        remarks: Option<String>,
        actor: &Actor,
    ) -> Result<VerificationOutcome, StatusServiceError> {
        self.record_verification(control_id, VerificationStatus::Rejected, remarks, actor)
    }

    fn record_verification(
        &self,
        control_id: ControlId,
        status: VerificationStatus,
        remarks: Option<String>,
        actor: &Actor,
    ) -> Result<VerificationOutcome, StatusServiceError> {
        self.control(control_id)?;
        let verification = ControlVerification {
            id: self.next_verification_id(),
            control_id,
            status,
            remarks,
            verified_by: actor.username().map(str::to_string),
            verified_at: self.clock.now(),
            evidence_snapshot_at: self.repository.latest_link_at(control_id)?,
        };
        self.repository.append_verification(verification.clone())?;

        tracing::info!(
            control_id = %control_id,
            verification = status.label(),
            actor = %actor,
            "control verification recorded"
        );

        let status = self.recompute_and_persist(control_id, actor)?;
        Ok(VerificationOutcome {
            verification,
            status,
        })
    }

    fn next_verification_id(&self) -> VerificationId {
        let id = self.verification_sequence.fetch_add(1, Ordering::Relaxed);
        VerificationId(format!("ver-{id:06}"))
    }

    pub fn notes(&self, control_id: ControlId) -> Result<Vec<ControlNote>, StatusServiceError> {
        self.control(control_id)?;
        Ok(self.repository.notes(control_id)?)
    }

    pub fn add_note(
        &self,
        control_id: ControlId,
        note_type: NoteType,
        text: &str,
        actor: &Actor,
    ) -> Result<ControlNote, StatusServiceError> {
        self.control(control_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(StatusServiceError::BlankNote);
        }

        let id = self.note_sequence.fetch_add(1, Ordering::Relaxed);
        let note = ControlNote {
            id: NoteId(format!("note-{id:06}")),
            control_id,
            note_type,
            text: text.to_string(),
            created_by: actor.username().map(str::to_string),
            created_at: self.clock.now(),
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        };
        self.repository.insert_note(note.clone())?;
        tracing::debug!(
            control_id = %control_id,
            note_id = %note.id,
            actor = %actor,
            "control note added"
        );
        Ok(note)
    }

    /// Mark a note resolved, or reopen it; reopening clears the resolver.
    pub fn set_note_resolved(
        &self,
        control_id: ControlId,
        note_id: &NoteId,
        resolved: bool,
        actor: &Actor,
    ) -> Result<ControlNote, StatusServiceError> {
        self.control(control_id)?;
        let mut note = self
            .repository
            .notes(control_id)?
            .into_iter()
            .find(|note| note.id == *note_id)
            .ok_or_else(|| StatusServiceError::NoteNotFound(note_id.clone()))?;

        if note.resolved != resolved {
            note.resolved = resolved;
            if resolved {
                note.resolved_at = Some(self.clock.now());
                note.resolved_by = actor.username().map(str::to_string);
            } else {
                note.resolved_at = None;
                note.resolved_by = None;
            }
            self.repository.update_note(note.clone())?;
        }
        Ok(note)
    }

    /// Pack summary read from the cache as of the clock's today.
    pub fn dashboard(&self, selector: &PackSelector) -> Result<DashboardSummary, StatusServiceError> {
        let pack = self.resolve_pack(selector)?;
        let rows = self
            .controls_for_pack(&pack)?
            .into_iter()
            .map(|control| {
                let cached = self.cache.fetch(control.id)?;
                Ok((control, cached))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(summarize(&pack, &rows, self.clock.today(), self.engine))
    }
}

/// Error raised by the control status service.
#[derive(Debug, thiserror::Error)]
pub enum StatusServiceError {
    #[error("control {0} not found")]
    ControlNotFound(ControlId),
    #[error("evidence item {0} not found")]
    EvidenceNotFound(EvidenceId),
    #[error("no standard pack found for {0}")]
    PackNotFound(String),
    #[error("note {0} not found")]
    NoteNotFound(NoteId),
    #[error("note text must not be blank")]
    BlankNote,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Alert(#[from] AlertError),
}
