use chrono::NaiveDate;
use serde::Serialize;

use super::dashboard::{is_near_due, StatusCounts};
use super::domain::{Actor, ControlId};
use super::evaluation::ComputedStatus;
use super::repository::{AlertPublisher, ComplianceRepository, StatusCacheStore};
use super::service::{ControlStatusService, PackSelector, StatusServiceError};

/// Raw batch flags as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub pack_version: Option<String>,
    pub latest: bool,
    pub only_overdue: bool,
    pub only_near_due: Option<i64>,
    pub dry_run: bool,
    pub no_fail_on_overdue: bool,
}

/// Which computed controls are counted and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BatchFilter {
    All,
    OnlyOverdue,
    OnlyNearDue { window_days: u32 },
}

/// Validated batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub selector: PackSelector,
    pub filter: BatchFilter,
    pub dry_run: bool,
    pub fail_on_overdue: bool,
    /// Near-due window used for the `NEAR_DUE` count when the filter does not name one.
    pub near_due_days: u32,
}

impl BatchRequest {
    pub fn from_args(args: BatchArgs, near_due_days: u32) -> Result<Self, BatchSelectorError> {
        let selector = match (args.pack_version, args.latest) {
            (Some(_), true) | (None, false) => return Err(BatchSelectorError::PackSelector),
            (Some(version), false) => {
                let version = version.trim().to_string();
                if version.is_empty() {
                    return Err(BatchSelectorError::BlankVersion);
                }
                PackSelector::Version(version)
            }
            (None, true) => PackSelector::Latest,
        };

        let filter = match (args.only_overdue, args.only_near_due) {
            (true, Some(_)) => return Err(BatchSelectorError::ConflictingFilters),
            (true, None) => BatchFilter::OnlyOverdue,
            (false, Some(days)) => {
                let window_days =
                    u32::try_from(days).map_err(|_| BatchSelectorError::InvalidWindow(days))?;
                BatchFilter::OnlyNearDue { window_days }
            }
            (false, None) => BatchFilter::All,
        };

        Ok(Self {
            selector,
            filter,
            dry_run: args.dry_run,
            fail_on_overdue: !args.no_fail_on_overdue,
            near_due_days,
        })
    }

    fn near_due_window(&self) -> u32 {
        match self.filter {
            BatchFilter::OnlyNearDue { window_days } => window_days,
            _ => self.near_due_days,
        }
    }

    fn selects(&self, status: ComputedStatus, near_due: bool) -> bool {
        match self.filter {
            BatchFilter::All => true,
            BatchFilter::OnlyOverdue => status == ComputedStatus::Overdue,
            BatchFilter::OnlyNearDue { .. } => near_due,
        }
    }
}

/// Control whose recompute or persist failed; the batch moves on past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFailure {
    pub control_id: ControlId,
    pub control_code: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Success,
    OverdueDetected,
    Failed,
}

impl BatchOutcome {
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::OverdueDetected | Self::Failed => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub pack_version: String,
    pub today: NaiveDate,
    pub filter: BatchFilter,
    pub dry_run: bool,
    pub fail_on_overdue: bool,
    pub total_controls: usize,
    pub selected: usize,
    pub persisted: usize,
    pub counts: StatusCounts,
    /// OVERDUE controls among everything computed, whether or not the filter selected them.
    pub overdue_seen: usize,
    pub failures: Vec<ControlFailure>,
}

impl BatchReport {
    pub fn outcome(&self) -> BatchOutcome {
        if !self.failures.is_empty() {
            BatchOutcome::Failed
        } else if self.fail_on_overdue && self.overdue_seen > 0 {
            BatchOutcome::OverdueDetected
        } else {
            BatchOutcome::Success
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_controls == 0
    }
}

/// Recompute every control of the selected pack as of `today`.
///
/// Controls that fail are recorded and skipped. Only controls passing the filter are
/// counted and persisted (unless the request is a dry run), but an OVERDUE control
/// anywhere in the pack still drives the failure signal.
pub fn run_batch<R, S, A>(
    service: &ControlStatusService<R, S, A>,
    request: &BatchRequest,
    today: NaiveDate,
) -> Result<BatchReport, BatchError>
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let pack = service.resolve_pack(&request.selector)?;
    let controls = service.controls_for_pack(&pack)?;
    let window = request.near_due_window();
    let actor = Actor::System;

    let mut report = BatchReport {
        pack_version: pack.version.clone(),
        today,
        filter: request.filter,
        dry_run: request.dry_run,
        fail_on_overdue: request.fail_on_overdue,
        total_controls: controls.len(),
        selected: 0,
        persisted: 0,
        counts: StatusCounts::default(),
        overdue_seen: 0,
        failures: Vec::new(),
    };

    for control in &controls {
        let status = match service.compute(control, today) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(
                    control_id = %control.id,
                    control_code = %control.control_code,
                    error = %err,
                    "control recompute failed"
                );
                report.failures.push(ControlFailure {
                    control_id: control.id,
                    control_code: control.control_code.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        if status.status == ComputedStatus::Overdue {
            report.overdue_seen += 1;
        }
        let near_due = is_near_due(status.status, status.next_due_date, today, window);
        if !request.selects(status.status, near_due) {
            continue;
        }
        report.selected += 1;
        report.counts.record(status.status, near_due);

        if request.dry_run {
            continue;
        }
        match service.persist(control, status, today, &actor) {
            Ok(_) => report.persisted += 1,
            Err(err) => {
                tracing::warn!(
                    control_id = %control.id,
                    control_code = %control.control_code,
                    error = %err,
                    "control status persist failed"
                );
                report.failures.push(ControlFailure {
                    control_id: control.id,
                    control_code: control.control_code.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        pack_version = %report.pack_version,
        today = %today,
        total = report.total_controls,
        selected = report.selected,
        persisted = report.persisted,
        overdue = report.overdue_seen,
        failures = report.failures.len(),
        dry_run = report.dry_run,
        "batch recompute finished"
    );

    Ok(report)
}

/// Rejected combination of batch flags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchSelectorError {
    #[error("Use exactly one of --pack-version <str> or --latest")]
    PackSelector,
    #[error("--pack-version must not be blank")]
    BlankVersion,
    #[error("--only-overdue and --only-near-due cannot be combined")]
    ConflictingFilters,
    #[error("--only-near-due must be a non-negative number of days, got {0}")]
    InvalidWindow(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Selector(#[from] BatchSelectorError),
    #[error(transparent)]
    Service(#[from] StatusServiceError),
}
