use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dashboard::is_near_due;
use super::domain::ControlId;
use super::evaluation::ComputedStatus;
use super::repository::{AlertError, AlertPublisher, StatusTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Overdue,
    NearDue,
}

impl AlertKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::NearDue => "Near due",
        }
    }
}

/// Alert raised for a control; `cleared_at` is set once the condition stops holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub id: String,
    pub control_id: ControlId,
    pub control_code: String,
    pub alert_type: AlertKind,
    pub triggered_at: DateTime<Utc>,
    pub cleared_at: Option<DateTime<Utc>>,
}

impl ComplianceAlert {
    pub fn is_active(&self) -> bool {
        self.cleared_at.is_none()
    }
}

/// In-process alert book. Opens at most one active alert per control and kind,
/// and clears it when a later transition no longer qualifies.
#[derive(Debug)]
pub struct AlertLedger {
    near_due_days: u32,
    alerts: Mutex<Vec<ComplianceAlert>>,
    sequence: AtomicU64,
}

impl AlertLedger {
    pub fn new(near_due_days: u32) -> Self {
        Self {
            near_due_days,
            alerts: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<ComplianceAlert>>, AlertError> {
        self.alerts
            .lock()
            .map_err(|_| AlertError::Transport("alert ledger mutex poisoned".to_string()))
    }

    /// Every alert, newest first.
    pub fn alerts(&self) -> Result<Vec<ComplianceAlert>, AlertError> {
        let mut alerts = self.guard()?.clone();
        alerts.sort_by(|a, b| {
            b.triggered_at
                .cmp(&a.triggered_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(alerts)
    }

    pub fn active(&self) -> Result<Vec<ComplianceAlert>, AlertError> {
        Ok(self
            .alerts()?
            .into_iter()
            .filter(ComplianceAlert::is_active)
            .collect())
    }

    fn reconcile(
        &self,
        alerts: &mut Vec<ComplianceAlert>,
        transition: &StatusTransition,
        kind: AlertKind,
        should_be_active: bool,
    ) {
        let active = alerts.iter_mut().find(|alert| {
            alert.control_id == transition.control_id
                && alert.alert_type == kind
                && alert.is_active()
        });

        match (active, should_be_active) {
            (None, true) => {
                let id = self.sequence.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    control_id = %transition.control_id,
                    control_code = %transition.control_code,
                    alert = kind.label(),
                    "compliance alert opened"
                );
                alerts.push(ComplianceAlert {
                    id: format!("alert-{id:06}"),
                    control_id: transition.control_id,
                    control_code: transition.control_code.clone(),
                    alert_type: kind,
                    triggered_at: transition.at,
                    cleared_at: None,
                });
            }
            (Some(alert), false) => {
                tracing::info!(
                    control_id = %transition.control_id,
                    alert = kind.label(),
                    "compliance alert cleared"
                );
                alert.cleared_at = Some(transition.at);
            }
            _ => {}
        }
    }
}

impl Default for AlertLedger {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().near_due_days)
    }
}

impl AlertPublisher for AlertLedger {
    fn publish(&self, transition: &StatusTransition) -> Result<(), AlertError> {
        let overdue = transition.current == ComputedStatus::Overdue;
        let near_due = is_near_due(
            transition.current,
            transition.next_due_date,
            transition.today,
            self.near_due_days,
        );

        let mut alerts = self.guard()?;
        self.reconcile(&mut alerts, transition, AlertKind::Overdue, overdue);
        self.reconcile(&mut alerts, transition, AlertKind::NearDue, near_due);
        Ok(())
    }
}
