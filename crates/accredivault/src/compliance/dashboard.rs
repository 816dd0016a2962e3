use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Control, ControlId, StandardPack};
use super::evaluation::ComputedStatus;
use super::repository::ControlStatusCache;
use crate::config::EngineConfig;

/// Status histogram keyed the way the dashboard and batch summary print it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "NOT_STARTED")]
    pub not_started: usize,
    #[serde(rename = "IN_PROGRESS")]
    pub in_progress: usize,
    #[serde(rename = "READY")]
    pub ready: usize,
    #[serde(rename = "VERIFIED")]
    pub verified: usize,
    #[serde(rename = "OVERDUE")]
    pub overdue: usize,
    /// Overlaps the other buckets; see [`is_near_due`].
    #[serde(rename = "NEAR_DUE")]
    pub near_due: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ComputedStatus, near_due: bool) {
        match status {
            ComputedStatus::NotStarted => self.not_started += 1,
            ComputedStatus::InProgress => self.in_progress += 1,
            ComputedStatus::Ready => self.ready += 1,
            ComputedStatus::Verified => self.verified += 1,
            ComputedStatus::Overdue => self.overdue += 1,
        }
        if near_due {
            self.near_due += 1;
        }
    }

    pub fn get(&self, status: ComputedStatus) -> usize {
        match status {
            ComputedStatus::NotStarted => self.not_started,
            ComputedStatus::InProgress => self.in_progress,
            ComputedStatus::Ready => self.ready,
            ComputedStatus::Verified => self.verified,
            ComputedStatus::Overdue => self.overdue,
        }
    }

    pub fn total(&self) -> usize {
        ComputedStatus::ordered()
            .into_iter()
            .map(|status| self.get(status))
            .sum()
    }
}

/// Not overdue, with a due date inside `[today, today + window_days]`.
pub fn is_near_due(
    status: ComputedStatus,
    next_due_date: Option<NaiveDate>,
    today: NaiveDate,
    window_days: u32,
) -> bool {
    if status == ComputedStatus::Overdue {
        return false;
    }
    let Some(due) = next_due_date else {
        return false;
    };
    let horizon = today
        .checked_add_days(chrono::Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MAX);
    due >= today && due <= horizon
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardTotals {
    pub total_controls: usize,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionBreakdown {
    pub section_code: String,
    pub total: usize,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDue {
    pub control_id: ControlId,
    pub control_code: String,
    pub section_code: String,
    pub next_due_date: NaiveDate,
    pub computed_status: ComputedStatus,
}

/// Pack-level rollup of cached statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub pack_version: String,
    pub today: NaiveDate,
    pub totals: DashboardTotals,
    pub sections: Vec<SectionBreakdown>,
    pub upcoming_due: Vec<UpcomingDue>,
}

/// Build the summary from each control and its cached row. Controls that were
/// never computed count as `NOT_STARTED`.
pub fn summarize(
    pack: &StandardPack,
    rows: &[(Control, Option<ControlStatusCache>)],
    today: NaiveDate,
    config: EngineConfig,
) -> DashboardSummary {
    let mut totals = StatusCounts::default();
    let mut sections: BTreeMap<String, StatusCounts> = BTreeMap::new();
    let mut upcoming = Vec::new();

    for (control, cached) in rows {
        let (status, next_due) = cached
            .as_ref()
            .map(|row| (row.computed_status, row.next_due_date))
            .unwrap_or((ComputedStatus::NotStarted, None));
        let near_due = is_near_due(status, next_due, today, config.near_due_days);

        totals.record(status, near_due);
        sections
            .entry(control.section_code().to_string())
            .or_default()
            .record(status, near_due);

        if let Some(due) = next_due.filter(|due| *due >= today) {
            upcoming.push(UpcomingDue {
                control_id: control.id,
                control_code: control.control_code.clone(),
                section_code: control.section_code().to_string(),
                next_due_date: due,
                computed_status: status,
            });
        }
    }

    upcoming.sort_by(|a, b| {
        a.next_due_date
            .cmp(&b.next_due_date)
            .then_with(|| a.control_code.cmp(&b.control_code))
    });
    upcoming.truncate(config.upcoming_due_limit);

    DashboardSummary {
        pack_version: pack.version.clone(),
        today,
        totals: DashboardTotals {
            total_controls: rows.len(),
            counts: totals,
        },
        sections: sections
            .into_iter()
            .map(|(section_code, counts)| SectionBreakdown {
                section_code,
                total: counts.total(),
                counts,
            })
            .collect(),
        upcoming_due: upcoming,
    }
}
