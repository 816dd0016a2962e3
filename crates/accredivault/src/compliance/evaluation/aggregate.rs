use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::freshness::VerificationFreshness;
use super::{evaluate, matching_evidence, RuleVerdict};
use crate::compliance::catalog::EvidenceRule;
use crate::compliance::domain::{Control, ControlId, ControlVerification, EvidenceItem};

/// Overall control status.
///
/// `NOT_STARTED < IN_PROGRESS < OVERDUE` by severity; `READY` and `VERIFIED` are the
/// satisfied states, split by the verification gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputedStatus {
    NotStarted,
    InProgress,
    Ready,
    Verified,
    Overdue,
}

impl ComputedStatus {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::NotStarted,
            Self::InProgress,
            Self::Ready,
            Self::Verified,
            Self::Overdue,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Ready => "READY",
            Self::Verified => "VERIFIED",
            Self::Overdue => "OVERDUE",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Ready => "Ready",
            Self::Verified => "Verified",
            Self::Overdue => "Overdue",
        }
    }

    pub const fn severity(self) -> u8 {
        match self {
            Self::Verified => 0,
            Self::Ready => 1,
            Self::NotStarted => 2,
            Self::InProgress => 3,
            Self::Overdue => 4,
        }
    }
}

/// Everything the aggregator reads for one control.
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs<'a> {
    pub control: &'a Control,
    /// Applicable rules, see [`applicable_rules`].
    pub rules: &'a [&'a EvidenceRule],
    pub evidence: &'a [EvidenceItem],
    pub verifications: &'a [ControlVerification],
    /// Most recent link timestamp for the control, if any link exists.
    pub latest_linked_at: Option<DateTime<Utc>>,
}

/// Persisted explanation of how a status was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    pub section_code: String,
    pub last_evidence_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub rule_results: Vec<RuleVerdict>,
    pub latest_verified_at: Option<DateTime<Utc>>,
    pub verification_fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStatus {
    pub control_id: ControlId,
    pub status: ComputedStatus,
    pub last_evidence_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub details: StatusDetails,
}

/// Enabled rules of the control's pack scoped to the control or to its section.
pub fn applicable_rules<'a>(
    control: &Control,
    catalog: &'a [EvidenceRule],
) -> Vec<&'a EvidenceRule> {
    let section_code = control.section_code();
    catalog
        .iter()
        .filter(|rule| rule.enabled && rule.pack_id == control.pack_id)
        .filter(|rule| rule.applies_to(control.id, section_code))
        .collect()
}

pub fn compute_control_status(inputs: ControlInputs<'_>, today: NaiveDate) -> ControlStatus {
    let verdicts: Vec<RuleVerdict> = inputs
        .rules
        .iter()
        .map(|rule| {
            let matched = matching_evidence(rule, inputs.evidence);
            evaluate(rule, &matched, today)
        })
        .collect();

    let freshness = VerificationFreshness::assess(inputs.verifications, inputs.latest_linked_at);
    let status = decide_status(&inputs, &verdicts, freshness, today);

    let next_due_date = verdicts.iter().filter_map(|verdict| verdict.due_date).min();
    let last_evidence_date = inputs.evidence.iter().map(|item| item.event_date).max();

    ControlStatus {
        control_id: inputs.control.id,
        status,
        last_evidence_date,
        next_due_date,
        details: StatusDetails {
            section_code: inputs.control.section_code().to_string(),
            last_evidence_date,
            next_due_date,
            rule_results: verdicts,
            latest_verified_at: freshness.latest_verified_at,
            verification_fresh: freshness.fresh,
        },
    }
}

fn decide_status(
    inputs: &ControlInputs<'_>,
    verdicts: &[RuleVerdict],
    freshness: VerificationFreshness,
    today: NaiveDate,
) -> ComputedStatus {
    if inputs.evidence.is_empty() {
        return ComputedStatus::NotStarted;
    }

    if verdicts.iter().any(|verdict| verdict.is_overdue(today)) {
        return ComputedStatus::Overdue;
    }

    // Evidence without any applicable rule stays in progress.
    if !verdicts.is_empty() && verdicts.iter().all(|verdict| verdict.satisfied) {
        let gated = inputs.rules.iter().any(|rule| rule.requires_verification);
        if gated && freshness.fresh {
            return ComputedStatus::Verified;
        }
        return ComputedStatus::Ready;
    }

    ComputedStatus::InProgress
}
