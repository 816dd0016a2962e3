mod aggregate;
mod freshness;
mod kinds;

pub use aggregate::{
    applicable_rules, compute_control_status, ComputedStatus, ControlInputs, ControlStatus,
    StatusDetails,
};
pub use freshness::VerificationFreshness;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::{EvidenceRule, RuleId, RuleKind};
use super::domain::EvidenceItem;

/// Per-rule signal feeding the control-level status decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusHint {
    Ok,
    Missing,
    Overdue,
}

/// Outcome of evaluating one rule against the evidence that matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub rule_id: RuleId,
    pub satisfied: bool,
    pub status_hint: StatusHint,
    pub due_date: Option<NaiveDate>,
    /// For window rules this is the in-window count; for expiry, the currently valid count.
    pub matched_count: usize,
    pub last_match_date: Option<NaiveDate>,
}

impl RuleVerdict {
    fn pending(rule: &EvidenceRule, matched: &[&EvidenceItem]) -> Self {
        Self {
            rule_id: rule.id.clone(),
            satisfied: false,
            status_hint: StatusHint::Missing,
            due_date: None,
            matched_count: matched.len(),
            last_match_date: matched.iter().map(|item| item.event_date).max(),
        }
    }

    /// Unsatisfied and either flagged overdue or carrying a due date already in the past.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status_hint == StatusHint::Overdue
            || (!self.satisfied && self.due_date.is_some_and(|due| due < today))
    }
}

/// Evidence from the corpus that passes the rule's category and subtype allow-lists.
pub fn matching_evidence<'a>(
    rule: &EvidenceRule,
    corpus: &'a [EvidenceItem],
) -> Vec<&'a EvidenceItem> {
    corpus.iter().filter(|item| rule.accepts(item)).collect()
}

/// Evaluate one rule. `matched` must already be filtered by [`matching_evidence`].
pub fn evaluate(rule: &EvidenceRule, matched: &[&EvidenceItem], today: NaiveDate) -> RuleVerdict {
    let verdict = RuleVerdict::pending(rule, matched);

    match rule.kind {
        RuleKind::OneTime => kinds::one_time(verdict, rule.min_items),
        RuleKind::Frequency { frequency_days } => {
            kinds::frequency(verdict, frequency_days, today)
        }
        RuleKind::RollingWindow { window_days } | RuleKind::CountInWindow { window_days } => {
            kinds::window(verdict, matched, window_days, rule.min_items, today)
        }
        RuleKind::Expiry => kinds::expiry(verdict, matched, today),
    }
}
