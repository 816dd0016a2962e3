use chrono::{Days, NaiveDate};

use super::{RuleVerdict, StatusHint};
use crate::compliance::domain::EvidenceItem;

fn hint_for(satisfied: bool) -> StatusHint {
    if satisfied {
        StatusHint::Ok
    } else {
        StatusHint::Overdue
    }
}

fn days_after(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Satisfied once enough evidence exists; never overdue.
pub(super) fn one_time(mut verdict: RuleVerdict, min_items: u32) -> RuleVerdict {
    verdict.satisfied = verdict.matched_count >= min_items as usize;
    verdict.status_hint = if verdict.satisfied {
        StatusHint::Ok
    } else {
        StatusHint::Missing
    };
    verdict
}

/// Due `frequency_days` after the latest match; no match at all is overdue.
pub(super) fn frequency(
    mut verdict: RuleVerdict,
    frequency_days: u32,
    today: NaiveDate,
) -> RuleVerdict {
    let Some(last_match) = verdict.last_match_date else {
        verdict.status_hint = StatusHint::Overdue;
        return verdict;
    };

    let due_date = days_after(last_match, frequency_days);
    verdict.due_date = Some(due_date);
    verdict.satisfied = due_date >= today;
    verdict.status_hint = hint_for(verdict.satisfied);
    verdict
}

/// Shared by rolling-window and count-in-window rules.
pub(super) fn window(
    mut verdict: RuleVerdict,
    matched: &[&EvidenceItem],
    window_days: u32,
    min_items: u32,
    today: NaiveDate,
) -> RuleVerdict {
    let window_start = days_before(today, window_days);
    let count_in_window = matched
        .iter()
        .filter(|item| item.event_date >= window_start)
        .count();
    let required = min_items.max(1) as usize;

    verdict.matched_count = count_in_window;
    verdict.due_date = verdict
        .last_match_date
        .map(|last_match| days_after(last_match, window_days));
    verdict.satisfied = count_in_window >= required;
    verdict.status_hint = hint_for(verdict.satisfied);
    verdict
}

/// Only items still valid today count; the earliest validity end is the next due date.
pub(super) fn expiry(
    mut verdict: RuleVerdict,
    matched: &[&EvidenceItem],
    today: NaiveDate,
) -> RuleVerdict {
    let valid: Vec<&EvidenceItem> = matched
        .iter()
        .copied()
        .filter(|item| item.valid_until.is_some_and(|until| until >= today))
        .collect();

    verdict.matched_count = valid.len();
    verdict.satisfied = !valid.is_empty();
    verdict.due_date = valid.iter().filter_map(|item| item.valid_until).min();
    verdict.last_match_date = valid.iter().map(|item| item.event_date).max();
    verdict.status_hint = hint_for(verdict.satisfied);
    verdict
}
