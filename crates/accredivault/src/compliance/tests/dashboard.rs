use super::common::*;
use crate::compliance::catalog::{RuleKind, RuleScope};
use crate::compliance::dashboard::{is_near_due, summarize};
use crate::compliance::domain::{Actor, ControlId};
use crate::compliance::evaluation::ComputedStatus;
use crate::compliance::repository::StatusCacheStore;
use crate::compliance::service::PackSelector;
use crate::config::EngineConfig;

#[test]
fn near_due_window_is_inclusive_and_excludes_overdue() {
    assert!(is_near_due(ComputedStatus::Ready, Some(today()), today(), 14));
    assert!(is_near_due(ComputedStatus::Ready, Some(days_ahead(14)), today(), 14));
    assert!(!is_near_due(ComputedStatus::Ready, Some(days_ahead(15)), today(), 14));
    assert!(!is_near_due(ComputedStatus::Ready, Some(days_ago(1)), today(), 14));
    assert!(!is_near_due(ComputedStatus::Overdue, Some(days_ahead(3)), today(), 14));
    assert!(!is_near_due(ComputedStatus::InProgress, None, today(), 14));
}

#[test]
fn dashboard_reads_cached_rows_per_section() {
    let fixture = Fixture::new();
    fixture.add_rule(rule(
        "rom-logs",
        RuleScope::Section("ROM".to_string()),
        RuleKind::Frequency { frequency_days: 30 },
    ));
    fixture.link(ROM_1, evidence("old", "LOG", days_ago(45)));
    fixture.link(ROM_2, evidence("recent", "LOG", days_ago(20)));

    let summary = fixture
        .service
        .dashboard(&PackSelector::Latest)
        .expect("dashboard");

    assert_eq!(summary.pack_version, "2024.1");
    assert_eq!(summary.totals.total_controls, 4);
    assert_eq!(summary.totals.counts.overdue, 1);
    assert_eq!(summary.totals.counts.ready, 1);
    assert_eq!(summary.totals.counts.not_started, 2);
    assert_eq!(summary.totals.counts.near_due, 1);

    let codes: Vec<&str> = summary
        .sections
        .iter()
        .map(|section| section.section_code.as_str())
        .collect();
    assert_eq!(codes, vec!["HR", "ROM", "UNK"]);
    let rom = &summary.sections[1];
    assert_eq!(rom.total, 2);
    assert_eq!(rom.counts.overdue, 1);
    assert_eq!(rom.counts.ready, 1);

    assert_eq!(summary.upcoming_due.len(), 1);
    assert_eq!(summary.upcoming_due[0].control_id, ROM_2);
    assert_eq!(summary.upcoming_due[0].next_due_date, days_ahead(10));
}

#[test]
fn upcoming_due_is_sorted_and_capped() {
    let fixture = Fixture::new();
    fixture.add_rule(rule(
        "all-logs",
        RuleScope::Section("ROM".to_string()),
        RuleKind::Frequency { frequency_days: 30 },
    ));
    fixture.add_rule(rule(
        "hr-logs",
        RuleScope::Control(HR_1),
        RuleKind::Frequency { frequency_days: 30 },
    ));
    fixture.link(ROM_1, evidence("a", "LOG", days_ago(10)));
    fixture.link(ROM_2, evidence("b", "LOG", days_ago(10)));
    fixture.link(HR_1, evidence("c", "LOG", days_ago(25)));

    let rows: Vec<_> = [ROM_2, HR_1, ROM_1, MALFORMED]
        .into_iter()
        .map(|id| {
            let control = fixture.service.control(id).expect("control");
            let cached = fixture.store.fetch(id).expect("fetch");
            (control, cached)
        })
        .collect();

    let summary = summarize(
        &pack(),
        &rows,
        today(),
        EngineConfig {
            near_due_days: 14,
            upcoming_due_limit: 2,
        },
    );

    let codes: Vec<&str> = summary
        .upcoming_due
        .iter()
        .map(|entry| entry.control_code.as_str())
        .collect();
    assert_eq!(codes, vec!["PHC-HR-001", "PHC-ROM-001"]);
    assert_eq!(summary.totals.counts.not_started, 1);
}

#[test]
fn totals_serialize_with_status_keys() {
    let fixture = Fixture::new();
    fixture
        .service
        .recompute_and_persist(ControlId(10), &Actor::System)
        .expect("recompute");

    let summary = fixture
        .service
        .dashboard(&PackSelector::Version("2024.1".to_string()))
        .expect("dashboard");
    let payload = serde_json::to_value(&summary).expect("serialize");

    assert_eq!(payload["totals"]["total_controls"], 4);
    assert_eq!(payload["totals"]["NOT_STARTED"], 4);
    assert_eq!(payload["totals"]["NEAR_DUE"], 0);
    assert_eq!(payload["sections"][0]["section_code"], "HR");
    assert_eq!(summary.today, today());
}
