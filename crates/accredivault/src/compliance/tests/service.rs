use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::compliance::alerts::{AlertKind, AlertLedger};
use crate::compliance::catalog::{RuleKind, RuleScope};
use crate::compliance::domain::{Actor, ControlId, EvidenceId, VerificationStatus};
use crate::compliance::evaluation::ComputedStatus;
use crate::compliance::memory::InMemoryComplianceStore;
use crate::compliance::repository::{ComplianceRepository, RepositoryError, StatusCacheStore};
use crate::compliance::service::{ControlStatusService, PackSelector, StatusServiceError};

#[test]
fn recompute_is_idempotent_apart_from_timestamp() {
    let fixture = Fixture::new();
    fixture.add_rule(rule(
        "freq",
        RuleScope::Control(ROM_1),
        RuleKind::Frequency { frequency_days: 30 },
    ));
    fixture.link(ROM_1, evidence("log", "LOG", days_ago(5)));

    let first = fixture
        .service
        .recompute_and_persist(ROM_1, &Actor::System)
        .expect("first recompute");
    fixture.clock.advance(Duration::minutes(5));
    let second = fixture
        .service
        .recompute_and_persist(ROM_1, &Actor::System)
        .expect("second recompute");

    assert!(second.computed_at > first.computed_at);
    let mut normalized = second.clone();
    normalized.computed_at = first.computed_at;
    assert_eq!(normalized, first);

    assert_eq!(fixture.store.fetch(ROM_1).expect("fetch"), Some(second));
}

#[test]
fn dropping_the_cache_and_recomputing_restores_rows() {
    let fixture = Fixture::new();
    fixture.add_rule(rule("once", RuleScope::Control(ROM_1), RuleKind::OneTime));
    let before = fixture.link(ROM_1, evidence("policy", "POLICY", days_ago(3)));

    fixture.store.clear_status_cache().expect("clear");
    assert_eq!(fixture.store.fetch(ROM_1).expect("fetch"), None);

    let after = fixture
        .service
        .recompute_and_persist(ROM_1, &Actor::System)
        .expect("recompute");
    assert_eq!(after.computed_status, before.computed_status);
    assert_eq!(after.details, before.details);
}

#[test]
fn frequency_rule_moves_from_overdue_to_ready() {
    let fixture = Fixture::new();
    fixture.add_rule(rule(
        "freq",
        RuleScope::Control(ROM_1),
        RuleKind::Frequency { frequency_days: 30 },
    ));

    let row = fixture.link(ROM_1, evidence("old", "LOG", days_ago(45)));
    assert_eq!(row.computed_status, ComputedStatus::Overdue);

    let row = fixture.link(ROM_1, evidence("fresh", "LOG", days_ago(5)));
    assert_eq!(row.computed_status, ComputedStatus::Ready);
    assert_eq!(row.next_due_date, Some(days_ahead(25)));
}

#[test]
fn new_evidence_after_verification_requires_reverification() {
    let fixture = Fixture::new();
    let mut once = rule("once", RuleScope::Control(ROM_1), RuleKind::OneTime);
    once.requires_verification = true;
    fixture.add_rule(once);

    let row = fixture.link(ROM_1, evidence("sop", "POLICY", days_ago(10)));
    assert_eq!(row.computed_status, ComputedStatus::Ready);

    fixture.clock.advance(Duration::minutes(1));
    let outcome = fixture
        .service
        .verify(ROM_1, Some("looks complete".to_string()), &auditor())
        .expect("verify");
    assert_eq!(outcome.status.computed_status, ComputedStatus::Verified);
    assert_eq!(outcome.verification.status, VerificationStatus::Verified);
    assert_eq!(outcome.verification.verified_by.as_deref(), Some("auditor"));
    assert_eq!(
        outcome.verification.evidence_snapshot_at,
        fixture.store.latest_link_at(ROM_1).expect("link watermark")
    );

    let row = fixture.link(ROM_1, evidence("sop-v2", "POLICY", days_ago(1)));
    assert_eq!(row.computed_status, ComputedStatus::Ready);
    assert!(!row.details.verification_fresh);

    fixture.clock.advance(Duration::minutes(1));
    let outcome = fixture
        .service
        .verify(ROM_1, None, &auditor())
        .expect("re-verify");
    assert_eq!(outcome.status.computed_status, ComputedStatus::Verified);
}

#[test]
fn rejection_does_not_verify() {
    let fixture = Fixture::new();
    let mut once = rule("once", RuleScope::Control(ROM_1), RuleKind::OneTime);
    once.requires_verification = true;
    fixture.add_rule(once);
    fixture.link(ROM_1, evidence("sop", "POLICY", days_ago(10)));

    let outcome = fixture
        .service
        .reject(ROM_1, Some("unsigned".to_string()), &auditor())
        .expect("reject");
    assert_eq!(outcome.verification.status, VerificationStatus::Rejected);
    assert_eq!(outcome.status.computed_status, ComputedStatus::Ready);
    assert_eq!(fixture.store.verifications(ROM_1).expect("records").len(), 1);
}

#[test]
fn verification_ids_are_sequential() {
    let fixture = Fixture::new();
    let first = fixture
        .service
        .verify(ROM_1, None, &Actor::Anonymous)
        .expect("verify");
    let second = fixture
        .service
        .reject(ROM_1, None, &Actor::Anonymous)
        .expect("reject");
    assert_eq!(first.verification.id.0, "ver-000001");
    assert_eq!(second.verification.id.0, "ver-000002");
    assert_eq!(first.verification.verified_by, None);
}

#[test]
fn verification_ids_resume_after_stored_records() {
    let fixture = Fixture::new();
    fixture
        .service
        .verify(ROM_1, None, &Actor::Anonymous)
        .expect("verify");

    let restarted = ControlStatusService::with_clock(
        Arc::new(fixture.store.clone()),
        Arc::new(fixture.store.clone()),
        fixture.alerts.clone(),
        fixture.clock.clone(),
    );
    let err = restarted
        .verify(ROM_1, None, &Actor::Anonymous)
        .expect_err("stale sequence reuses ver-000001");
    assert!(matches!(
        err,
        StatusServiceError::Repository(RepositoryError::Conflict)
    ));

    let existing = fixture.store.verification_ids().expect("ids");
    let resumed = restarted.resume_verification_sequence(&existing);
    let outcome = resumed
        .verify(ROM_1, None, &Actor::Anonymous)
        .expect("verify after resume");
    assert_eq!(outcome.verification.id.0, "ver-000002");
    assert_eq!(fixture.store.verifications(ROM_1).expect("records").len(), 2);
}

#[test]
fn unlinking_last_evidence_returns_to_not_started() {
    let fixture = Fixture::new();
    fixture.add_rule(rule("once", RuleScope::Control(ROM_1), RuleKind::OneTime));
    fixture.link(ROM_1, evidence("sop", "POLICY", days_ago(10)));

    let row = fixture
        .service
        .unlink_evidence(ROM_1, &EvidenceId("sop".to_string()), &auditor())
        .expect("unlink");
    assert_eq!(row.computed_status, ComputedStatus::NotStarted);

    let err = fixture
        .service
        .unlink_evidence(ROM_1, &EvidenceId("sop".to_string()), &auditor())
        .expect_err("already unlinked");
    assert!(matches!(
        err,
        StatusServiceError::Repository(RepositoryError::NotFound)
    ));
}

#[test]
fn linking_records_actor_and_rejects_duplicates() {
    let fixture = Fixture::new();
    fixture.link(ROM_1, evidence("sop", "POLICY", days_ago(10)));

    let err = fixture
        .service
        .link_evidence(ROM_1, EvidenceId("sop".to_string()), None, &auditor())
        .expect_err("duplicate link");
    assert!(matches!(
        err,
        StatusServiceError::Repository(RepositoryError::Conflict)
    ));

    let err = fixture
        .service
        .link_evidence(ROM_1, EvidenceId("missing".to_string()), None, &auditor())
        .expect_err("unknown evidence");
    assert!(matches!(err, StatusServiceError::EvidenceNotFound(_)));
}

#[test]
fn missing_control_is_not_found_without_side_effects() {
    let fixture = Fixture::new();
    let err = fixture
        .service
        .recompute_and_persist(ControlId(999), &Actor::System)
        .expect_err("unknown control");
    assert!(matches!(err, StatusServiceError::ControlNotFound(ControlId(999))));
    assert_eq!(fixture.store.fetch(ControlId(999)).expect("fetch"), None);
    assert!(fixture.alerts.alerts().expect("alerts").is_empty());
}

#[test]
fn repository_outage_fails_loudly() {
    let store = InMemoryComplianceStore::default();
    let service = ControlStatusService::new(
        Arc::new(UnavailableRepository),
        Arc::new(store),
        Arc::new(AlertLedger::default()),
    );

    let err = service
        .recompute_and_persist(ROM_1, &Actor::System)
        .expect_err("outage propagates");
    assert!(matches!(
        err,
        StatusServiceError::Repository(RepositoryError::Unavailable(_))
    ));
}

#[test]
fn overdue_transitions_open_and_clear_alerts() {
    let fixture = Fixture::new();
    fixture.add_rule(rule(
        "freq",
        RuleScope::Control(ROM_1),
        RuleKind::Frequency { frequency_days: 30 },
    ));

    fixture.link(ROM_1, evidence("old", "LOG", days_ago(45)));
    let active = fixture.alerts.active().expect("alerts");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alert_type, AlertKind::Overdue);
    assert_eq!(active[0].control_code, "PHC-ROM-001");

    fixture
        .service
        .recompute_and_persist(ROM_1, &Actor::System)
        .expect("recompute");
    assert_eq!(fixture.alerts.active().expect("alerts").len(), 1);

    fixture.link(ROM_1, evidence("fresh", "LOG", days_ago(20)));
    let active = fixture.alerts.active().expect("alerts");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alert_type, AlertKind::NearDue);
    assert_eq!(fixture.alerts.alerts().expect("alerts").len(), 2);
}

#[test]
fn packs_resolve_by_version_or_latest() {
    let fixture = Fixture::new();
    let mut newer = pack();
    newer.id = crate::compliance::domain::PackId(2);
    newer.version = "2025.1".to_string();
    newer.created_at += Duration::days(365);
    fixture.store.insert_pack(newer).expect("pack");

    let latest = fixture
        .service
        .resolve_pack(&PackSelector::Latest)
        .expect("latest");
    assert_eq!(latest.version, "2025.1");

    let pinned = fixture
        .service
        .resolve_pack(&PackSelector::Version("2024.1".to_string()))
        .expect("pinned");
    assert_eq!(pinned.id, crate::compliance::domain::PackId(1));

    let err = fixture
        .service
        .resolve_pack(&PackSelector::Version("1999".to_string()))
        .expect_err("unknown version");
    assert!(matches!(err, StatusServiceError::PackNotFound(_)));
}
