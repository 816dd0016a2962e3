use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::compliance::alerts::AlertLedger;
use crate::compliance::catalog::{EvidenceRule, RuleId, RuleKind, RuleScope};
use crate::compliance::clock::ManualClock;
use crate::compliance::domain::{
    Actor, Control, ControlId, ControlNote, ControlVerification, EvidenceId, EvidenceItem,
    EvidenceLink, PackId, StandardPack,
};
use crate::compliance::memory::InMemoryComplianceStore;
use crate::compliance::repository::{
    ComplianceRepository, ControlStatusCache, RepositoryError, StatusCacheStore,
};
use crate::compliance::service::ControlStatusService;
use crate::config::EngineConfig;

pub(super) type MemoryService =
    ControlStatusService<InMemoryComplianceStore, InMemoryComplianceStore, AlertLedger>;

pub(super) const ROM_1: ControlId = ControlId(10);
pub(super) const ROM_2: ControlId = ControlId(11);
pub(super) const HR_1: ControlId = ControlId(20);
pub(super) const MALFORMED: ControlId = ControlId(30);

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

pub(super) fn days_ago(days: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(days)).expect("valid date")
}

pub(super) fn days_ahead(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).expect("valid date")
}

pub(super) fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn pack() -> StandardPack {
    StandardPack {
        id: PackId(1),
        authority_code: "PHC".to_string(),
        name: "Primary Health Clinic Standards".to_string(),
        version: "2024.1".to_string(),
        created_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(super) fn control(id: ControlId, code: &str, sort_order: i32) -> Control {
    Control {
        id,
        pack_id: PackId(1),
        control_code: code.to_string(),
        section: String::new(),
        sort_order,
    }
}

pub(super) fn rule(id: &str, scope: RuleScope, kind: RuleKind) -> EvidenceRule {
    EvidenceRule {
        id: RuleId(id.to_string()),
        pack_id: PackId(1),
        scope,
        kind,
        min_items: 1,
        requires_verification: false,
        acceptable_categories: Vec::new(),
        acceptable_subtypes: Vec::new(),
        enabled: true,
        notes: None,
    }
}

pub(super) fn evidence(id: &str, category: &str, event_date: NaiveDate) -> EvidenceItem {
    EvidenceItem {
        id: EvidenceId(id.to_string()),
        title: format!("Evidence {id}"),
        category: category.to_string(),
        subtype: None,
        event_date,
        valid_from: None,
        valid_until: None,
    }
}

pub(super) fn expiring(id: &str, event_date: NaiveDate, valid_until: NaiveDate) -> EvidenceItem {
    EvidenceItem {
        valid_from: Some(event_date),
        valid_until: Some(valid_until),
        ..evidence(id, "LICENSE", event_date)
    }
}

pub(super) fn auditor() -> Actor {
    Actor::user("auditor")
}

/// One pack with two ROM controls, one HR control and one malformed code.
pub(super) struct Fixture {
    pub(super) store: InMemoryComplianceStore,
    pub(super) clock: Arc<ManualClock>,
    pub(super) alerts: Arc<AlertLedger>,
    pub(super) service: Arc<MemoryService>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        let store = InMemoryComplianceStore::default();
        store.insert_pack(pack()).expect("pack");
        for control in [
            control(ROM_1, "PHC-ROM-001", 1),
            control(ROM_2, "PHC-ROM-002", 2),
            control(HR_1, "PHC-HR-001", 3),
            control(MALFORMED, "LEGACY001", 4),
        ] {
            store.insert_control(control).expect("control");
        }

        let clock = Arc::new(ManualClock::new(start_of_day()));
        let alerts = Arc::new(AlertLedger::new(14));
        let service = Arc::new(
            ControlStatusService::with_clock(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                alerts.clone(),
                clock.clone(),
            )
            .with_engine_config(EngineConfig {
                near_due_days: 14,
                upcoming_due_limit: 20,
            }),
        );

        Self {
            store,
            clock,
            alerts,
            service,
        }
    }

    pub(super) fn add_rule(&self, rule: EvidenceRule) {
        self.store.insert_rule(rule).expect("rule");
    }

    /// Store the item and link it through the service a minute after the previous write.
    pub(super) fn link(&self, control_id: ControlId, item: EvidenceItem) -> ControlStatusCache {
        self.clock.advance(Duration::minutes(1));
        let evidence_id = item.id.clone();
        self.store.insert_evidence(item).expect("evidence");
        self.service
            .link_evidence(control_id, evidence_id, None, &auditor())
            .expect("link evidence")
    }
}

/// Repository whose every read reports an unavailable backend.
pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ComplianceRepository for UnavailableRepository {
    fn pack(&self, _id: PackId) -> Result<Option<StandardPack>, RepositoryError> {
        unavailable()
    }

    fn latest_pack(&self) -> Result<Option<StandardPack>, RepositoryError> {
        unavailable()
    }

    fn pack_by_version(&self, _version: &str) -> Result<Option<StandardPack>, RepositoryError> {
        unavailable()
    }

    fn control(&self, _id: ControlId) -> Result<Option<Control>, RepositoryError> {
        unavailable()
    }

    fn controls_for_pack(&self, _pack_id: PackId) -> Result<Vec<Control>, RepositoryError> {
        unavailable()
    }

    fn rules_for_pack(&self, _pack_id: PackId) -> Result<Vec<EvidenceRule>, RepositoryError> {
        unavailable()
    }

    fn evidence_item(&self, _id: &EvidenceId) -> Result<Option<EvidenceItem>, RepositoryError> {
        unavailable()
    }

    fn linked_evidence(&self, _control_id: ControlId) -> Result<Vec<EvidenceItem>, RepositoryError> {
        unavailable()
    }

    fn latest_link_at(
        &self,
        _control_id: ControlId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        unavailable()
    }

    fn verifications(
        &self,
        _control_id: ControlId,
    ) -> Result<Vec<ControlVerification>, RepositoryError> {
        unavailable()
    }

    fn insert_link(&self, _link: EvidenceLink) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn remove_link(
        &self,
        _control_id: ControlId,
        _evidence_id: &EvidenceId,
    ) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn append_verification(&self, _record: ControlVerification) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn notes(&self, _control_id: ControlId) -> Result<Vec<ControlNote>, RepositoryError> {
        unavailable()
    }

    fn insert_note(&self, _note: ControlNote) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn update_note(&self, _note: ControlNote) -> Result<(), RepositoryError> {
        unavailable()
    }
}

/// Cache that refuses writes for a single control.
pub(super) struct FlakyCache {
    pub(super) inner: InMemoryComplianceStore,
    pub(super) broken: ControlId,
}

impl StatusCacheStore for FlakyCache {
    fn upsert_by_control(
        &self,
        row: ControlStatusCache,
    ) -> Result<Option<ControlStatusCache>, RepositoryError> {
        if row.control_id == self.broken {
            return unavailable();
        }
        self.inner.upsert_by_control(row)
    }

    fn fetch(&self, control_id: ControlId) -> Result<Option<ControlStatusCache>, RepositoryError> {
        self.inner.fetch(control_id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
