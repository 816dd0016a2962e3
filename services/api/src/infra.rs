use accredivault::compliance::{
    AlertLedger, ComplianceSnapshot, ControlStatusService, InMemoryComplianceStore, ManualClock,
    StatusServiceError,
};
use accredivault::config::EngineConfig;
use accredivault::error::AppError;
use chrono::{NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ApiService =
    ControlStatusService<InMemoryComplianceStore, InMemoryComplianceStore, AlertLedger>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) alerts: Arc<AlertLedger>,
}

/// Load the snapshot into a fresh store; no path yields an empty store.
pub(crate) fn load_store(snapshot: Option<&Path>) -> Result<InMemoryComplianceStore, AppError> {
    match snapshot {
        Some(path) => {
            let store = ComplianceSnapshot::from_path(path)?.into_store()?;
            tracing::info!(snapshot = %path.display(), "compliance snapshot loaded");
            Ok(store)
        }
        None => Ok(InMemoryComplianceStore::default()),
    }
}

/// Service over the store; a `today` override pins the clock to that date.
///
/// Verification ids continue after the ones already in the store.
pub(crate) fn build_service(
    store: InMemoryComplianceStore,
    engine: EngineConfig,
    today: Option<NaiveDate>,
) -> Result<(Arc<ApiService>, Arc<AlertLedger>), AppError> {
    let existing = store.verification_ids().map_err(StatusServiceError::from)?;
    let alerts = Arc::new(AlertLedger::new(engine.near_due_days));
    let repository = Arc::new(store.clone());
    let cache = Arc::new(store);

    let service = match today {
        Some(today) => {
            let now = today.and_time(Utc::now().time()).and_utc();
            ControlStatusService::with_clock(
                repository,
                cache,
                alerts.clone(),
                Arc::new(ManualClock::new(now)),
            )
        }
        None => ControlStatusService::new(repository, cache, alerts.clone()),
    };

    let service = service
        .with_engine_config(engine)
        .resume_verification_sequence(&existing);
    Ok((Arc::new(service), alerts))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
