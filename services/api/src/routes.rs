use crate::infra::{ApiService, AppState};
use accredivault::compliance::{control_status_router, ComplianceAlert};
use accredivault::error::AppError;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlertQuery {
    #[serde(default)]
    pub(crate) active: bool,
}

pub(crate) fn with_control_routes(service: Arc<ApiService>) -> axum::Router {
    control_status_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/alerts", axum::routing::get(alerts_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Compliance alerts, newest first. `?active=true` hides cleared ones.
pub(crate) async fn alerts_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<ComplianceAlert>>, AppError> {
    let alerts = if query.active {
        state.alerts.active()?
    } else {
        state.alerts.alerts()?
    };
    Ok(Json(alerts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_service;
    use accredivault::compliance::{
        Actor, AlertKind, Control, ControlId, EvidenceId, EvidenceItem, EvidenceRule,
        InMemoryComplianceStore, PackId, RuleId, RuleKind, RuleScope, StandardPack,
    };
    use accredivault::config::EngineConfig;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{NaiveDate, TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    fn seeded_store() -> InMemoryComplianceStore {
        let store = InMemoryComplianceStore::default();
        store
            .insert_pack(StandardPack {
                id: PackId(1),
                authority_code: "PHC".to_string(),
                name: "Clinic Standards".to_string(),
                version: "2024.1".to_string(),
                created_at: Utc
                    .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                    .single()
                    .expect("valid timestamp"),
            })
            .expect("pack");
        store
            .insert_control(Control {
                id: ControlId(10),
                pack_id: PackId(1),
                control_code: "PHC-ROM-001".to_string(),
                section: "Rooms".to_string(),
                sort_order: 1,
            })
            .expect("control");
        store
            .insert_rule(EvidenceRule {
                id: RuleId("logs".to_string()),
                pack_id: PackId(1),
                scope: RuleScope::Section("ROM".to_string()),
                kind: RuleKind::Frequency { frequency_days: 30 },
                min_items: 1,
                requires_verification: false,
                acceptable_categories: Vec::new(),
                acceptable_subtypes: Vec::new(),
                enabled: true,
                notes: None,
            })
            .expect("rule");
        store
            .insert_evidence(EvidenceItem {
                id: EvidenceId("log".to_string()),
                title: "Cleaning log".to_string(),
                category: "LOG".to_string(),
                subtype: None,
                event_date: NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
                valid_from: None,
                valid_until: None,
            })
            .expect("evidence");
        store
    }

    fn app() -> (axum::Router, Arc<ApiService>) {
        let (service, alerts) =
            build_service(seeded_store(), EngineConfig::default(), Some(today()))
                .expect("service");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            alerts,
        };
        let router = with_control_routes(service.clone()).layer(Extension(state));
        (router, service)
    }

    #[tokio::test]
    async fn health_and_ready_report_ok() {
        let (router, _) = app();
        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn alerts_endpoint_lists_overdue_controls() {
        let (router, service) = app();
        service
            .link_evidence(
                ControlId(10),
                EvidenceId("log".to_string()),
                None,
                &Actor::user("auditor"),
            )
            .expect("link");

        let response = router
            .oneshot(
                Request::get("/api/v1/alerts?active=true")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        let alerts: Vec<ComplianceAlert> = serde_json::from_slice(&body).expect("alerts");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertKind::Overdue);
        assert_eq!(alerts[0].control_code, "PHC-ROM-001");
    }
}
