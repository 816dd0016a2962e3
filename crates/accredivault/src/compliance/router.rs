use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, ControlId, EvidenceId, NoteId, NoteType};
use super::repository::{AlertPublisher, ComplianceRepository, RepositoryError, StatusCacheStore};
use super::service::{ControlStatusService, PackSelector, StatusServiceError};

/// Header carrying the acting user's name.
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Debug, Default, Deserialize)]
pub struct VerificationRequest {
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkEvidenceRequest {
    pub evidence_item_id: EvidenceId,
    #[serde(default)]
    pub relevance_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note_type: NoteType,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteResolutionRequest {
    pub resolved: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub pack_version: Option<String>,
}

/// Router exposing control status reads, evidence links, verifications, notes and the dashboard.
pub fn control_status_router<R, S, A>(service: Arc<ControlStatusService<R, S, A>>) -> Router
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/controls/:control_id/status",
            get(status_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/verify",
            post(verify_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/reject",
            post(reject_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/evidence",
            post(link_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/evidence/:evidence_id",
            delete(unlink_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/notes",
            get(list_notes_handler::<R, S, A>).post(add_note_handler::<R, S, A>),
        )
        .route(
            "/api/v1/controls/:control_id/notes/:note_id",
            patch(resolve_note_handler::<R, S, A>),
        )
        .route(
            "/api/v1/dashboard/summary",
            get(dashboard_handler::<R, S, A>),
        )
        .with_state(service)
}

fn actor_from(headers: &HeaderMap) -> Actor {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Actor::user)
        .unwrap_or(Actor::Anonymous)
}

fn error_response(error: StatusServiceError) -> Response {
    let status = match &error {
        StatusServiceError::ControlNotFound(_)
        | StatusServiceError::EvidenceNotFound(_)
        | StatusServiceError::PackNotFound(_)
        | StatusServiceError::NoteNotFound(_)
        | StatusServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        StatusServiceError::BlankNote => StatusCode::UNPROCESSABLE_ENTITY,
        StatusServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        StatusServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        StatusServiceError::Alert(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn status_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
    headers: HeaderMap,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    match service.recompute_and_persist(ControlId(control_id), &actor_from(&headers)) {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
    headers: HeaderMap,
    body: Option<Json<VerificationRequest>>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let remarks = body.and_then(|Json(request)| request.remarks);
    match service.verify(ControlId(control_id), remarks, &actor_from(&headers)) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reject_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
    headers: HeaderMap,
    body: Option<Json<VerificationRequest>>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let remarks = body.and_then(|Json(request)| request.remarks);
    match service.reject(ControlId(control_id), remarks, &actor_from(&headers)) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn link_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<LinkEvidenceRequest>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let actor = actor_from(&headers);
    match service.link_evidence(
        ControlId(control_id),
        request.evidence_item_id,
        request.relevance_note,
        &actor,
    ) {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn unlink_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path((control_id, evidence_id)): Path<(u64, String)>,
    headers: HeaderMap,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let actor = actor_from(&headers);
    match service.unlink_evidence(ControlId(control_id), &EvidenceId(evidence_id), &actor) {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_notes_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    match service.notes(ControlId(control_id)) {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn add_note_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path(control_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<NoteRequest>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let actor = actor_from(&headers);
    match service.add_note(ControlId(control_id), request.note_type, &request.text, &actor) {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn resolve_note_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Path((control_id, note_id)): Path<(u64, String)>,
    headers: HeaderMap,
    Json(request): Json<NoteResolutionRequest>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let actor = actor_from(&headers);
    match service.set_note_resolved(
        ControlId(control_id),
        &NoteId(note_id),
        request.resolved,
        &actor,
    ) {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dashboard_handler<R, S, A>(
    State(service): State<Arc<ControlStatusService<R, S, A>>>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    R: ComplianceRepository + 'static,
    S: StatusCacheStore + 'static,
    A: AlertPublisher + 'static,
{
    let selector = match query.pack_version.filter(|version| !version.trim().is_empty()) {
        Some(version) => PackSelector::Version(version),
        None => PackSelector::Latest,
    };
    match service.dashboard(&selector) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}
