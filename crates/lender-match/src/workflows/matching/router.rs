use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::workflows::catalogue::CatalogueRepository;
use crate::workflows::repository::RepositoryError;

use super::domain::{ApplicationId, ApplicationSubmission};
use super::repository::ApplicationRepository;
use super::service::{MatchingService, MatchingServiceError};

/// Router builder exposing application intake and match retrieval.
pub fn matching_router<A, C>(service: Arc<MatchingService<A, C>>) -> Router
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<A, C>).get(list_handler::<A, C>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<A, C>),
        )
        .route(
            "/api/v1/applications/:application_id/matches",
            get(matches_handler::<A, C>),
        )
        .route(
            "/api/v1/applications/:application_id/rematch",
            post(rematch_handler::<A, C>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<A, C>(
    State(service): State<Arc<MatchingService<A, C>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    match service.submit(submission) {
        Ok(record) => {
            service.schedule(record.application.id);
            (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<A, C>(
    State(service): State<Arc<MatchingService<A, C>>>,
) -> Response
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    match service.list() {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.status_view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<A, C>(
    State(service): State<Arc<MatchingService<A, C>>>,
    Path(application_id): Path<String>,
) -> Response
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    let Ok(id) = application_id.parse::<ApplicationId>() else {
        return not_found(&application_id);
    };
    match service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn matches_handler<A, C>(
    State(service): State<Arc<MatchingService<A, C>>>,
    Path(application_id): Path<String>,
) -> Response
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    let Ok(id) = application_id.parse::<ApplicationId>() else {
        return not_found(&application_id);
    };
    match service.matches(&id) {
        Ok(views) => (StatusCode::OK, axum::Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rematch_handler<A, C>(
    State(service): State<Arc<MatchingService<A, C>>>,
    Path(application_id): Path<String>,
) -> Response
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    let Ok(id) = application_id.parse::<ApplicationId>() else {
        return not_found(&application_id);
    };
    match service.rematch(&id) {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

fn not_found(application_id: &str) -> Response {
    let payload = json!({
        "error": format!("application '{application_id}' not found"),
    });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}

fn error_response(error: MatchingServiceError) -> Response {
    let status = match &error {
        MatchingServiceError::MissingApplicantName | MatchingServiceError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MatchingServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        MatchingServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        MatchingServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
