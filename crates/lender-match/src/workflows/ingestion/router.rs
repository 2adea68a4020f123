use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::catalogue::{CatalogueRepository, LenderId};
use crate::workflows::repository::RepositoryError;

use super::domain::{GuidelineDocument, TaskId};
use super::repository::IngestionRepository;
use super::service::{IngestionError, IngestionService};

const MAX_DOCUMENT_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    file_name: String,
}

/// Router builder exposing guideline upload and task polling.
pub fn ingestion_router<T, C>(service: Arc<IngestionService<T, C>>) -> Router
where
    T: IngestionRepository + 'static,
    C: CatalogueRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/lenders/:lender_id/guidelines",
            post(upload_handler::<T, C>).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES)),
        )
        .route("/api/v1/ingestions/:task_id", get(task_handler::<T, C>))
        .with_state(service)
}

pub(crate) async fn upload_handler<T, C>(
    State(service): State<Arc<IngestionService<T, C>>>,
    Path(lender_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response
where
    T: IngestionRepository + 'static,
    C: CatalogueRepository + 'static,
{
    let Ok(lender_id) = lender_id.parse::<LenderId>() else {
        let payload = json!({
            "error": format!("lender '{lender_id}' not found"),
        });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };

    let document = GuidelineDocument::new(query.file_name, body.to_vec());
    match service.submit(lender_id, document) {
        Ok(task) => {
            service.schedule(task.id);
            (StatusCode::ACCEPTED, axum::Json(task)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn task_handler<T, C>(
    State(service): State<Arc<IngestionService<T, C>>>,
    Path(task_id): Path<String>,
) -> Response
where
    T: IngestionRepository + 'static,
    C: CatalogueRepository + 'static,
{
    let Ok(id) = task_id.parse::<TaskId>() else {
        let payload = json!({
            "error": format!("ingestion task '{task_id}' not found"),
        });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };
    match service.get(&id) {
        Ok(task) => (StatusCode::OK, axum::Json(task)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: IngestionError) -> Response {
    let status = match &error {
        IngestionError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        IngestionError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        IngestionError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        IngestionError::Repository(RepositoryError::Unavailable(_))
        | IngestionError::Extraction(_)
        | IngestionError::StatusNotRecorded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
