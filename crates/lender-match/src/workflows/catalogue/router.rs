use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::schema::{ParameterDefinition, ParameterPatch, RegistryError};
use crate::workflows::matching::ApplicationRepository;
use crate::workflows::repository::RepositoryError;

use super::domain::{LenderId, PolicyId, RuleDraft, RuleId};
use super::repository::CatalogueRepository;
use super::service::{CatalogueError, CatalogueService, LenderDraft, PolicyDraft, PolicyPatch};

type SharedService<C, A> = Arc<CatalogueService<C, A>>;

#[derive(Debug, Deserialize)]
pub(crate) struct ParameterListQuery {
    #[serde(default = "default_active_only")]
    active_only: bool,
}

fn default_active_only() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ParameterDeleteQuery {
    #[serde(default)]
    hard_delete: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PolicyListQuery {
    #[serde(default)]
    lender_id: Option<String>,
}

/// Router builder exposing parameter, lender and policy administration.
pub fn catalogue_router<C, A>(service: SharedService<C, A>) -> Router
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/parameters",
            get(list_parameters::<C, A>).post(create_parameter::<C, A>),
        )
        .route(
            "/api/v1/parameters/:key",
            get(get_parameter::<C, A>)
                .put(update_parameter::<C, A>)
                .delete(delete_parameter::<C, A>),
        )
        .route(
            "/api/v1/lenders",
            get(list_lenders::<C, A>).post(create_lender::<C, A>),
        )
        .route("/api/v1/lenders/:lender_id", get(get_lender::<C, A>))
        .route(
            "/api/v1/lenders/:lender_id/policies",
            get(lender_policies::<C, A>).post(create_policy::<C, A>),
        )
        .route("/api/v1/policies", get(list_policies::<C, A>))
        .route(
            "/api/v1/policies/:policy_id",
            get(get_policy::<C, A>)
                .patch(update_policy::<C, A>)
                .delete(delete_policy::<C, A>),
        )
        .route(
            "/api/v1/policies/:policy_id/rules",
            post(add_rule::<C, A>).put(replace_rules::<C, A>),
        )
        .route(
            "/api/v1/policies/:policy_id/rules/:rule_id",
            delete(delete_rule::<C, A>),
        )
        .with_state(service)
}

pub(crate) async fn list_parameters<C, A>(
    State(service): State<SharedService<C, A>>,
    Query(query): Query<ParameterListQuery>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    (StatusCode::OK, axum::Json(service.parameters(query.active_only))).into_response()
}

pub(crate) async fn create_parameter<C, A>(
    State(service): State<SharedService<C, A>>,
    axum::Json(definition): axum::Json<ParameterDefinition>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::CREATED, service.create_parameter(definition))
}

pub(crate) async fn get_parameter<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(key): Path<String>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.parameter(&key))
}

pub(crate) async fn update_parameter<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(key): Path<String>,
    axum::Json(patch): axum::Json<ParameterPatch>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.update_parameter(&key, patch))
}

pub(crate) async fn delete_parameter<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(key): Path<String>,
    Query(query): Query<ParameterDeleteQuery>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.delete_parameter(&key, query.hard_delete))
}

pub(crate) async fn list_lenders<C, A>(State(service): State<SharedService<C, A>>) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.lenders())
}

pub(crate) async fn create_lender<C, A>(
    State(service): State<SharedService<C, A>>,
    axum::Json(draft): axum::Json<LenderDraft>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    respond(StatusCode::CREATED, service.create_lender(draft))
}

pub(crate) async fn get_lender<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(lender_id): Path<String>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<LenderId>(&lender_id, "lender") {
        Ok(id) => respond(StatusCode::OK, service.lender(&id)),
        Err(response) => response,
    }
}

pub(crate) async fn lender_policies<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(lender_id): Path<String>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<LenderId>(&lender_id, "lender") {
        Ok(id) => respond(StatusCode::OK, service.lender_policies(&id)),
        Err(response) => response,
    }
}

pub(crate) async fn create_policy<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(lender_id): Path<String>,
    axum::Json(draft): axum::Json<PolicyDraft>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<LenderId>(&lender_id, "lender") {
        Ok(id) => respond(StatusCode::CREATED, service.create_policy(id, draft)),
        Err(response) => response,
    }
}

pub(crate) async fn list_policies<C, A>(
    State(service): State<SharedService<C, A>>,
    Query(query): Query<PolicyListQuery>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    let lender_id = match query.lender_id.as_deref().map(|raw| parse_id::<LenderId>(raw, "lender")) {
        Some(Ok(id)) => Some(id),
        Some(Err(response)) => return response,
        None => None,
    };
    respond(StatusCode::OK, service.policies(lender_id))
}

pub(crate) async fn get_policy<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(policy_id): Path<String>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<PolicyId>(&policy_id, "policy") {
        Ok(id) => respond(StatusCode::OK, service.policy(&id)),
        Err(response) => response,
    }
}

pub(crate) async fn update_policy<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(policy_id): Path<String>,
    axum::Json(patch): axum::Json<PolicyPatch>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<PolicyId>(&policy_id, "policy") {
        Ok(id) => respond(StatusCode::OK, service.update_policy(&id, patch)),
        Err(response) => response,
    }
}

pub(crate) async fn delete_policy<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(policy_id): Path<String>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    let id = match parse_id::<PolicyId>(&policy_id, "policy") {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.delete_policy(&id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn replace_rules<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(policy_id): Path<String>,
    axum::Json(drafts): axum::Json<Vec<RuleDraft>>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<PolicyId>(&policy_id, "policy") {
        Ok(id) => respond(StatusCode::OK, service.replace_rules(&id, drafts)),
        Err(response) => response,
    }
}

pub(crate) async fn add_rule<C, A>(
    State(service): State<SharedService<C, A>>,
    Path(policy_id): Path<String>,
    axum::Json(draft): axum::Json<RuleDraft>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    match parse_id::<PolicyId>(&policy_id, "policy") {
        Ok(id) => respond(StatusCode::CREATED, service.add_rule(&id, draft)),
        Err(response) => response,
    }
}

pub(crate) async fn delete_rule<C, A>(
    State(service): State<SharedService<C, A>>,
    Path((policy_id, rule_id)): Path<(String, String)>,
) -> Response
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    let ids = parse_id::<PolicyId>(&policy_id, "policy")
        .and_then(|policy| parse_id::<RuleId>(&rule_id, "rule").map(|rule| (policy, rule)));
    let (policy_id, rule_id) = match ids {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    match service.delete_rule(&policy_id, &rule_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T, Response> {
    raw.parse::<T>().map_err(|_| {
        let payload = json!({
            "error": format!("{kind} '{raw}' not found"),
        });
        (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
    })
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, CatalogueError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: CatalogueError) -> Response {
    let status = match &error {
        CatalogueError::UnknownParameter(_)
        | CatalogueError::EmptyName
        | CatalogueError::Registry(RegistryError::InvalidKey) => StatusCode::UNPROCESSABLE_ENTITY,
        CatalogueError::ParameterInUse(_)
        | CatalogueError::Registry(RegistryError::Duplicate(_))
        | CatalogueError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        CatalogueError::Registry(RegistryError::NotFound(_))
        | CatalogueError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        CatalogueError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
