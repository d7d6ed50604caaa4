//! HTTP route handlers.
//!
//! Each route validates its inputs and hands off to [`NeonService`].

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::{
    BranchSummary, CreateBranchRequest, CreatedBranch, EndpointSummary, ProjectSummary,
    RunSqlRequest, SqlResult,
};
use crate::service::NeonService;

/// Creates the router with all gateway endpoints.
pub fn create_router() -> Router<NeonService> {
    Router::new()
        .route("/health", get(handle_health))
        .route("/projects", get(list_projects))
        .route("/projects/:project_id/branches", get(list_branches))
        .route("/projects/:project_id/endpoints", get(list_endpoints))
        .route("/projects/:project_id/branch", post(create_branch))
        .route("/projects/:project_id/sql", post(run_sql))
}

fn require_project_id(project_id: &str) -> Result<&str, GatewayError> {
    let trimmed = project_id.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "projectId must be a non-empty string".into(),
        ));
    }
    Ok(trimmed)
}

fn require_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| GatewayError::InvalidRequest(rejection.body_text()))
}

/// `GET /health`
pub async fn handle_health(State(service): State<NeonService>) -> Json<Value> {
    Json(service.health().await)
}

/// `GET /projects`
pub async fn list_projects(
    State(service): State<NeonService>,
) -> Result<Json<Vec<ProjectSummary>>, GatewayError> {
    Ok(Json(service.list_projects().await?))
}

/// `GET /projects/:projectId/branches`
pub async fn list_branches(
    State(service): State<NeonService>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<BranchSummary>>, GatewayError> {
    let project_id = require_project_id(&project_id)?;
    Ok(Json(service.list_branches(project_id).await?))
}

/// `GET /projects/:projectId/endpoints`
pub async fn list_endpoints(
    State(service): State<NeonService>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<EndpointSummary>>, GatewayError> {
    let project_id = require_project_id(&project_id)?;
    Ok(Json(service.list_endpoints(project_id).await?))
}

/// `POST /projects/:projectId/branch`
pub async fn create_branch(
    State(service): State<NeonService>,
    Path(project_id): Path<String>,
    body: Result<Json<CreateBranchRequest>, JsonRejection>,
) -> Result<Json<CreatedBranch>, GatewayError> {
    let project_id = require_project_id(&project_id)?;
    let request = require_body(body)?;
    Ok(Json(service.create_branch(project_id, request).await?))
}

/// `POST /projects/:projectId/sql`
pub async fn run_sql(
    State(service): State<NeonService>,
    Path(project_id): Path<String>,
    body: Result<Json<RunSqlRequest>, JsonRejection>,
) -> Result<Json<SqlResult>, GatewayError> {
    let project_id = require_project_id(&project_id)?;
    let request = require_body(body)?;
    Ok(Json(service.run_sql(project_id, request).await?))
}
