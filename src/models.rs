//! Data models for Neon API responses and the gateway's reshaped output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Database used when a SQL request does not name one.
pub const DEFAULT_DATABASE_NAME: &str = "neondb";

/// Role used when a SQL request does not name one.
pub const DEFAULT_ROLE_NAME: &str = "neondb_owner";

/// Neon project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// Neon branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary: bool,
}

/// Neon compute endpoint, kept exactly as upstream sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(pub Map<String, Value>);

/// Outcome of a branch creation call.
#[derive(Debug, Clone)]
pub struct BranchCreation {
    /// HTTP status the control plane answered with.
    pub status: u16,
    pub branch_id: String,
    pub endpoint_ids: Vec<String>,
}

/// `GET /projects` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

/// `GET /projects/:projectId/branches` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSummary {
    pub id: String,
    pub name: String,
    pub primary: bool,
}

impl From<Branch> for BranchSummary {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            name: branch.name,
            primary: branch.primary,
        }
    }
}

/// Endpoint fields exposed by `GET /projects/:projectId/endpoints`.
pub const ENDPOINT_FIELDS: [&str; 7] = [
    "created_at",
    "last_active",
    "project_id",
    "autoscaling_limit_max_cu",
    "autoscaling_limit_min_cu",
    "branch_id",
    "id",
];

/// `GET /projects/:projectId/endpoints` element: the [`ENDPOINT_FIELDS`]
/// present upstream, values untouched. Anything else is dropped, so the
/// contract stays stable as upstream grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointSummary(pub Map<String, Value>);

impl From<Endpoint> for EndpointSummary {
    fn from(Endpoint(mut upstream): Endpoint) -> Self {
        let picked = ENDPOINT_FIELDS
            .iter()
            .filter_map(|field| upstream.remove(*field).map(|v| (field.to_string(), v)))
            .collect();
        Self(picked)
    }
}

/// `POST /projects/:projectId/branch` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequest {
    pub name: String,
    pub base_branch_id: String,
}

/// `POST /projects/:projectId/branch` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedBranch {
    pub branch: String,
    pub endpoint: String,
}

/// `POST /projects/:projectId/sql` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSqlRequest {
    pub sql: String,
    pub branch_id: String,
    pub endpoint_id: String,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

/// Identifies which pooled connection string to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub project_id: String,
    pub branch_id: String,
    pub endpoint_id: String,
    pub database_name: String,
    pub role_name: String,
}

impl ConnectionDescriptor {
    /// Builds a descriptor. An omitted database falls back to
    /// [`DEFAULT_DATABASE_NAME`] (`neondb`) and an omitted role to
    /// [`DEFAULT_ROLE_NAME`] (`neondb_owner`).
    pub fn new(
        project_id: impl Into<String>,
        branch_id: impl Into<String>,
        endpoint_id: impl Into<String>,
        database_name: Option<String>,
        role_name: Option<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            branch_id: branch_id.into(),
            endpoint_id: endpoint_id.into(),
            database_name: database_name.unwrap_or_else(|| DEFAULT_DATABASE_NAME.into()),
            role_name: role_name.unwrap_or_else(|| DEFAULT_ROLE_NAME.into()),
        }
    }
}

/// One result row; the schema is whatever the query produced.
pub type SqlRow = Map<String, Value>;

/// Rows returned by a statement, in result order.
pub type SqlResult = Vec<SqlRow>;
