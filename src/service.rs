//! Gateway service: sequences control-plane, resolver and executor calls
//! and reshapes their results for the simplified API.

use std::sync::Arc;

use serde_json::Value;

use crate::api::{ConnectionResolver, ControlPlane, NeonClient};
use crate::config::Config;
use crate::error::GatewayError;
use crate::models::{
    BranchSummary, ConnectionDescriptor, CreateBranchRequest, CreatedBranch, EndpointSummary,
    ProjectSummary, RunSqlRequest, SqlResult,
};
use crate::sql::{HttpSqlExecutor, SqlExecutor};

const CREATED: u16 = 201;

/// Gateway service shared by all request handlers. Holds no mutable state.
#[derive(Clone)]
pub struct NeonService {
    control_plane: Arc<dyn ControlPlane>,
    resolver: Arc<dyn ConnectionResolver>,
    executor: Arc<dyn SqlExecutor>,
}

impl NeonService {
    /// Create a NeonService talking to the configured Neon API.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let client = Arc::new(NeonClient::new(config)?);
        let executor = Arc::new(HttpSqlExecutor::new(config.local)?);

        Ok(Self::new(client.clone(), client, executor))
    }

    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        resolver: Arc<dyn ConnectionResolver>,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        Self {
            control_plane,
            resolver,
            executor,
        }
    }

    /// Health check implementation.
    pub async fn health(&self) -> Value {
        let ok = match self.control_plane.ping().await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("Failed to reach Neon API: {}", e);
                false
            }
        };

        serde_json::json!({
            "status": if ok { "healthy" } else { "unhealthy" },
            "api_connected": ok,
            "version": env!("CARGO_PKG_VERSION"),
        })
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>, GatewayError> {
        let projects = self.control_plane.list_projects().await?;
        Ok(projects.into_iter().map(Into::into).collect())
    }

    pub async fn list_branches(&self, project_id: &str) -> Result<Vec<BranchSummary>, GatewayError> {
        let branches = self.control_plane.list_branches(project_id).await?;
        Ok(branches.into_iter().map(Into::into).collect())
    }

    pub async fn list_endpoints(
        &self,
        project_id: &str,
    ) -> Result<Vec<EndpointSummary>, GatewayError> {
        let endpoints = self.control_plane.list_endpoints(project_id).await?;
        Ok(endpoints.into_iter().map(Into::into).collect())
    }

    /// Creates a branch with one read-write endpoint. Anything short of a
    /// `201 Created` carrying an endpoint is a generic failure.
    pub async fn create_branch(
        &self,
        project_id: &str,
        request: CreateBranchRequest,
    ) -> Result<CreatedBranch, GatewayError> {
        let creation = self
            .control_plane
            .create_branch(project_id, &request.name, &request.base_branch_id)
            .await
            .map_err(|e| {
                tracing::error!("Branch creation request failed: {}", e);
                match e {
                    GatewayError::UpstreamApi { status, .. } => GatewayError::BranchCreation {
                        status: Some(status),
                    },
                    _ => GatewayError::BranchCreation { status: None },
                }
            })?;

        if creation.status != CREATED {
            return Err(GatewayError::BranchCreation {
                status: Some(creation.status),
            });
        }

        let endpoint = creation
            .endpoint_ids
            .into_iter()
            .next()
            .ok_or(GatewayError::BranchCreation {
                status: Some(creation.status),
            })?;

        tracing::info!(branch = %creation.branch_id, %endpoint, "branch created");
        Ok(CreatedBranch {
            branch: creation.branch_id,
            endpoint,
        })
    }

    /// Resolves a pooled connection string, then runs the statement. The
    /// executor is not reached unless resolution succeeded.
    pub async fn run_sql(
        &self,
        project_id: &str,
        request: RunSqlRequest,
    ) -> Result<SqlResult, GatewayError> {
        tracing::info!(project_id, "SQL for project");

        let descriptor = ConnectionDescriptor::new(
            project_id,
            request.branch_id,
            request.endpoint_id,
            request.database_name,
            request.role_name,
        );

        let uri = self.resolver.resolve_connection_uri(&descriptor).await?;
        self.executor.execute(&uri, &request.sql).await
    }
}
