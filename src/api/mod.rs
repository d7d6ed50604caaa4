//! Neon control-plane access.

pub mod client;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::{Branch, BranchCreation, ConnectionDescriptor, Endpoint, Project};

pub use client::NeonClient;

/// Control-plane operations. Each call is one authenticated round trip.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, GatewayError>;

    async fn list_branches(&self, project_id: &str) -> Result<Vec<Branch>, GatewayError>;

    async fn list_endpoints(&self, project_id: &str) -> Result<Vec<Endpoint>, GatewayError>;

    /// Creates `name` from `base_branch_id` together with one read-write
    /// endpoint.
    async fn create_branch(
        &self,
        project_id: &str,
        name: &str,
        base_branch_id: &str,
    ) -> Result<BranchCreation, GatewayError>;

    /// Returns whether the control plane answers an authenticated request.
    async fn ping(&self) -> Result<bool, GatewayError>;
}

/// Turns a connection descriptor into a pooled connection string.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn resolve_connection_uri(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<String, GatewayError>;
}
