//! Neon HTTP API client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{ConnectionResolver, ControlPlane};
use crate::config::Config;
use crate::error::GatewayError;
use crate::models::{Branch, BranchCreation, ConnectionDescriptor, Endpoint, Project};

/// Neon HTTP API client with persistent connection.
#[derive(Clone)]
pub struct NeonClient {
    client: Client,
    api_url: Url,
    api_key: String,
}

impl NeonClient {
    /// Create a new Neon client from the gateway configuration.
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        Self::with_base_url(&config.api_url, &config.api_key)
    }

    /// Create a client against an explicit control-plane base URL.
    pub fn with_base_url(api_url: &str, api_key: &str) -> Result<Self, GatewayError> {
        let invalid = || GatewayError::ApiUrl(api_url.to_string());
        let api_url = Url::parse(api_url).map_err(|_| invalid())?;
        if api_url.cannot_be_a_base() {
            return Err(invalid());
        }

        let client = Client::builder().pool_max_idle_per_host(5).build()?;

        Ok(Self {
            client,
            api_url,
            api_key: api_key.to_string(),
        })
    }

    /// Appends `segments` to the base URL. Each segment is percent-encoded,
    /// so an id can never reach a different control-plane path.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || matches!(**s, "." | ".."))
        {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid path segment {:?}",
                bad
            )));
        }

        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::ApiUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    /// Make an authenticated GET request.
    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, GatewayError> {
        let url = self.url(segments)?;
        tracing::debug!(%url, "GET");

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

/// Turns a non-success response into [`GatewayError::UpstreamApi`].
async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), %message, "Neon API request failed");
    Err(GatewayError::UpstreamApi {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ControlPlane for NeonClient {
    async fn list_projects(&self) -> Result<Vec<Project>, GatewayError> {
        #[derive(Deserialize)]
        struct ProjectsResponse {
            projects: Vec<Project>,
        }

        let response: ProjectsResponse = self.get(&["projects"]).await?;
        Ok(response.projects)
    }

    async fn list_branches(&self, project_id: &str) -> Result<Vec<Branch>, GatewayError> {
        #[derive(Deserialize)]
        struct BranchesResponse {
            branches: Vec<Branch>,
        }

        let response: BranchesResponse = self.get(&["projects", project_id, "branches"]).await?;
        Ok(response.branches)
    }

    async fn list_endpoints(&self, project_id: &str) -> Result<Vec<Endpoint>, GatewayError> {
        #[derive(Deserialize)]
        struct EndpointsResponse {
            endpoints: Vec<Endpoint>,
        }

        let response: EndpointsResponse =
            self.get(&["projects", project_id, "endpoints"]).await?;
        Ok(response.endpoints)
    }

    async fn create_branch(
        &self,
        project_id: &str,
        name: &str,
        base_branch_id: &str,
    ) -> Result<BranchCreation, GatewayError> {
        #[derive(Deserialize)]
        struct CreatedId {
            id: String,
        }

        #[derive(Deserialize)]
        struct CreateBranchResponse {
            branch: CreatedId,
            #[serde(default)]
            endpoints: Vec<CreatedId>,
        }

        let url = self.url(&["projects", project_id, "branches"])?;
        let body = json!({
            "branch": {
                "parent_id": base_branch_id,
                "name": name,
            },
            "endpoints": [
                { "type": "read_write" }
            ]
        });

        tracing::info!(project_id, name, base_branch_id, "creating branch");
        let response = self
            .authorized(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let status = response.status().as_u16();
        let created: CreateBranchResponse = response.json().await?;

        Ok(BranchCreation {
            status,
            branch_id: created.branch.id,
            endpoint_ids: created.endpoints.into_iter().map(|e| e.id).collect(),
        })
    }

    async fn ping(&self) -> Result<bool, GatewayError> {
        let url = self.url(&["projects"])?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("limit", "1")])
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ConnectionResolver for NeonClient {
    async fn resolve_connection_uri(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<String, GatewayError> {
        #[derive(Deserialize)]
        struct ConnectionUriResponse {
            uri: String,
        }

        let url = self.url(&["projects", descriptor.project_id.as_str(), "connection_uri"])?;
        tracing::info!(
            project_id = %descriptor.project_id,
            branch_id = %descriptor.branch_id,
            endpoint_id = %descriptor.endpoint_id,
            database = %descriptor.database_name,
            role = %descriptor.role_name,
            "fetching connection URI"
        );

        let response = self
            .authorized(self.client.get(url))
            .query(&[
                ("branch_id", descriptor.branch_id.as_str()),
                ("endpoint_id", descriptor.endpoint_id.as_str()),
                ("database_name", descriptor.database_name.as_str()),
                ("role_name", descriptor.role_name.as_str()),
                ("pooled", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::error!(status = status.as_u16(), "failed to fetch connection URI");
            return Err(GatewayError::Resolution {
                status: status.as_u16(),
            });
        }

        // A 200 without a usable `uri` is still a failed resolution
        let body: ConnectionUriResponse = response.json().await.map_err(|e| {
            tracing::error!("connection URI response unreadable: {}", e);
            GatewayError::Resolution {
                status: status.as_u16(),
            }
        })?;
        Ok(body.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as HttpStatus, Uri};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn bearer(headers: &HeaderMap) -> Option<&str> {
        headers.get("authorization").and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_list_projects_sends_bearer_key() {
        let router = Router::new().route(
            "/projects",
            get(|headers: HeaderMap| async move {
                if bearer(&headers) != Some("Bearer napi_test") {
                    return (HttpStatus::UNAUTHORIZED, Json(json!({})));
                }
                let body = json!({"projects": [
                    {"id": "p1", "name": "alpha", "region_id": "aws-us-east-2"},
                    {"id": "p2", "name": "beta"}
                ]});
                (HttpStatus::OK, Json(body))
            }),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        let projects = client.list_projects().await.unwrap();
        let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_non_success_is_upstream_error() {
        let router = Router::new().route(
            "/projects/:project_id/branches",
            get(|| async { (HttpStatus::NOT_FOUND, "project not found") }),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        match client.list_branches("missing").await {
            Err(GatewayError::UpstreamApi { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "project not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_branch_request_and_response() {
        let router = Router::new().route(
            "/projects/:project_id/branches",
            post(
                |Path(project_id): Path<String>, Json(body): Json<Value>| async move {
                    assert_eq!(project_id, "p1");
                    assert_eq!(body["branch"]["parent_id"], "br1");
                    assert_eq!(body["branch"]["name"], "feat");
                    assert_eq!(body["endpoints"], json!([{"type": "read_write"}]));
                    (
                        HttpStatus::CREATED,
                        Json(json!({
                            "branch": {"id": "br3", "name": "feat"},
                            "endpoints": [{"id": "ep9", "type": "read_write"}],
                            "operations": []
                        })),
                    )
                },
            ),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        let created = client.create_branch("p1", "feat", "br1").await.unwrap();
        assert_eq!(created.status, 201);
        assert_eq!(created.branch_id, "br3");
        assert_eq!(created.endpoint_ids, ["ep9"]);
    }

    #[tokio::test]
    async fn test_resolve_connection_uri_requests_pooled() {
        let router = Router::new().route(
            "/projects/:project_id/connection_uri",
            get(
                |Path(project_id): Path<String>,
                 Query(params): Query<HashMap<String, String>>,
                 headers: HeaderMap| async move {
                    assert_eq!(project_id, "p1");
                    assert_eq!(bearer(&headers), Some("Bearer napi_test"));
                    assert_eq!(params["branch_id"], "br1");
                    assert_eq!(params["endpoint_id"], "ep1");
                    assert_eq!(params["database_name"], "neondb");
                    assert_eq!(params["role_name"], "neondb_owner");
                    assert_eq!(params["pooled"], "true");
                    Json(json!({
                        "uri": "postgresql://neondb_owner:pw@ep1-pooler.neon.tech/neondb?sslmode=require"
                    }))
                },
            ),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        let descriptor = ConnectionDescriptor::new("p1", "br1", "ep1", None, None);
        let uri = client.resolve_connection_uri(&descriptor).await.unwrap();
        assert!(uri.contains("ep1-pooler.neon.tech"));
    }

    #[tokio::test]
    async fn test_resolve_connection_uri_requires_200() {
        let router = Router::new().route(
            "/projects/:project_id/connection_uri",
            get(|| async { (HttpStatus::ACCEPTED, Json(json!({"uri": "postgresql://x"}))) }),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        let descriptor = ConnectionDescriptor::new("p1", "br1", "ep1", None, None);
        let err = client.resolve_connection_uri(&descriptor).await.unwrap_err();
        assert!(matches!(err, GatewayError::Resolution { status: 202 }));
    }

    #[tokio::test]
    async fn test_ping() {
        let router = Router::new().route("/projects", get(|| async { Json(json!({"projects": []})) }));
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();
        assert!(client.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_project_id_stays_one_path_segment() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let router = Router::new().fallback(move |uri: Uri| async move {
            recorder.lock().unwrap().push(uri.to_string());
            Json(json!({"branches": []}))
        });
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        client.list_branches("../../users/me?x=").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["/projects/..%2F..%2Fusers%2Fme%3Fx=/branches"]);
    }

    #[tokio::test]
    async fn test_dot_segment_project_id_rejected() {
        let client = NeonClient::with_base_url("http://127.0.0.1:9", "napi_test").unwrap();
        for id in [".", ".."] {
            assert!(matches!(
                client.list_endpoints(id).await,
                Err(GatewayError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let client =
            NeonClient::with_base_url("https://console.neon.tech/api/v2/", "napi_test").unwrap();
        let url = client.url(&["projects", "p 1", "branches"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://console.neon.tech/api/v2/projects/p%201/branches"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            NeonClient::with_base_url("not a url", "napi_test"),
            Err(GatewayError::ApiUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_connection_uri_without_uri_field() {
        let router = Router::new().route(
            "/projects/:project_id/connection_uri",
            get(|| async { Json(json!({"connection_uris": []})) }),
        );
        let base = spawn_upstream(router).await;
        let client = NeonClient::with_base_url(&base, "napi_test").unwrap();

        let descriptor = ConnectionDescriptor::new("p1", "br1", "ep1", None, None);
        let err = client.resolve_connection_uri(&descriptor).await.unwrap_err();
        assert!(matches!(err, GatewayError::Resolution { status: 200 }));
    }
}
