//! SQL execution over Neon's SQL-over-HTTP endpoint.
//!
//! Each call is one `POST` carrying the connection string and a single
//! statement. The client keeps no idle connections, so nothing survives
//! the statement; pooling happens upstream through the pooled connection
//! string.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::models::SqlResult;

/// Executes one statement against a resolved connection string.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, connection_uri: &str, sql: &str) -> Result<SqlResult, GatewayError>;
}

/// [`SqlExecutor`] backed by the SQL-over-HTTP endpoint of the host named
/// in the connection string.
#[derive(Clone)]
pub struct HttpSqlExecutor {
    client: Client,
    local: bool,
}

impl HttpSqlExecutor {
    /// With `local` set, statements go over plain HTTP to the host and port
    /// of the connection string (a local SQL-over-HTTP proxy) instead of
    /// `https://{host}/sql`.
    pub fn new(local: bool) -> Result<Self, GatewayError> {
        let client = Client::builder().pool_max_idle_per_host(0).build()?;
        Ok(Self { client, local })
    }

    /// Derive the SQL endpoint for a connection string.
    pub fn sql_endpoint(&self, connection_uri: &str) -> Result<Url, GatewayError> {
        let parsed = Url::parse(connection_uri)
            .map_err(|e| GatewayError::Execution(format!("invalid connection URI: {}", e)))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::Execution("connection URI has no host".into()))?;

        let endpoint = if self.local {
            match parsed.port() {
                Some(port) => format!("http://{}:{}/sql", host, port),
                None => format!("http://{}/sql", host),
            }
        } else {
            format!("https://{}/sql", host)
        };

        Url::parse(&endpoint)
            .map_err(|e| GatewayError::Execution(format!("invalid SQL endpoint: {}", e)))
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: SqlResult,
}

#[derive(Deserialize)]
struct QueryError {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl SqlExecutor for HttpSqlExecutor {
    async fn execute(&self, connection_uri: &str, sql: &str) -> Result<SqlResult, GatewayError> {
        let endpoint = self.sql_endpoint(connection_uri)?;
        tracing::info!(host = endpoint.host_str().unwrap_or_default(), "executing SQL");

        let body = json!({
            "query": sql,
            "params": []
        });

        let response = self
            .client
            .post(endpoint)
            .header("Neon-Connection-String", connection_uri)
            .header("Neon-Array-Mode", "false")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Execution(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<QueryError>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(GatewayError::Execution(format!("{} - {}", status, message)));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Execution(format!("invalid response: {}", e)))?;

        tracing::info!(rows = result.rows.len(), "SQL query executed");
        Ok(result.rows)
    }
}
