//! Error types and HTTP response conversion.
//!
//! Every failure is local to one request. Upstream detail is logged but
//! not forwarded: clients only see a generic JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Per-request gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Neon API returned {status}: {message}")]
    UpstreamApi { status: u16, message: String },

    #[error("invalid Neon API URL: {0}")]
    ApiUrl(String),

    #[error("Neon API transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("branch creation failed (upstream status {status:?})")]
    BranchCreation { status: Option<u16> },

    #[error("connection URI request returned {status}")]
    Resolution { status: u16 },

    #[error("SQL execution failed: {0}")]
    Execution(String),
}

impl GatewayError {
    /// The message shown to clients.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::InvalidRequest(msg) => msg.clone(),
            GatewayError::UpstreamApi { .. }
            | GatewayError::ApiUrl(_)
            | GatewayError::Http(_) => "Neon API request failed.".into(),
            GatewayError::BranchCreation { .. } => {
                "Failed to create branch. Neon API returned an error.".into()
            }
            GatewayError::Resolution { .. } => "Failed to fetch connection URI".into(),
            GatewayError::Execution(_) => "Failed to execute SQL query".into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
