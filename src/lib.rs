//! # Neon Gateway
//!
//! A small REST gateway over the Neon control-plane API and its
//! SQL-over-HTTP channel, shaped for consumption by an LLM-driven client.
//!
//! ## Endpoints
//!
//! | Method & Path | Body | Response |
//! |---|---|---|
//! | `GET /projects` | | `[{id, name}]` |
//! | `GET /projects/:projectId/branches` | | `[{id, name, primary}]` |
//! | `GET /projects/:projectId/endpoints` | | allow-listed endpoint fields |
//! | `POST /projects/:projectId/branch` | `{name, baseBranchId}` | `{branch, endpoint}` |
//! | `POST /projects/:projectId/sql` | `{sql, branchId, endpointId, databaseName?, roleName?}` | result rows |
//! | `GET /health` | | control-plane reachability |
//!
//! Configuration is read from the environment; see [`config`].

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod server;
pub mod service;
pub mod sql;

pub use config::Config;
pub use error::GatewayError;
pub use service::NeonService;
