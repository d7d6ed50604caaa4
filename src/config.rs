//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOCAL` | `false` | Execute SQL against a local SQL-over-HTTP proxy |
//! | `OAUTH_ISSUER` | required | OAuth issuer discovery URL |
//! | `OAUTH_CLIENT_ID` | required | OAuth client id |
//! | `OAUTH_CLIENT_SECRET` | required | OAuth client secret |
//! | `OAUTH_REDIRECT_URI` | required | OAuth redirect URI |
//! | `NEON_API_URL` | `https://console.neon.tech/api/v2` | Control-plane base URL |
//! | `NEON_API_KEY` | required | Bearer credential for the control plane |
//! | `LISTEN_ADDR` | `0.0.0.0:3000` | HTTP server listen address |

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://console.neon.tech/api/v2";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Startup configuration failure. Always fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for environment variable {var}")]
    Invalid { var: &'static str, value: String },
}

/// OAuth client settings. Configured for the plugin manifest, not enforced
/// by any route.
#[derive(Clone)]
pub struct OAuthConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Immutable gateway configuration, built once at startup and handed to
/// every component that needs it.
#[derive(Clone)]
pub struct Config {
    pub local: bool,
    pub oauth: OAuthConfig,
    pub api_url: String,
    pub api_key: String,
    pub listen_addr: SocketAddr,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("local", &self.local)
            .field("oauth", &self.oauth)
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let local = match lookup("LOCAL") {
            Some(value) => parse_bool("LOCAL", &value)?,
            None => false,
        };

        let oauth = OAuthConfig {
            issuer: required("OAUTH_ISSUER")?,
            client_id: required("OAUTH_CLIENT_ID")?,
            client_secret: required("OAUTH_CLIENT_SECRET")?,
            redirect_uri: required("OAUTH_REDIRECT_URI")?,
        };

        let api_url = lookup("NEON_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();

        let api_key = required("NEON_API_KEY")?;

        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: "LISTEN_ADDR",
                value: listen_addr.clone(),
            })?;

        Ok(Self {
            local,
            oauth,
            api_url,
            api_key,
            listen_addr,
        })
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}
