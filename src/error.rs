//! Error types shared by the authorization components.
//!
//! Each component reports its own failures ([`ConfigError`],
//! [`StoreError`](crate::management::StoreError),
//! [`CallbackError`](crate::server::CallbackError)); [`AuthError`] is what the
//! token lifecycle hands back to callers.

use reqwest::StatusCode;

use crate::{management::StoreError, server::CallbackError};

/// Problems with the process configuration, reported before any network use.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("cannot determine the home directory for the credential file")]
    NoHomeDirectory,

    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenv::Error),
}

/// Failures surfaced by [`TokenManager`](crate::management::TokenManager).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token endpoint error: {0}")]
    Protocol(String),

    #[error("authorization callback failed: {0}")]
    Callback(#[from] CallbackError),

    #[error("authorization cancelled")]
    Cancelled,
}

impl AuthError {
    pub(crate) fn status(status: StatusCode, detail: Option<String>) -> Self {
        match detail {
            Some(detail) => AuthError::Protocol(format!("HTTP {status}: {detail}")),
            None => AuthError::Protocol(format!("HTTP {status}")),
        }
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        AuthError::Protocol(format!("response is missing `{field}`"))
    }
}
