use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::utils;

/// Upper bound for the length of a stored bearer string.
pub const MAX_TOKEN_LEN: usize = 2048;

/// Seconds before the provider's stated expiry at which a token is treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp of issuance. Zero for token files written without it.
    #[serde(default)]
    pub obtained_at: i64,
}

impl Token {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Token {
            access_token,
            refresh_token,
            expires_in,
            obtained_at: utils::now_timestamp(),
        }
    }

    /// Checks the field invariants a usable token must hold.
    pub fn validate(&self) -> Result<(), String> {
        check_bearer("access_token", &self.access_token)?;
        check_bearer("refresh_token", &self.refresh_token)?;
        if self.expires_in <= 0 {
            return Err(format!("expires_in must be positive, got {}", self.expires_in));
        }
        Ok(())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(utils::now_timestamp())
    }

    /// A token without an issuance time is never considered expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        if self.obtained_at <= 0 {
            return false;
        }
        let age = now.saturating_sub(self.obtained_at);
        age >= self.expires_in.saturating_sub(EXPIRY_MARGIN_SECS)
    }

    /// Unix timestamp of expiry. `None` without an issuance time, or when it
    /// is out of range.
    pub fn expires_at(&self) -> Option<i64> {
        if self.obtained_at <= 0 {
            return None;
        }
        self.obtained_at.checked_add(self.expires_in)
    }

    pub fn remaining_at(&self, now: i64) -> Option<i64> {
        self.expires_at()?.checked_sub(now)
    }
}

/// Validates an opaque bearer string received from the provider or read from disk.
pub fn check_bearer(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} is empty"));
    }
    if value.len() > MAX_TOKEN_LEN {
        return Err(format!(
            "{field} is {} bytes, longer than the {MAX_TOKEN_LEN} byte limit",
            value.len()
        ));
    }
    Ok(())
}

/// Body of a token endpoint response. Every field is optional so that a
/// missing one can be reported instead of failing the whole decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// The provider's error code and description, if it sent any.
    pub fn error_detail(&self) -> Option<String> {
        match (&self.error, &self.error_description) {
            (Some(e), Some(d)) => Some(format!("{e} ({d})")),
            (Some(e), None) => Some(e.clone()),
            (None, Some(d)) => Some(d.clone()),
            (None, None) => None,
        }
    }

    /// Describes the response for logs without exposing any bearer value.
    pub fn summary(&self) -> String {
        let present = |set: bool, name: &'static str| set.then_some(name);
        let fields: Vec<&str> = [
            present(self.access_token.is_some(), "access_token"),
            present(self.refresh_token.is_some(), "refresh_token"),
            present(self.expires_in.is_some(), "expires_in"),
            present(self.scope.is_some(), "scope"),
            present(self.token_type.is_some(), "token_type"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut summary = format!("fields [{}]", fields.join(", "));
        if let Some(secs) = self.expires_in {
            summary.push_str(&format!(", expires_in={secs}"));
        }
        if let Some(detail) = self.error_detail() {
            summary.push_str(&format!(", error={detail}"));
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
}

#[derive(Tabled)]
pub struct TokenStatusRow {
    pub field: String,
    pub value: String,
}
