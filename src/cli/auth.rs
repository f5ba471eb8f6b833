use crate::{error, management::TokenManager, success};

/// Runs the authorization flow and stores the resulting token.
pub async fn auth(manager: &TokenManager) {
    if let Err(e) = manager.authorize().await {
        error!("Authorization failed: {}", e);
    }
}

/// Refreshes the stored token immediately.
pub async fn refresh(manager: &TokenManager) {
    match manager.refresh().await {
        Ok(token) => success!(
            "Token refreshed, valid for another {}.",
            crate::utils::format_duration(token.expires_in)
        ),
        Err(e) => error!("Cannot refresh token: {}\nRun spotcli auth to authorize again.", e),
    }
}
