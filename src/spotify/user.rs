use std::time::Duration;

use reqwest::Client;

use crate::{error::AuthError, types::CurrentUser};

/// Fetches the profile of the user the access token belongs to.
///
/// # Arguments
///
/// * `api_url` - Base URL of the Web API, without trailing slash
/// * `token` - Valid access token
/// * `timeout` - Request timeout
///
/// # Errors
///
/// Returns [`AuthError::Network`] on transport failures and
/// [`AuthError::Protocol`] when the API rejects the token or answers with an
/// unexpected body.
pub async fn get_current_user(
    api_url: &str,
    token: &str,
    timeout: Duration,
) -> Result<CurrentUser, AuthError> {
    let client = Client::builder().timeout(timeout).build()?;
    let res = client
        .get(format!("{api_url}/me"))
        .bearer_auth(token)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(AuthError::status(status, None));
    }

    res.json::<CurrentUser>()
        .await
        .map_err(|e| AuthError::Protocol(format!("unexpected /me response: {e}")))
}
