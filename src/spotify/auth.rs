use reqwest::{Client, Url};

use crate::{
    config::{Config, SCOPES},
    error::{AuthError, ConfigError},
    types::{Token, TokenResponse, check_bearer},
    utils, warning,
};

const LOGGED_BODY_CHARS: usize = 300;

/// Builds the URL the user opens to grant access to the application.
///
/// Contains the client id, the redirect URI and the fixed scope list, with
/// all values URL-encoded.
///
/// # Example
///
/// ```
/// let url = authorize_url(&config);
/// // https://accounts.spotify.com/authorize?client_id=...&response_type=code&redirect_uri=...&scope=...
/// ```
pub fn authorize_url(config: &Config) -> String {
    let scope = SCOPES.join(" ");
    let params = [
        ("client_id", config.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", scope.as_str()),
    ];

    match Url::parse_with_params(&config.auth_url, &params) {
        Ok(url) => url.to_string(),
        // auth_url is validated when the config is built
        Err(_) => format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
            config.auth_url, config.client_id, config.redirect_uri, scope
        ),
    }
}

/// Client for the provider's token endpoint.
///
/// Speaks the `authorization_code` and `refresh_token` grants using the
/// client credentials from the [`Config`]. Tokens it returns are stamped with
/// the current time but never persisted here.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    /// Creates a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the client id or secret is empty, or
    /// [`AuthError::Network`] if the HTTP client cannot be initialised.
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        if config.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("CLIENT_ID").into());
        }
        if config.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("CLIENT_SECRET").into());
        }

        let http = Client::builder().timeout(config.http_timeout).build()?;

        Ok(TokenClient {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Exchanges an authorization code for a new token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Network`] when the request cannot be completed
    /// - [`AuthError::Protocol`] on a non-success status, or when
    ///   `access_token`, `refresh_token` or `expires_in` is missing or invalid
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Token, AuthError> {
        let response = self
            .request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        into_token(response, None)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The given refresh token is kept unless the provider rotates it.
    ///
    /// # Errors
    ///
    /// Same as [`TokenClient::exchange_authorization_code`], except that a
    /// missing `refresh_token` in the response is not an error.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let response = self
            .request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        into_token(response, Some(refresh_token))
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let res = self.http.post(&self.token_url).form(form).send().await?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            warning!(
                "Token endpoint answered {}: {}",
                status,
                utils::truncate_for_log(&body, LOGGED_BODY_CHARS)
            );
            let detail = serde_json::from_str::<TokenResponse>(&body)
                .ok()
                .and_then(|r| r.error_detail());
            return Err(AuthError::status(status, detail));
        }

        serde_json::from_str(&body).map_err(|e| {
            warning!(
                "Unreadable token endpoint response: {}",
                utils::truncate_for_log(&body, LOGGED_BODY_CHARS)
            );
            AuthError::Protocol(format!("invalid JSON in response: {e}"))
        })
    }
}

/// Validates a successful response. With `current_refresh` set, a response
/// without a refresh token keeps the current one.
fn into_token(response: TokenResponse, current_refresh: Option<&str>) -> Result<Token, AuthError> {
    let summary = response.summary();
    build_token(response, current_refresh)
        .inspect_err(|_| warning!("Incomplete token response: {}", summary))
}

fn build_token(response: TokenResponse, current_refresh: Option<&str>) -> Result<Token, AuthError> {
    let access_token = bearer("access_token", response.access_token)?;
    let refresh_token = match (response.refresh_token.filter(|t| !t.is_empty()), current_refresh) {
        (Some(issued), _) => bearer("refresh_token", Some(issued))?,
        (None, Some(current)) => current.to_string(),
        (None, None) => return Err(AuthError::missing_field("refresh_token")),
    };
    let expires_in = lifetime(response.expires_in)?;

    Ok(Token::new(access_token, refresh_token, expires_in))
}

fn bearer(field: &str, value: Option<String>) -> Result<String, AuthError> {
    let value = value.ok_or_else(|| AuthError::missing_field(field))?;
    check_bearer(field, &value).map_err(AuthError::Protocol)?;
    Ok(value)
}

fn lifetime(expires_in: Option<i64>) -> Result<i64, AuthError> {
    match expires_in {
        Some(secs) if secs > 0 => Ok(secs),
        Some(secs) => Err(AuthError::Protocol(format!(
            "expires_in must be positive, got {secs}"
        ))),
        None => Err(AuthError::missing_field("expires_in")),
    }
}
