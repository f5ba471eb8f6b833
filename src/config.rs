//! Configuration management for spotcli.
//!
//! Configuration is read once at startup into a [`Config`] value that is passed
//! to the components that need it. Values come from, in order of priority:
//! 1. Environment variables
//! 2. A `.env` file in the current working directory
//! 3. A `.env` file in the application directory (`~/.config/spotcli/.env`)
//! 4. Application defaults (where applicable)

use std::{
    env, fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::Url;

use crate::{error::ConfigError, management::CredentialStore};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Application directory, relative to the user's home directory.
pub const APP_DIR: &str = ".config/spotcli";

/// Permissions requested during authorization.
pub const SCOPES: &[&str] = &[
    "user-library-read",
    "user-library-modify",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-read-playback-state",
    "user-modify-playback-state",
];

const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Loads `.env` files into the process environment.
///
/// Variables already present in the environment are never overwritten, so a
/// value exported in the shell wins over the project-local `.env`, which wins
/// over the one in the application directory. Missing files are skipped.
///
/// # Errors
///
/// Returns an error if a `.env` file exists but cannot be read or parsed.
pub fn load_env() -> Result<(), ConfigError> {
    load_env_file(Path::new(".env"))?;
    if let Some(dir) = app_dir() {
        load_env_file(&dir.join(".env"))?;
    }
    Ok(())
}

fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    match dotenv::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Returns `~/.config/spotcli`, or `None` if the home directory is unknown.
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR))
}

/// Runtime configuration for the authorization components.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Local port the callback listener binds, taken from `redirect_uri`.
    pub callback_port: u16,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
    pub token_path: PathBuf,
    pub callback_timeout: Duration,
    pub http_timeout: Duration,
    /// Run the interactive authorization when a refresh is rejected.
    pub auto_reauthorize_on_refresh_failure: bool,
    pub open_browser: bool,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `CLIENT_ID`, `CLIENT_SECRET` or
    /// `REDIRECT_URI` is unset or empty, and [`ConfigError::Invalid`] if any
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;
        let redirect_uri = required("REDIRECT_URI")?;
        let callback_port = callback_port_from_redirect(&redirect_uri)?;

        let token_path = match get("SPOTCLI_TOKEN_PATH") {
            Some(path) => PathBuf::from(path),
            None => CredentialStore::default_path().ok_or(ConfigError::NoHomeDirectory)?,
        };

        let auth_url = endpoint(
            "SPOTIFY_AUTH_URL",
            get("SPOTIFY_AUTH_URL"),
            DEFAULT_AUTH_URL,
        )?;
        let token_url = endpoint(
            "SPOTIFY_TOKEN_URL",
            get("SPOTIFY_TOKEN_URL"),
            DEFAULT_TOKEN_URL,
        )?;
        let api_url = endpoint("SPOTIFY_API_URL", get("SPOTIFY_API_URL"), DEFAULT_API_URL)?;

        Ok(Config {
            client_id,
            client_secret,
            redirect_uri,
            callback_port,
            auth_url,
            token_url,
            api_url: api_url.trim_end_matches('/').to_string(),
            token_path,
            callback_timeout: seconds(
                "CALLBACK_TIMEOUT_SECS",
                get("CALLBACK_TIMEOUT_SECS"),
                DEFAULT_CALLBACK_TIMEOUT_SECS,
            )?,
            http_timeout: seconds(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            auto_reauthorize_on_refresh_failure: flag(
                "AUTO_REAUTHORIZE_ON_REFRESH_FAILURE",
                get("AUTO_REAUTHORIZE_ON_REFRESH_FAILURE"),
                false,
            )?,
            open_browser: flag("OPEN_BROWSER", get("OPEN_BROWSER"), true)?,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("callback_port", &self.callback_port)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("token_path", &self.token_path)
            .field("callback_timeout", &self.callback_timeout)
            .field("http_timeout", &self.http_timeout)
            .field(
                "auto_reauthorize_on_refresh_failure",
                &self.auto_reauthorize_on_refresh_failure,
            )
            .field("open_browser", &self.open_browser)
            .finish()
    }
}

/// Derives the callback listener port from the redirect URI.
///
/// The URI must use plain `http` on a loopback host, since the listener only
/// binds `127.0.0.1`.
pub fn callback_port_from_redirect(redirect_uri: &str) -> Result<u16, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "REDIRECT_URI",
        reason,
    };

    let url = Url::parse(redirect_uri).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!(
            "scheme must be http, got {}",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some("127.0.0.1") | Some("localhost") => {}
        other => {
            return Err(invalid(format!(
                "host must be 127.0.0.1 or localhost, got {}",
                other.unwrap_or("none")
            )));
        }
    }
    match url.port_or_known_default() {
        Some(0) | None => Err(invalid("a non-zero port is required".to_string())),
        Some(port) => Ok(port),
    }
}

fn endpoint(key: &'static str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    Url::parse(&value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    Ok(value)
}

fn seconds(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a positive number of seconds, got {value:?}"),
        }),
    }
}

fn flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected true or false, got {value:?}"),
        }),
    }
}
