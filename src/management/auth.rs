use std::{future::Future, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::AuthError,
    info,
    management::CredentialStore,
    server::CallbackServer,
    spotify::auth::{TokenClient, authorize_url},
    success,
    types::Token,
    warning,
};

/// Where the token lifecycle stands before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    Valid(Token),
    Expired(Token),
}

/// Single entry point for obtaining a usable access token.
///
/// Hides whether a call was answered from disk, by refreshing the stored
/// token, or by running the interactive authorization. Calls on one manager
/// are serialized; the stored token is cached after the first load.
///
/// # Example
///
/// ```
/// let manager = TokenManager::new(Config::from_env()?)?;
/// let token = manager.ensure_valid_token().await?;
/// ```
pub struct TokenManager {
    config: Config,
    store: CredentialStore,
    client: TokenClient,
    current: Mutex<Option<Token>>,
}

impl TokenManager {
    /// Creates a manager persisting to `config.token_path`.
    pub fn new(config: Config) -> Result<Self, AuthError> {
        let store = CredentialStore::new(config.token_path.clone());
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: CredentialStore) -> Result<Self, AuthError> {
        let client = TokenClient::new(&config)?;
        Ok(TokenManager {
            config,
            store,
            client,
            current: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn authorize_url(&self) -> String {
        authorize_url(&self.config)
    }

    /// Returns a token that is not about to expire.
    ///
    /// 1. No usable token on disk: runs the authorization flow.
    /// 2. Stored token still valid: returned as is, without output.
    /// 3. Stored token expired: refreshed and saved. If the refresh is
    ///    rejected and `auto_reauthorize_on_refresh_failure` is set, the
    ///    authorization flow runs instead.
    ///
    /// # Errors
    ///
    /// Every failing step ends the call with its error; nothing is retried.
    pub async fn ensure_valid_token(&self) -> Result<Token, AuthError> {
        let mut current = self.current.lock().await;

        let token = match self.state_of(current.as_ref()).await {
            TokenState::Valid(token) => token,
            TokenState::NoToken => self.run_authorization(interrupted()).await?,
            TokenState::Expired(expired) => match self.refresh_and_save(&expired).await {
                Ok(token) => token,
                Err(AuthError::Protocol(reason)) if self.config.auto_reauthorize_on_refresh_failure => {
                    warning!("Token refresh rejected ({}). Starting a new authorization.", reason);
                    self.run_authorization(interrupted()).await?
                }
                Err(e) => return Err(e),
            },
        };

        *current = Some(token.clone());
        Ok(token)
    }

    /// Access token of [`TokenManager::ensure_valid_token`].
    pub async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.ensure_valid_token().await?.access_token)
    }

    /// Runs the authorization flow even if a valid token exists.
    pub async fn authorize(&self) -> Result<Token, AuthError> {
        self.authorize_until(interrupted()).await
    }

    /// Like [`TokenManager::authorize`], but abandoned as soon as `cancel`
    /// completes, whether that happens while waiting for the redirect or
    /// during the code exchange. Nothing is saved after cancellation.
    pub async fn authorize_until<C>(&self, cancel: C) -> Result<Token, AuthError>
    where
        C: Future<Output = ()>,
    {
        let mut current = self.current.lock().await;
        let token = self.run_authorization(cancel).await?;
        *current = Some(token.clone());
        Ok(token)
    }

    /// Refreshes the stored token regardless of its expiry.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::Store`] if there is no token to refresh.
    pub async fn refresh(&self) -> Result<Token, AuthError> {
        let mut current = self.current.lock().await;
        let stored = match current.as_ref() {
            Some(token) => token.clone(),
            None => self.store.load().await?,
        };

        let token = self.refresh_and_save(&stored).await?;
        *current = Some(token.clone());
        Ok(token)
    }

    /// Inspects the current token without touching the network.
    pub async fn state(&self) -> TokenState {
        let current = self.current.lock().await;
        self.state_of(current.as_ref()).await
    }

    async fn state_of(&self, cached: Option<&Token>) -> TokenState {
        let token = match cached {
            Some(token) => token.clone(),
            None => match self.store.load().await {
                Ok(token) => token,
                Err(e) if e.is_not_found() => return TokenState::NoToken,
                Err(e) => {
                    warning!("{}", e);
                    return TokenState::NoToken;
                }
            },
        };

        if token.is_expired() {
            TokenState::Expired(token)
        } else {
            TokenState::Valid(token)
        }
    }

    async fn refresh_and_save(&self, expired: &Token) -> Result<Token, AuthError> {
        let token = self
            .client
            .exchange_refresh_token(&expired.refresh_token)
            .await?;
        self.store.save(&token).await?;
        Ok(token)
    }

    async fn run_authorization<C>(&self, cancel: C) -> Result<Token, AuthError>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        // bind first so the redirect cannot arrive before anyone listens
        let server = CallbackServer::bind(self.config.callback_port).await?;
        let url = self.authorize_url();

        info!("Open this URL in your browser to authorize spotcli:\n{}\n", url);
        if self.config.open_browser && webbrowser::open(&url).is_err() {
            warning!("Failed to open browser. Please navigate to the URL above manually.");
        }

        let pb = waiting_spinner(&format!(
            "Waiting for authorization on http://{} ...",
            server.local_addr()
        ));
        let code = server
            .receive(self.config.callback_timeout, cancel.as_mut())
            .await;
        pb.finish_and_clear();
        let code = code?;

        let token = tokio::select! {
            res = self.client.exchange_authorization_code(&code, &self.config.redirect_uri) => res?,
            _ = cancel.as_mut() => return Err(AuthError::Cancelled),
        };
        self.store.save(&token).await?;

        success!(
            "Authorization successful! Token saved to {}",
            self.store.path().display()
        );
        Ok(token)
    }
}

fn waiting_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Completes on Ctrl-C. Never completes if the signal handler cannot be installed.
///
/// The handler stays installed for the rest of the process, so Ctrl-C only
/// ends an authorization through this future, never the process itself.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
