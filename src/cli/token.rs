use crate::{error, management::TokenManager};

/// Prints a valid access token on stdout, for use in scripts.
pub async fn token(manager: &TokenManager) {
    match manager.access_token().await {
        Ok(access_token) => println!("{}", access_token),
        Err(e) => error!("Cannot obtain access token: {}", e),
    }
}
