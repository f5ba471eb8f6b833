use crate::{error, info, management::TokenManager, spotify::user::get_current_user};

pub async fn whoami(manager: &TokenManager) {
    let token = match manager.access_token().await {
        Ok(t) => t,
        Err(e) => error!("Cannot obtain access token: {}", e),
    };

    let config = manager.config();
    match get_current_user(&config.api_url, &token, config.http_timeout).await {
        Ok(user) => {
            info!(
                "Logged in as {} ({})",
                user.display_name.as_deref().unwrap_or("unnamed user"),
                user.id
            );
            if let Some(product) = user.product {
                info!("Subscription: {}", product);
            }
        }
        Err(e) => error!("Cannot fetch current user: {}", e),
    }
}
