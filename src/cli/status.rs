use tabled::Table;

use crate::{
    management::{TokenManager, TokenState},
    types::{EXPIRY_MARGIN_SECS, Token, TokenStatusRow},
    utils, warning,
};

/// Shows where the token is stored and when it expires.
pub async fn status(manager: &TokenManager) {
    let path = manager.store().path().display().to_string();

    let rows = match manager.state().await {
        TokenState::NoToken => {
            warning!("No token stored at {}. Run spotcli auth to authorize.", path);
            return;
        }
        TokenState::Valid(token) => status_rows(&path, "valid", &token),
        TokenState::Expired(token) => status_rows(&path, "expired (refreshed on next use)", &token),
    };

    println!("{}", Table::new(rows));
}

fn status_rows(path: &str, state: &str, token: &Token) -> Vec<TokenStatusRow> {
    let now = utils::now_timestamp();
    let row = |field: &str, value: String| TokenStatusRow {
        field: field.to_string(),
        value,
    };

    let mut rows = vec![
        row("Token file", path.to_string()),
        row("State", state.to_string()),
        row("Access token", utils::mask_secret(&token.access_token)),
        row("Lifetime", utils::format_duration(token.expires_in)),
    ];

    match (token.expires_at(), token.remaining_at(now)) {
        (Some(expires_at), Some(remaining)) => {
            rows.push(row("Obtained at", utils::format_timestamp(token.obtained_at)));
            rows.push(row("Expires at", utils::format_timestamp(expires_at)));
            rows.push(row(
                "Refresh due",
                utils::format_timestamp(expires_at - EXPIRY_MARGIN_SECS),
            ));
            rows.push(row("Remaining", utils::format_duration(remaining)));
        }
        _ if token.obtained_at <= 0 => {
            rows.push(row("Obtained at", "unknown (treated as valid)".to_string()))
        }
        _ => rows.push(row(
            "Obtained at",
            format!("{} (expiry out of range)", utils::format_timestamp(token.obtained_at)),
        )),
    }

    rows
}
