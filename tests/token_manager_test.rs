mod common;

use axum::http::StatusCode;
use serde_json::json;
use spotcli::{
    error::AuthError,
    management::{CredentialStore, StoreError, TokenManager, TokenState},
    types::Token,
    utils,
};
use tempfile::tempdir;

use common::{
    closed_url, free_port, send_redirect, spawn_stalled_endpoint, spawn_token_endpoint, test_config,
    test_config_with,
};

fn stored_token(access_token: &str, age_secs: i64) -> Token {
    Token {
        access_token: access_token.to_string(),
        refresh_token: "R".to_string(),
        expires_in: 3600,
        obtained_at: utils::now_timestamp() - age_secs,
    }
}

#[tokio::test]
async fn test_first_run_authorizes_and_persists() {
    let endpoint = spawn_token_endpoint(&[(
        "authorization_code",
        StatusCode::OK,
        json!({ "access_token": "A", "refresh_token": "R", "expires_in": 3600 }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("spotcli/token.json");
    let port = free_port();
    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, port)).unwrap();

    assert_eq!(manager.state().await, TokenState::NoToken);
    let url = manager.authorize_url();
    assert!(url.contains("client_id=test-client"));
    assert!(url.contains(&format!("redirect_uri=http%3A%2F%2F127.0.0.1%3A{port}%2Fcallback")));

    let browser = tokio::spawn(async move {
        send_redirect(port, "GET /callback?code=TESTCODE HTTP/1.1").await
    });

    let started = utils::now_timestamp();
    let token = manager.ensure_valid_token().await.unwrap();

    assert_eq!(token.access_token, "A");
    assert_eq!(token.refresh_token, "R");
    assert_eq!(token.expires_in, 3600);
    assert!((token.obtained_at - started).abs() <= 1);
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));

    let form = &endpoint.requests()[0];
    assert_eq!(form["code"], "TESTCODE");

    let on_disk = CredentialStore::new(&token_path).load().await.unwrap();
    assert_eq!(on_disk, token);
}

#[tokio::test]
async fn test_valid_token_is_returned_without_network() {
    let endpoint = spawn_token_endpoint(&[]).await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let stored = stored_token("A", 60);
    CredentialStore::new(&token_path).save(&stored).await.unwrap();

    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, free_port())).unwrap();

    assert_eq!(manager.ensure_valid_token().await.unwrap(), stored);
    assert_eq!(manager.access_token().await.unwrap(), "A");
    assert!(endpoint.requests().is_empty());
}

#[tokio::test]
async fn test_legacy_token_without_timestamp_is_used() {
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(
        &token_path,
        r#"{"access_token": "OLD", "refresh_token": "R", "expires_in": 3600}"#,
    )
    .unwrap();

    let manager = TokenManager::new(test_config(&closed_url(), &token_path, free_port())).unwrap();
    let token = manager.ensure_valid_token().await.unwrap();

    assert_eq!(token.access_token, "OLD");
    assert_eq!(token.obtained_at, 0);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let endpoint = spawn_token_endpoint(&[(
        "refresh_token",
        StatusCode::OK,
        json!({ "access_token": "A2", "token_type": "Bearer", "expires_in": 3600 }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let store = CredentialStore::new(&token_path);
    store.save(&stored_token("A", 3601)).await.unwrap();

    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, free_port())).unwrap();
    assert!(matches!(manager.state().await, TokenState::Expired(_)));

    let token = manager.ensure_valid_token().await.unwrap();
    assert_eq!(token.access_token, "A2");
    assert_eq!(token.refresh_token, "R");
    assert!(!token.is_expired());

    let on_disk = store.load().await.unwrap();
    assert_eq!(on_disk.access_token, "A2");
    assert_eq!(on_disk.refresh_token, "R");

    // the refreshed token is served from memory afterwards
    manager.ensure_valid_token().await.unwrap();
    assert_eq!(endpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_returned() {
    let endpoint = spawn_token_endpoint(&[(
        "refresh_token",
        StatusCode::BAD_REQUEST,
        json!({ "error": "invalid_grant", "error_description": "Refresh token revoked" }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let store = CredentialStore::new(&token_path);
    let expired = stored_token("A", 4000);
    store.save(&expired).await.unwrap();

    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, free_port())).unwrap();
    let err = manager.ensure_valid_token().await.unwrap_err();

    match err {
        AuthError::Protocol(reason) => assert!(reason.contains("invalid_grant")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.load().await.unwrap(), expired);
    // no authorization attempt: only the refresh request was made
    assert_eq!(endpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_refresh_failure_can_fall_back_to_authorization() {
    let endpoint = spawn_token_endpoint(&[
        (
            "refresh_token",
            StatusCode::BAD_REQUEST,
            json!({ "error": "invalid_grant" }),
        ),
        (
            "authorization_code",
            StatusCode::OK,
            json!({ "access_token": "FRESH", "refresh_token": "R2", "expires_in": 3600 }),
        ),
    ])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let store = CredentialStore::new(&token_path);
    store.save(&stored_token("A", 4000)).await.unwrap();

    let port = free_port();
    let config = test_config_with(
        &endpoint.url,
        &token_path,
        port,
        &[("AUTO_REAUTHORIZE_ON_REFRESH_FAILURE", "true")],
    );
    let manager = TokenManager::new(config).unwrap();

    let browser = tokio::spawn(async move {
        send_redirect(port, "GET /callback?code=AGAIN&state=x HTTP/1.1").await
    });
    let token = manager.ensure_valid_token().await.unwrap();
    browser.await.unwrap();

    assert_eq!(token.access_token, "FRESH");
    assert_eq!(token.refresh_token, "R2");
    assert_eq!(store.load().await.unwrap(), token);

    let grants: Vec<String> = endpoint
        .requests()
        .iter()
        .map(|form| form["grant_type"].clone())
        .collect();
    assert_eq!(grants, vec!["refresh_token", "authorization_code"]);
}

#[tokio::test]
async fn test_callback_without_code_fails_and_persists_nothing() {
    let endpoint = spawn_token_endpoint(&[]).await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let port = free_port();
    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, port)).unwrap();

    let browser = tokio::spawn(async move {
        send_redirect(port, "GET /callback?error=access_denied HTTP/1.1").await
    });
    let err = manager.ensure_valid_token().await.unwrap_err();

    assert!(matches!(err, AuthError::Callback(_)));
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 400"));
    assert!(endpoint.requests().is_empty());
    assert!(!CredentialStore::new(&token_path).exists().await);
}

#[tokio::test]
async fn test_failed_exchange_persists_nothing() {
    let endpoint = spawn_token_endpoint(&[(
        "authorization_code",
        StatusCode::OK,
        json!({ "access_token": "A", "expires_in": 3600 }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let port = free_port();
    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, port)).unwrap();

    let browser =
        tokio::spawn(async move { send_redirect(port, "GET /callback?code=C HTTP/1.1").await });
    let err = manager.ensure_valid_token().await.unwrap_err();
    browser.await.unwrap();

    assert!(matches!(err, AuthError::Protocol(_)));
    assert!(!CredentialStore::new(&token_path).exists().await);
}

#[tokio::test]
async fn test_explicit_refresh_without_token() {
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let manager = TokenManager::new(test_config(&closed_url(), &token_path, free_port())).unwrap();

    let err = manager.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_explicit_refresh_of_valid_token() {
    let endpoint = spawn_token_endpoint(&[(
        "refresh_token",
        StatusCode::OK,
        json!({ "access_token": "A2", "expires_in": 1800 }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    CredentialStore::new(&token_path)
        .save(&stored_token("A", 10))
        .await
        .unwrap();

    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, free_port())).unwrap();
    let token = manager.refresh().await.unwrap();

    assert_eq!(token.access_token, "A2");
    assert_eq!(token.expires_in, 1800);
    assert_eq!(manager.ensure_valid_token().await.unwrap(), token);
}

#[tokio::test]
async fn test_unreadable_token_file_starts_authorization() {
    let endpoint = spawn_token_endpoint(&[(
        "authorization_code",
        StatusCode::OK,
        json!({ "access_token": "A", "refresh_token": "R", "expires_in": 3600 }),
    )])
    .await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(&token_path, "not json").unwrap();
    let port = free_port();
    let manager = TokenManager::new(test_config(&endpoint.url, &token_path, port)).unwrap();

    assert_eq!(manager.state().await, TokenState::NoToken);

    let browser =
        tokio::spawn(async move { send_redirect(port, "GET /callback?code=C HTTP/1.1").await });
    let token = manager.ensure_valid_token().await.unwrap();
    browser.await.unwrap();

    assert_eq!(CredentialStore::new(&token_path).load().await.unwrap(), token);
}

#[tokio::test]
async fn test_authorization_cancelled_during_exchange() {
    let token_url = spawn_stalled_endpoint().await;
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let port = free_port();
    let manager = TokenManager::new(test_config(&token_url, &token_path, port)).unwrap();

    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    let browser = tokio::spawn(async move {
        let response = send_redirect(port, "GET /callback?code=C HTTP/1.1").await;
        let _ = cancel_tx.send(());
        response
    });

    let err = manager
        .authorize_until(async {
            let _ = cancel_rx.await;
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Cancelled));
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    assert!(!CredentialStore::new(&token_path).exists().await);
}

#[tokio::test]
async fn test_authorization_cancelled_while_waiting() {
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let manager = TokenManager::new(test_config(&closed_url(), &token_path, free_port())).unwrap();

    let err = manager.authorize_until(async {}).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Callback(spotcli::server::CallbackError::Cancelled)
    ));
    assert!(!CredentialStore::new(&token_path).exists().await);
}
