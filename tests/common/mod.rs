#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::TcpListener as StdTcpListener,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use spotcli::config::Config;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

pub type FormLog = Arc<Mutex<Vec<HashMap<String, String>>>>;

#[derive(Clone)]
struct MockState {
    requests: FormLog,
    responses: Arc<HashMap<String, (StatusCode, Value)>>,
}

/// A token endpoint answering per `grant_type`.
pub struct MockTokenEndpoint {
    pub url: String,
    pub requests: FormLog,
}

impl MockTokenEndpoint {
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

pub async fn spawn_token_endpoint(responses: &[(&str, StatusCode, Value)]) -> MockTokenEndpoint {
    let requests: FormLog = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        requests: Arc::clone(&requests),
        responses: Arc::new(
            responses
                .iter()
                .map(|(grant, status, body)| (grant.to_string(), (*status, body.clone())))
                .collect(),
        ),
    };

    let app = Router::new()
        .route("/api/token", post(token_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockTokenEndpoint {
        url: format!("http://{addr}/api/token"),
        requests,
    }
}

async fn token_handler(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let grant = form.get("grant_type").cloned().unwrap_or_default();
    state.requests.lock().unwrap().push(form);

    match state.responses.get(&grant) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        ),
    }
}

/// A token endpoint that accepts connections but never answers.
pub async fn spawn_stalled_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/api/token")
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A port nothing listens on, for transport failures.
pub fn closed_url() -> String {
    format!("http://127.0.0.1:{}/api/token", free_port())
}

pub fn test_config(token_url: &str, token_path: &Path, port: u16) -> Config {
    test_config_with(token_url, token_path, port, &[])
}

pub fn test_config_with(
    token_url: &str,
    token_path: &Path,
    port: u16,
    extra: &[(&str, &str)],
) -> Config {
    let redirect_uri = format!("http://127.0.0.1:{port}/callback");
    let token_path = token_path.display().to_string();

    Config::from_lookup(|key| {
        if let Some((_, value)) = extra.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }
        match key {
            "CLIENT_ID" => Some("test-client".to_string()),
            "CLIENT_SECRET" => Some("test-secret".to_string()),
            "REDIRECT_URI" => Some(redirect_uri.clone()),
            "SPOTIFY_TOKEN_URL" => Some(token_url.to_string()),
            "SPOTCLI_TOKEN_PATH" => Some(token_path.clone()),
            "OPEN_BROWSER" => Some("false".to_string()),
            "CALLBACK_TIMEOUT_SECS" => Some("10".to_string()),
            "HTTP_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        }
    })
    .unwrap()
}

/// Plays the browser: connects to the callback listener once it is up and
/// sends a request with the given request line. Returns the raw response.
pub async fn send_redirect(port: u16, request_line: &str) -> String {
    for _ in 0..200 {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(mut stream) => {
                let request = format!(
                    "{request_line}\r\nHost: 127.0.0.1:{port}\r\nAccept: text/html\r\n\r\n"
                );
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = Vec::new();
                stream.read_to_end(&mut response).await.unwrap();
                return String::from_utf8_lossy(&response).into_owned();
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
    panic!("callback listener never came up on port {port}");
}
