use std::{
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::Instant,
};

use crate::api;

const MAX_REQUEST_BYTES: usize = 8192;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("accepting the redirect connection failed: {0}")]
    Accept(#[source] io::Error),

    #[error("reading the redirect request failed: {0}")]
    Read(#[source] io::Error),

    #[error("the redirect request was empty")]
    EmptyRequest,

    #[error("{}", missing_code_message(.provider_error))]
    MissingCode { provider_error: Option<String> },

    #[error("no redirect received within {0:?}")]
    Timeout(Duration),

    #[error("cancelled while waiting for the redirect")]
    Cancelled,
}

fn missing_code_message(provider_error: &Option<String>) -> String {
    match provider_error {
        Some(e) => format!("authorization was refused by the provider: {e}"),
        None => "the redirect carried no authorization code".to_string(),
    }
}

/// One-shot listener for the OAuth redirect on `127.0.0.1`.
///
/// The first accepted connection is the only one served; the listening
/// socket is closed right after, so later connections are refused.
#[derive(Debug)]
pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    /// Binds `127.0.0.1:<port>`. Port `0` picks a free port.
    pub async fn bind(port: u16) -> Result<Self, CallbackError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CallbackError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| CallbackError::Bind { addr, source })?;

        Ok(CallbackServer { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// Gives up with [`CallbackError::Timeout`] after `timeout`, or with
    /// [`CallbackError::Cancelled`] as soon as `cancel` completes. Once a
    /// connection is accepted the browser always gets an HTTP response: 200
    /// with the code, 400 on any failure.
    pub async fn receive<C>(self, timeout: Duration, cancel: C) -> Result<String, CallbackError>
    where
        C: Future<Output = ()>,
    {
        let CallbackServer { listener, .. } = self;

        let accepted = tokio::select! {
            res = tokio::time::timeout(timeout, listener.accept()) => res,
            _ = cancel => return Err(CallbackError::Cancelled),
        };
        let (mut socket, _peer) = accepted
            .map_err(|_| CallbackError::Timeout(timeout))?
            .map_err(CallbackError::Accept)?;
        drop(listener);

        let result = read_code(&mut socket).await;

        let response = match result {
            Ok(_) => api::success_response(),
            Err(_) => api::error_response(),
        };
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        result
    }
}

/// Binds `127.0.0.1:<port>` and waits for a single redirect.
pub async fn listen<C>(port: u16, timeout: Duration, cancel: C) -> Result<String, CallbackError>
where
    C: Future<Output = ()>,
{
    CallbackServer::bind(port).await?.receive(timeout, cancel).await
}

async fn read_code<S>(socket: &mut S) -> Result<String, CallbackError>
where
    S: AsyncRead + Unpin,
{
    let request = read_request_head(socket).await?;
    let text = String::from_utf8_lossy(&request);

    match api::request_line(&text) {
        Some(line) => api::extract_code(line),
        None => Err(CallbackError::EmptyRequest),
    }
}

// Reads the request head up to the blank line so the socket can be closed
// without unread data. A client that stalls or closes early is served with
// whatever it sent.
async fn read_request_head<S>(socket: &mut S) -> Result<Vec<u8>, CallbackError>
where
    S: AsyncRead + Unpin,
{
    let deadline = Instant::now() + READ_TIMEOUT;
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while buf.len() < MAX_REQUEST_BYTES && !has_head_end(&buf) {
        let n = match tokio::time::timeout_at(deadline, socket.read(&mut chunk)).await {
            Ok(read) => read.map_err(CallbackError::Read)?,
            Err(_) if !buf.is_empty() => break,
            Err(_) => return Err(CallbackError::Timeout(READ_TIMEOUT)),
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf)
}

fn has_head_end(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.windows(2).any(|w| w == b"\n\n")
}
