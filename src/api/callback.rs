use reqwest::Url;

use crate::server::CallbackError;

const SUCCESS_HTML: &str = "<html><body style='font-family: Arial; text-align: center; padding: 50px; background-color: #141414;'>\
<h1 style='color: #1DB954;'>Authorization successful</h1>\
<p style='color: #1DB954;'>You can close this window and return to the terminal.</p>\
</body></html>";

const ERROR_HTML: &str = "<html><body style='font-family: Arial; text-align: center; padding: 50px; background-color: #141414;'>\
<h1 style='color: #E22134;'>Authorization failed</h1>\
<p style='color: #E22134;'>No authorization code was received. Restart the authorization from the terminal.</p>\
</body></html>";

/// First line of a raw HTTP request, without its line terminator.
pub fn request_line(request: &str) -> Option<&str> {
    request
        .lines()
        .next()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
}

/// Extracts the authorization code from a request line such as
/// `GET /callback?code=ABC123&state=xyz HTTP/1.1`.
///
/// The request target is parsed as a URL, so the value ends at the next `&`
/// and is percent-decoded. A missing line terminator is fine.
pub fn extract_code(line: &str) -> Result<String, CallbackError> {
    let target = request_target(line);
    let param = |name: &str| -> Option<String> {
        target
            .as_ref()?
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    };

    match param("code") {
        Some(code) => Ok(code),
        None => Err(CallbackError::MissingCode {
            provider_error: param("error"),
        }),
    }
}

fn request_target(line: &str) -> Option<Url> {
    let target = line.split_whitespace().nth(1)?;
    if target.starts_with('/') {
        Url::parse(&format!("http://127.0.0.1{target}")).ok()
    } else {
        Url::parse(target).ok()
    }
}

pub fn success_response() -> String {
    http_response("200 OK", SUCCESS_HTML)
}

pub fn error_response() -> String {
    http_response("400 Bad Request", ERROR_HTML)
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

