//! HTTP server for the dashboard
//! Plain HTTP/1.1 on tokio: one request per connection, JSON API plus the
//! single dashboard page.

use crate::dashboard::Dashboard;
use crate::error::Result;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const DASHBOARD_PAGE: &str = include_str!("../ui/index.html");
const MAX_REQUEST_BYTES: usize = 1_000_000;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, dashboard: Arc<Dashboard>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "dashboard server listening");
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!(%addr, "new connection");
        tokio::spawn(handle_connection(stream, Arc::clone(&dashboard)));
    }
}

async fn handle_connection(mut stream: TcpStream, dashboard: Arc<Dashboard>) {
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                return Ok::<_, std::io::Error>(RequestState::Incomplete);
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            if buffer.len() > MAX_REQUEST_BYTES {
                return Ok(RequestState::TooLarge);
            }
            match request_state(&buffer) {
                RequestState::Incomplete => continue,
                state => return Ok(state),
            }
        }
    })
    .await;

    let state = match read_result {
        Err(_) => {
            warn!("request read timeout");
            return;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "failed to read from stream");
            return;
        }
        Ok(Ok(state)) => state,
    };

    if buffer.is_empty() {
        return;
    }

    let response = if state == RequestState::TooLarge {
        warn!(bytes = buffer.len(), "request rejected: too large");
        create_response(
            413,
            "Payload Too Large",
            JSON,
            r#"{"error":"request body too large"}"#,
        )
    } else {
        match String::from_utf8(buffer) {
            Ok(request) => handle_request(&request, &dashboard).await,
            Err(_) => create_response(
                400,
                "Bad Request",
                JSON,
                r#"{"error":"request is not valid UTF-8"}"#,
            ),
        }
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!(error = %e, "failed to write response");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Incomplete,
    /// Headers received and, when announced, the whole body too.
    Complete,
    /// The announced body would push the request past `MAX_REQUEST_BYTES`.
    TooLarge,
}

fn request_state(buffer: &[u8]) -> RequestState {
    let text = String::from_utf8_lossy(buffer);
    let Some(headers_end) = text.find("\r\n\r\n") else {
        return RequestState::Incomplete;
    };
    let content_length = extract_content_length(&text[..headers_end]).unwrap_or(0);
    let total = match (headers_end + 4).checked_add(content_length) {
        Some(total) if total <= MAX_REQUEST_BYTES => total,
        _ => return RequestState::TooLarge,
    };
    if buffer.len() >= total {
        RequestState::Complete
    } else {
        RequestState::Incomplete
    }
}

fn extract_content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Route one raw HTTP request and build the raw response.
pub async fn handle_request(request: &str, dashboard: &Dashboard) -> String {
    let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return create_response(400, "Bad Request", JSON, "{}"),
    };

    let path = target.split('?').next().unwrap_or(target);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    debug!(method, path, "request");

    match (method, path) {
        ("OPTIONS", _) => create_response(204, "No Content", JSON, ""),
        ("GET", "/") | ("GET", "/index.html") => {
            create_response(200, "OK", HTML, DASHBOARD_PAGE)
        }
        ("GET", "/api/health") => create_response(
            200,
            "OK",
            JSON,
            r#"{"status":"ok","service":"nl2sql-dashboard"}"#,
        ),
        ("GET", "/api/schema") => match dashboard.schema().await {
            Ok(schema) => json_response(200, "OK", &schema),
            Err(e) => json_response(
                500,
                "Internal Server Error",
                &serde_json::json!({ "error": format!("Database error: {}", e.detail()) }),
            ),
        },
        ("POST", "/api/ask") => {
            let body = request
                .split_once("\r\n\r\n")
                .map(|(_, body)| body.trim())
                .unwrap_or_default();
            let ask: AskRequest = match serde_json::from_str(body) {
                Ok(ask) => ask,
                Err(e) => {
                    return json_response(
                        400,
                        "Bad Request",
                        &serde_json::json!({ "error": format!("Invalid JSON body: {}", e) }),
                    )
                }
            };
            let response = dashboard.ask(&ask.question).await;
            json_response(200, "OK", &response)
        }
        _ => create_response(404, "Not Found", JSON, r#"{"error":"not found"}"#),
    }
}

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

fn json_response<T: serde::Serialize>(status: u16, status_text: &str, body: &T) -> String {
    match serde_json::to_string(body) {
        Ok(json) => create_response(status, status_text, JSON, &json),
        Err(e) => create_response(
            500,
            "Internal Server Error",
            JSON,
            &serde_json::json!({ "error": e.to_string() }).to_string(),
        ),
    }
}

fn create_response(status: u16, status_text: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        content_type,
        body.len(),
        body
    )
}
