//! Client for the Pritunl daemon's local control API.
//!
//! The daemon exposes HTTP semantics over a Unix domain socket on macOS and
//! Linux and over loopback TCP on Windows. Every request carries a static
//! auth key the daemon writes to a well-known file at startup. Calls block
//! until the daemon answers; a one-shot CLI has no use for timeouts or
//! retries, and any transport failure is fatal to the invocation.

use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::creds::ResolvedCredentials;
use crate::platform;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("failed to read auth key: {0}")]
    AuthKey(std::io::Error),

    #[error("request to daemon failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to daemon failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("daemon returned status {code} for '{endpoint}'")]
    Status { code: u16, endpoint: String },

    #[error("malformed response from daemon")]
    MalformedResponse,
}

/// Handle to the daemon's control API.
///
/// Holds the transport configuration resolved once at startup; callers pass
/// it by reference to every operation.
pub struct DaemonClient {
    auth_key: String,
    #[cfg(unix)]
    socket_path: std::path::PathBuf,
    #[cfg(not(unix))]
    http: reqwest::Client,
}

impl DaemonClient {
    /// Reads the auth key and prepares the platform transport.
    ///
    /// A missing key file yields an empty key; the daemon may then reject
    /// requests, which surfaces as a status error.
    pub fn new() -> Result<Self, DaemonError> {
        let key_path = platform::auth_key_path();
        let auth_key = match std::fs::read_to_string(&key_path) {
            Ok(key) => key.trim_end().to_string(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(DaemonError::AuthKey(err)),
        };

        Ok(Self {
            auth_key,
            #[cfg(unix)]
            socket_path: std::path::PathBuf::from(platform::SOCKET_PATH),
            #[cfg(not(unix))]
            http: reqwest::Client::new(),
        })
    }

    /// Asks the daemon for its own status.
    pub async fn check_status(&self) -> Result<String, DaemonError> {
        let body = self.request(Method::GET, "status", None).await?;
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| DaemonError::MalformedResponse)?;
        Ok(match value.get("status") {
            Some(serde_json::Value::String(status)) => status.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
    }

    /// Whether the daemon answers at all.
    pub async fn ping(&self) -> Result<bool, DaemonError> {
        let body = self.request(Method::GET, "ping", None).await?;
        Ok(body.is_empty())
    }

    /// Fetches the live connection list as the raw response payload.
    pub async fn connections(&self) -> Result<String, DaemonError> {
        self.request(Method::GET, "profile", None).await
    }

    /// Stops every active connection with a single request.
    pub async fn stop_all(&self) -> Result<(), DaemonError> {
        self.request(Method::POST, "stop", None).await?;
        Ok(())
    }

    /// Asks the daemon to start the tunnel for one profile.
    pub async fn connect_profile(
        &self,
        id: &str,
        creds: &ResolvedCredentials,
    ) -> Result<(), DaemonError> {
        let body = json!({
            "id": id,
            "reconnect": true,
            "timeout": true,
            "username": creds.username,
            "password": creds.password,
            "data": creds.ovpn,
        });
        self.request(Method::POST, "profile", Some(body.to_string()))
            .await?;
        Ok(())
    }

    /// Asks the daemon to stop the tunnel for one profile.
    pub async fn disconnect_profile(&self, id: &str) -> Result<(), DaemonError> {
        let body = json!({ "id": id });
        self.request(Method::DELETE, "profile", Some(body.to_string()))
            .await?;
        Ok(())
    }

    /// Issues one request over the Unix control socket.
    ///
    /// The daemon speaks plain HTTP/1.1 on the socket, so the request is
    /// written directly and the close-delimited response read back whole.
    #[cfg(unix)]
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<String, DaemonError> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::UnixStream;

        let payload = body.unwrap_or_default();
        debug!("{} {} over {}", method, endpoint, self.socket_path.display());

        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let request = format!(
            "{method} /{endpoint} HTTP/1.1\r\n\
             Host: unix\r\n\
             User-Agent: pritunl\r\n\
             Content-Type: application/json\r\n\
             Auth-Key: {key}\r\n\
             Content-Length: {length}\r\n\
             Connection: close\r\n\
             \r\n\
             {payload}",
            key = self.auth_key,
            length = payload.len(),
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;

        let (code, response_body) = parse_response(&raw)?;
        if code != 200 {
            return Err(DaemonError::Status {
                code,
                endpoint: endpoint.to_string(),
            });
        }
        Ok(response_body)
    }

    /// Issues one request over loopback TCP.
    #[cfg(not(unix))]
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<String, DaemonError> {
        let url = format!("{}{}", platform::BASE_URL, endpoint);
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header("User-Agent", "pritunl")
            .header("Content-Type", "application/json")
            .header("Auth-Key", self.auth_key.as_str());
        if let Some(payload) = body {
            request = request.body(payload);
        }

        let response = request.send().await?;
        let code = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&code) {
            return Err(DaemonError::Status {
                code,
                endpoint: endpoint.to_string(),
            });
        }
        Ok(text)
    }
}

/// Splits a raw HTTP/1.1 response into status code and body.
///
/// The daemon closes the connection after each response; the body is
/// everything past the header terminator, truncated to Content-Length when
/// one is present.
#[cfg(unix)]
fn parse_response(raw: &[u8]) -> Result<(u16, String), DaemonError> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or(DaemonError::MalformedResponse)?;

    let mut lines = head.lines();
    let status_line = lines.next().ok_or(DaemonError::MalformedResponse)?;
    let code: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or(DaemonError::MalformedResponse)?;

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok());

    let body = match content_length {
        Some(length) => body.get(..length).unwrap_or(body),
        None => body,
    };
    Ok((code, body.to_string()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"status\": true}";
        let (code, body) = parse_response(raw).unwrap();
        assert_eq!(code, 200);
        assert_eq!(body, "{\"status\": true}");
    }

    #[test]
    fn honors_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}garbage";
        let (code, body) = parse_response(raw).unwrap();
        assert_eq!(code, 200);
        assert_eq!(body, "{}");
    }

    #[test]
    fn reports_error_statuses() {
        let raw = b"HTTP/1.1 401 Unauthorized\r\n\r\n";
        let (code, body) = parse_response(raw).unwrap();
        assert_eq!(code, 401);
        assert!(body.is_empty());
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(matches!(
            parse_response(b"not http"),
            Err(DaemonError::MalformedResponse)
        ));
        assert!(matches!(
            parse_response(b"HTTP/1.1 abc\r\n\r\nbody"),
            Err(DaemonError::MalformedResponse)
        ));
    }
}
