//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The `build_*` / `parse_*` halves of
//! the client never touch the network; a [`Transport`] executes the round
//! trip in between. Production code uses [`crate::UreqTransport`], tests plug
//! in scripted transports.
//!
//! Response bodies are raw bytes because recordings are binary; JSON parsers
//! decode from the byte slice directly.

use std::time::Duration;

use crate::error::EnreachError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute; `query` pairs are appended by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as text, lossily decoded. Used for error messages and logs.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes one `HttpRequest` and returns whatever the server answered.
///
/// Implementations must return non-2xx responses as `Ok`; status
/// interpretation belongs to the parsers. `Err` is reserved for failures
/// that produced no response at all.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, EnreachError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, EnreachError> {
        (**self).execute(request)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Map a non-2xx response onto the error taxonomy.
///
/// 429 is always `RateLimit` and 401 is always `Authentication`; everything
/// else is a generic `Api` error.
pub(crate) fn ensure_success(response: &HttpResponse) -> Result<(), EnreachError> {
    if response.is_success() {
        return Ok(());
    }
    let message = server_message(response);
    match response.status {
        429 => Err(EnreachError::RateLimit {
            retry_after: retry_after(response),
            message,
        }),
        401 => Err(EnreachError::Authentication {
            status: Some(401),
            message,
        }),
        status => Err(EnreachError::Api { status, message }),
    }
}

/// Like [`ensure_success`], but every non-2xx other than 429 is an
/// authentication failure. Used for the discovery and credential exchanges.
pub(crate) fn ensure_authenticated(response: &HttpResponse) -> Result<(), EnreachError> {
    match ensure_success(response) {
        Err(EnreachError::Api { status, message }) => Err(EnreachError::Authentication {
            status: Some(status),
            message,
        }),
        other => other,
    }
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    response: &HttpResponse,
) -> Result<T, EnreachError> {
    serde_json::from_slice(&response.body).map_err(|e| EnreachError::Decode(e.to_string()))
}

/// Prefer the server's `Message` field; fall back to the raw body.
fn server_message(response: &HttpResponse) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_slice(&response.body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("Message").or_else(|| v.get("message")))
        .and_then(|m| m.as_str())
    {
        return message.to_string();
    }
    let text = response.text();
    if text.trim().is_empty() {
        format!("HTTP {}", response.status)
    } else {
        text
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
