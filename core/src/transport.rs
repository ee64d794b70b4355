//! Blocking `Transport` backed by a `ureq` agent.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::EnreachError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Upper bound on a single response body. Recordings are the largest payloads.
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// Executes requests with a shared `ureq::Agent`.
///
/// The agent is configured with `http_status_as_error(false)` so 4xx/5xx
/// responses come back as data and the client parsers classify them.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, EnreachError> {
        let started = Instant::now();
        let body = request.body.as_deref().unwrap_or_default();
        let result = match request.method {
            HttpMethod::Get => with_parts(self.agent.get(&request.url), request).call(),
            HttpMethod::Delete => with_parts(self.agent.delete(&request.url), request).call(),
            HttpMethod::Post => with_parts(self.agent.post(&request.url), request).send(body.as_bytes()),
            HttpMethod::Put => with_parts(self.agent.put(&request.url), request).send(body.as_bytes()),
        };
        let mut response = result.map_err(|e| {
            debug!(method = request.method.as_str(), url = %request.url, error = %e, "HTTP request failed");
            EnreachError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| EnreachError::Transport(e.to_string()))?;

        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received HTTP response"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_parts<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (name, value) in &request.query {
        builder = builder.query(name, value);
    }
    builder
}
