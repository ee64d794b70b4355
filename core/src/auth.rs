//! Service discovery and credential exchange.
//!
//! # Design
//! Authentication is three request/response pairs, each split into a
//! `build_*` and `parse_*` function like the resource accessors:
//!
//! 1. discovery: `GET {discovery_url}/api/user?user={username}` resolves the
//!    tenant's API endpoint (skipped when an endpoint is configured);
//! 2. password grant: `POST {endpoint}/authuser/{username}` trades a password
//!    for a secret key (skipped when a secret key is configured);
//! 3. identity: `GET {endpoint}/users/me` with Basic auth proves the secret
//!    key and yields the user id.
//!
//! [`authenticate`] runs the sequence and returns a complete [`Session`];
//! nothing is stored on a half-built client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ClientConfig, Credential};
use crate::error::EnreachError;
use crate::http::{
    decode_json, ensure_authenticated, HttpMethod, HttpRequest, HttpResponse, Transport,
};
use crate::types::CurrentUser;

/// An authenticated identity bound to one API endpoint. Immutable; build a
/// new client to re-authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub endpoint: String,
    pub username: String,
    pub user_id: String,
    pub secret_key: String,
    pub authenticated_at: DateTime<Utc>,
}

impl Session {
    /// `Authorization` header value for this session.
    pub fn authorization(&self) -> String {
        basic_auth(&self.username, &self.secret_key)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("secret_key", &"***")
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryEntry {
    #[serde(rename = "apiEndpoint")]
    api_endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PasswordGrant<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PasswordGrantResponse {
    secret_key: String,
}

pub(crate) fn default_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
        ("X-Json-Serializer".to_string(), "2".to_string()),
        ("User-Agent".to_string(), user_agent.to_string()),
    ]
}

pub(crate) fn basic_auth(username: &str, secret_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{secret_key}")))
}

pub fn build_discovery(discovery_url: &str, username: &str, user_agent: &str) -> HttpRequest {
    let mut request = HttpRequest::new(
        HttpMethod::Get,
        format!("{}/api/user", discovery_url.trim_end_matches('/')),
    );
    request.query.push(("user".to_string(), username.to_string()));
    request.headers = default_headers(user_agent);
    request
}

/// Returns the first advertised endpoint without its trailing slash.
pub fn parse_discovery(response: &HttpResponse) -> Result<String, EnreachError> {
    ensure_authenticated(response)?;
    let entries: Vec<DiscoveryEntry> = decode_json(response)?;
    let endpoint = entries
        .into_iter()
        .next()
        .map(|e| e.api_endpoint.trim_end_matches('/').to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| EnreachError::Authentication {
            status: Some(response.status),
            message: "discovery returned no API endpoint for this user".to_string(),
        })?;
    Ok(endpoint)
}

pub fn build_password_grant(
    endpoint: &str,
    username: &str,
    password: &str,
    user_agent: &str,
) -> Result<HttpRequest, EnreachError> {
    let body = serde_json::to_string(&PasswordGrant {
        user_name: username,
        password,
    })
    .map_err(|e| EnreachError::Serialization(e.to_string()))?;
    let mut request = HttpRequest::new(
        HttpMethod::Post,
        format!("{endpoint}/authuser/{}", urlencoding::encode(username)),
    );
    request.headers = default_headers(user_agent);
    request.body = Some(body);
    Ok(request)
}

pub fn parse_password_grant(response: &HttpResponse) -> Result<String, EnreachError> {
    ensure_authenticated(response)?;
    let grant: PasswordGrantResponse =
        decode_json(response).map_err(|e| EnreachError::Authentication {
            status: Some(response.status),
            message: format!("invalid authentication response: {e}"),
        })?;
    Ok(grant.secret_key)
}

pub fn build_current_user(
    endpoint: &str,
    username: &str,
    secret_key: &str,
    user_agent: &str,
) -> HttpRequest {
    let mut request = HttpRequest::new(HttpMethod::Get, format!("{endpoint}/users/me"));
    request.headers = default_headers(user_agent);
    request
        .headers
        .push(("Authorization".to_string(), basic_auth(username, secret_key)));
    request
}

pub fn parse_current_user(response: &HttpResponse) -> Result<CurrentUser, EnreachError> {
    ensure_authenticated(response)?;
    decode_json(response)
}

/// Resolve the endpoint, obtain a secret key if needed, and verify it.
pub fn authenticate<T: Transport>(
    transport: &T,
    config: &ClientConfig,
) -> Result<Session, EnreachError> {
    let endpoint = match &config.api_endpoint {
        Some(endpoint) => {
            debug!(%endpoint, "using configured API endpoint");
            endpoint.clone()
        }
        None => {
            let request = build_discovery(&config.discovery_url, &config.username, &config.user_agent);
            debug!(url = %request.url, "invoking discovery");
            let endpoint = parse_discovery(&transport.execute(&request)?)?;
            info!(%endpoint, "discovered API endpoint");
            endpoint
        }
    };

    let secret_key = match &config.credential {
        Credential::SecretKey(key) => key.clone(),
        Credential::Password(password) => {
            debug!("exchanging password for secret key");
            let request =
                build_password_grant(&endpoint, &config.username, password, &config.user_agent)?;
            parse_password_grant(&transport.execute(&request)?)?
        }
    };

    let request = build_current_user(&endpoint, &config.username, &secret_key, &config.user_agent);
    let user = parse_current_user(&transport.execute(&request)?)?;
    info!(username = %config.username, user_id = %user.id, "authenticated");

    Ok(Session {
        endpoint,
        username: config.username.clone(),
        user_id: user.id,
        secret_key,
        authenticated_at: Utc::now(),
    })
}
