//! Client construction parameters.

use std::time::Duration;

use crate::error::EnreachError;
use crate::poll::PollPolicy;

pub const DEFAULT_DISCOVERY_URL: &str = "https://discover.enreachvoice.com";
pub const DEFAULT_USER_AGENT: &str = concat!("enreach-rs/", env!("CARGO_PKG_VERSION"));

/// How the client proves its identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SecretKey(String),
    /// Exchanged for a secret key during authentication.
    Password(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SecretKey(_) => f.write_str("SecretKey(***)"),
            Credential::Password(_) => f.write_str("Password(***)"),
        }
    }
}

/// Validated configuration for [`crate::EnreachClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: String,
    pub credential: Credential,
    pub discovery_url: String,
    /// Bypasses discovery when set.
    pub api_endpoint: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub transcript_poll: PollPolicy,
}

impl ClientConfig {
    pub fn builder(username: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            username: username.into(),
            secret_key: None,
            password: None,
            discovery_url: None,
            api_endpoint: None,
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            transcript_poll: PollPolicy::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    username: String,
    secret_key: Option<String>,
    password: Option<String>,
    discovery_url: Option<String>,
    api_endpoint: Option<String>,
    request_timeout: Duration,
    user_agent: Option<String>,
    transcript_poll: PollPolicy,
}

impl ClientConfigBuilder {
    pub fn secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    pub fn api_endpoint(mut self, url: impl Into<String>) -> Self {
        self.api_endpoint = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn transcript_poll(mut self, policy: PollPolicy) -> Self {
        self.transcript_poll = policy;
        self
    }

    /// A secret key takes precedence over a password when both are given.
    pub fn build(self) -> Result<ClientConfig, EnreachError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(EnreachError::parameter("username is required"));
        }
        let credential = match (non_empty(self.secret_key), non_empty(self.password)) {
            (Some(key), _) => Credential::SecretKey(key),
            (None, Some(password)) => Credential::Password(password),
            (None, None) => {
                return Err(EnreachError::parameter(
                    "either a secret key or a password must be provided",
                ))
            }
        };
        let discovery_url = non_empty(self.discovery_url)
            .unwrap_or_else(|| DEFAULT_DISCOVERY_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let api_endpoint = non_empty(self.api_endpoint).map(|url| url.trim_end_matches('/').to_string());

        Ok(ClientConfig {
            username,
            credential,
            discovery_url,
            api_endpoint,
            request_timeout: self.request_timeout,
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            transcript_poll: self.transcript_poll,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
