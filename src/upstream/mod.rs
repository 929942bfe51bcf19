//! Client for the link provider's REST API
//!
//! Every call is a bearer-authenticated GET. Non-200 responses are reported
//! as [`UpstreamError::Status`] values rather than raised, so the metrics
//! pipeline can short-circuit on the first failure without unwinding.

pub mod models;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Opaque bearer credential, forwarded verbatim as the `Authorization` header
#[derive(Clone)]
pub struct Credential(HeaderValue);

impl Credential {
    pub fn from_header(mut value: HeaderValue) -> Self {
        value.set_sensitive(true);
        Self(value)
    }

    fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `path` with `query` appended; the parsed JSON body on HTTP 200
    async fn get(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Value>;
}

/// GET and deserialize into the expected response shape
pub async fn get_as<T: DeserializeOwned>(
    upstream: &dyn Upstream,
    path: &str,
    query: &[(&str, String)],
) -> UpstreamResult<T> {
    let body = upstream.get(path, query).await?;
    Ok(serde_json::from_value(body)?)
}

/// Long-lived client configuration. Sessions are opened per incoming request.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    /// Open a session that attaches `credential` to every request.
    ///
    /// The session owns its own connection pool and is never shared between
    /// incoming requests; dropping it releases the connections.
    pub fn session(&self, credential: &Credential) -> UpstreamResult<UpstreamSession> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, credential.header_value().clone());

        let mut builder = Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .default_headers(headers);

        if let Some(secs) = self.config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(UpstreamSession {
            base_url: self.config.base_url.clone(),
            http: builder.build()?,
        })
    }
}

pub struct UpstreamSession {
    base_url: String,
    http: Client,
}

impl UpstreamSession {
    fn url(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Url> {
        let target = format!("{}{}", self.base_url, path);
        let mut url =
            Url::parse(&target).map_err(|e| UpstreamError::InvalidUrl(format!("{target}: {e}")))?;

        // query_pairs_mut() on an empty list still leaves a dangling '?'
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }
}

#[async_trait]
impl Upstream for UpstreamSession {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Value> {
        let url = self.url(path, query)?;
        debug!("GET {}", url);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            error!("Upstream GET {} returned {}: {}", path, status, body);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
