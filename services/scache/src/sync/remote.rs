//! Partner strategy feed.
//!
//! `GET <url>` returns `{"code": int, "msg": string, "data": [Strategy]}`.
//! A non-zero `code` is a failure regardless of the HTTP status.

use std::time::Duration;

use monstra_model::Strategy;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Bytes of a failed response body kept in [`RemoteError::Status`].
pub const MAX_ERROR_BODY_BYTES: usize = 512;

/// Partner feed errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Failed to build the HTTP client.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed or timed out.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status without a parsable envelope. `body` holds at
    /// most [`MAX_ERROR_BODY_BYTES`] of the response.
    #[error("request to {url} failed (status={status}): {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The body was not a valid envelope.
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The partner reported an application-level failure.
    #[error("partner returned code={code} msg={msg}")]
    Application { code: i64, msg: String },
}

/// Response envelope of the partner feed.
#[derive(Debug, Deserialize)]
pub struct RemoteStraResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Vec<Strategy>>,
}

impl RemoteStraResponse {
    /// Unwrap the strategy list, failing on a non-zero code.
    pub fn into_result(self) -> Result<Vec<Strategy>, RemoteError> {
        if self.code != 0 {
            return Err(RemoteError::Application {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(self.data.unwrap_or_default())
    }
}

/// HTTP client for the partner strategy feed.
#[derive(Debug, Clone)]
pub struct RemoteStraClient {
    client: reqwest::Client,
    url: String,
}

impl RemoteStraClient {
    /// Create a client whose requests are bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("monstra-scache/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(RemoteError::Client)?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the partner strategy set. Timestamps are returned as sent.
    pub async fn fetch(&self) -> Result<Vec<Strategy>, RemoteError> {
        debug!(url = %self.url, "Fetching partner strategies");

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| self.request_error(source))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|source| self.request_error(source))?;

        let envelope: RemoteStraResponse = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(RemoteError::Status {
                    url: self.url.clone(),
                    status,
                    body: error_body(&body),
                });
            }
            Err(source) => {
                return Err(RemoteError::Decode {
                    url: self.url.clone(),
                    source,
                });
            }
        };

        envelope.into_result()
    }

    fn request_error(&self, source: reqwest::Error) -> RemoteError {
        RemoteError::Request {
            url: self.url.clone(),
            source,
        }
    }
}

fn error_body(body: &[u8]) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return String::from_utf8_lossy(body).into_owned();
    }
    let mut text = String::from_utf8_lossy(&body[..MAX_ERROR_BODY_BYTES]).into_owned();
    text.push_str("...(truncated)");
    text
}
