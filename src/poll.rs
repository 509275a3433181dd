//! Polling a team server for its message

use async_trait::async_trait;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Resource fetched relative to the registered address
pub const MESSAGE_RESOURCE: &str = "message";

/// Largest message body kept for a team
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Why a poll did not produce a message
///
/// Only ever surfaced as the reason string in a team's status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("cannot get URL: {0}")]
    Request(String),

    #[error("invalid status code {0} from server")]
    Status(String),

    #[error("cannot read message body: {0}")]
    Body(String),

    #[error("message body exceeds {0} bytes")]
    TooLarge(usize),

    #[error("timed out trying to connect to server")]
    Timeout,

    #[error("poll attempt failed: {0}")]
    Aborted(String),
}

/// Fetches the message a team server currently serves
#[async_trait]
pub trait Prober: Send + Sync {
    async fn fetch_message(&self, address: &str) -> Result<String, PollError>;
}

/// Prober that issues `GET <address>message` over HTTP
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: reqwest::Client,
    max_message_bytes: usize,
}

impl HttpProber {
    /// `request_timeout` caps how long a single request may live, including
    /// attempts the monitor has already given up on
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            max_message_bytes: MAX_MESSAGE_BYTES,
        })
    }

    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn fetch_message(&self, address: &str) -> Result<String, PollError> {
        let url = format!("{}{}", address, MESSAGE_RESOURCE);
        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::Request(error_chain(&e)))?;

        if !response.status().is_success() {
            return Err(PollError::Status(response.status().to_string()));
        }

        let limit = self.max_message_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(PollError::TooLarge(limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PollError::Body(error_chain(&e)))?
        {
            if body.len() + chunk.len() > limit {
                return Err(PollError::TooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Render an error with its sources, `outer: inner: root`
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_str = cause.to_string();
        if !out.contains(&cause_str) {
            out.push_str(": ");
            out.push_str(&cause_str);
        }
        source = cause.source();
    }
    out
}
