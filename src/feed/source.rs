use std::fmt;

use async_trait::async_trait;

use super::types::PollResponse;

/// Errors that can occur while talking to the event source.
#[derive(Debug)]
pub enum PollError {
    /// Network-level failure (DNS, connection refused, body read).
    Network(String),
    /// Poll endpoint answered with a non-success status.
    Api { status: u16, message: String },
    /// Poll body was not a valid `PollResponse`.
    Parse(String),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Network(msg) => write!(f, "network error: {msg}"),
            PollError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            PollError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for PollError {}

/// The two server endpoints a poll loop talks to.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns the name of the source, for logs.
    fn name(&self) -> &str;

    /// Fetches the next batch of events.
    async fn poll(&self) -> Result<PollResponse, PollError>;

    /// Asks the server to start delivering events to this client.
    ///
    /// Only transport failures are errors; the response itself is ignored.
    async fn subscribe(&self) -> Result<(), PollError>;
}
