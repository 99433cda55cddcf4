//! Wire types for the poll endpoint.

use serde::{Deserialize, Deserializer};

use crate::core::fragment::TrustedFragment;

/// Status string the server sends before this client has subscribed.
pub const NOT_STARTED: &str = "not started";

/// Subscription state reported in the `poll` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// The server has no subscription for us yet.
    NotStarted,
    /// Anything else, kept verbatim for logging.
    Other(String),
}

impl PollStatus {
    pub fn is_not_started(&self) -> bool {
        matches!(self, PollStatus::NotStarted)
    }
}

impl From<String> for PollStatus {
    fn from(s: String) -> Self {
        if s == NOT_STARTED {
            PollStatus::NotStarted
        } else {
            PollStatus::Other(s)
        }
    }
}

impl<'de> Deserialize<'de> for PollStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(PollStatus::from)
    }
}

/// Body of `GET /poll/poll`: `{ "poll": string, "events"?: string[] }`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PollResponse {
    pub poll: PollStatus,
    /// Missing and `null` both mean "no events".
    #[serde(default)]
    pub events: Option<Vec<String>>,
}

impl PollResponse {
    /// Moves the raw event markup across the trust boundary.
    ///
    /// With `trust_markup` the fragments are inserted verbatim; otherwise
    /// they are escaped and render as text.
    pub fn into_fragments(self, trust_markup: bool) -> Option<Vec<TrustedFragment>> {
        self.events.map(|events| {
            events
                .into_iter()
                .map(|event| {
                    if trust_markup {
                        TrustedFragment::trust(event)
                    } else {
                        TrustedFragment::escaped(&event)
                    }
                })
                .collect()
        })
    }
}
