//! # Poll Cycle
//!
//! One round trip against the poll endpoint:
//!
//! ```text
//! poll() ──► status == "not started"? ──yes──► subscribe()
//!                      │                         (awaited or detached)
//!                      ▼
//!            events ──► trust boundary ──► render_events() ──► container
//! ```

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use super::{Poller, SubscribeMode};
use crate::core::container::{EventContainer, render_events};
use crate::feed::{EventSource, PollError, PollStatus};

/// What happened to the subscribe handshake during a cycle.
#[derive(Debug)]
pub enum SubscribeOutcome {
    /// The server was already started; nothing sent.
    Skipped,
    /// Subscribe was sent and awaited.
    Completed,
    /// Subscribe was spawned and left running. `Poller::run` keeps the handle
    /// and waits for it (bounded by `PollerConfig::drain_timeout`) before it
    /// returns; callers of `poll_once` own that wait themselves.
    Detached(JoinHandle<()>),
}

impl SubscribeOutcome {
    pub fn was_issued(&self) -> bool {
        !matches!(self, SubscribeOutcome::Skipped)
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub status: PollStatus,
    /// Number of nodes appended to the container.
    pub rendered: usize,
    pub subscribe: SubscribeOutcome,
}

impl Poller {
    /// Runs a single poll cycle against `container`.
    ///
    /// Fails if the poll request fails, or if an awaited subscribe fails to send.
    /// Nothing is rendered for a failed cycle.
    pub async fn poll_once(
        &self,
        container: &mut dyn EventContainer,
    ) -> Result<CycleReport, PollError> {
        let response = self.source.poll().await?;
        debug!(
            "Poll from {}: status={:?}, events={}",
            self.source.name(),
            response.poll,
            response.events.as_ref().map_or(0, Vec::len)
        );

        let status = response.poll.clone();
        let subscribe = if status.is_not_started() {
            self.subscribe().await?
        } else {
            SubscribeOutcome::Skipped
        };

        let fragments = response.into_fragments(self.config.trust_markup);
        let rendered = render_events(fragments, container);

        Ok(CycleReport {
            status,
            rendered,
            subscribe,
        })
    }

    async fn subscribe(&self) -> Result<SubscribeOutcome, PollError> {
        match self.config.subscribe_mode {
            SubscribeMode::Await => {
                info!("Server reports not started, subscribing");
                self.source.subscribe().await?;
                Ok(SubscribeOutcome::Completed)
            }
            SubscribeMode::Detached => {
                info!("Server reports not started, subscribing in background");
                let source = Arc::clone(&self.source);
                let handle = tokio::spawn(async move {
                    if let Err(e) = source.subscribe().await {
                        warn!("Background subscribe failed: {}", e);
                    }
                });
                Ok(SubscribeOutcome::Detached(handle))
            }
        }
    }
}
