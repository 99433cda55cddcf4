//! # Poll Loop
//!
//! Repeats poll cycles while the navigation guard holds.
//!
//! ```text
//!        ┌──────────────────────────────────────────┐
//!        ▼                                          │
//!   guard holds? ──no──► stopped                    │
//!        │yes                                       │
//!        ▼                                          │
//!   poll_once() ──err──► log (or stop, per policy)  │
//!        │                     │                    │
//!        ▼                     ▼                    │
//!   sleep(delay) if configured ─────────────────────┘
//! ```
//!
//! The guard is checked at the top of each iteration only. A cycle in flight
//! always runs to completion. The loop also ends once the container reports
//! it is closed.
//!
//! Detached subscribe tasks are collected as the loop runs and awaited, up to
//! `PollerConfig::drain_timeout`, before `run` returns. A runtime shut down
//! right after `run` therefore never drops a subscribe that was still in
//! flight.

mod cycle;

pub use cycle::{CycleReport, SubscribeOutcome};

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::core::container::EventContainer;
use crate::core::guard::NavigationGuard;
use crate::feed::{EventSource, PollError};

/// How the subscribe handshake is sent when the server reports "not started".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeMode {
    /// Wait for the subscribe request before rendering.
    #[default]
    Await,
    /// Fire and forget on a background task.
    Detached,
}

/// What the loop does when a cycle fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the error and keep polling.
    #[default]
    Continue,
    /// Log the error and end the loop.
    Stop,
}

/// How long `run` waits for detached subscribes still in flight.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause after every cycle. `None` polls back to back.
    pub delay: Option<Duration>,
    pub subscribe_mode: SubscribeMode,
    pub failure_policy: FailurePolicy,
    /// Insert event markup verbatim. When false, events are escaped.
    pub trust_markup: bool,
    /// Upper bound on the wait for detached subscribes when the loop ends.
    pub drain_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            delay: None,
            subscribe_mode: SubscribeMode::default(),
            failure_policy: FailurePolicy::default(),
            trust_markup: true,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Why the loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// The guard stopped holding.
    NavigatedAway,
    /// A cycle failed under `FailurePolicy::Stop`.
    Failed(PollError),
    /// The container stopped accepting events.
    OutputClosed,
}

#[derive(Debug)]
pub struct LoopSummary {
    /// Cycles that completed successfully.
    pub cycles: usize,
    pub failures: usize,
    /// Total nodes appended across all cycles.
    pub rendered: usize,
    /// Subscribes that finished: awaited in a cycle, or detached and joined.
    pub subscribes: usize,
    /// Detached subscribes still running when the drain timeout ran out.
    /// These were aborted.
    pub abandoned_subscribes: usize,
    pub exit: LoopExit,
}

impl Default for LoopSummary {
    fn default() -> Self {
        Self {
            cycles: 0,
            failures: 0,
            rendered: 0,
            subscribes: 0,
            abandoned_subscribes: 0,
            exit: LoopExit::NavigatedAway,
        }
    }
}

pub struct Poller {
    source: Arc<dyn EventSource>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(source: Arc<dyn EventSource>, config: PollerConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Polls until `guard` stops holding, the container closes, or (under
    /// `FailurePolicy::Stop`) a cycle fails.
    ///
    /// At most one cycle is in flight at a time. Detached subscribe tasks are
    /// the only work that can outlive a cycle, and they are drained before
    /// this returns.
    pub async fn run(
        &self,
        container: &mut dyn EventContainer,
        guard: &dyn NavigationGuard,
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut detached: Vec<JoinHandle<()>> = Vec::new();
        info!(
            "Poll loop starting: source={}, delay={:?}, subscribe={:?}",
            self.source.name(),
            self.config.delay,
            self.config.subscribe_mode
        );

        while guard.should_continue() {
            match self.poll_once(container).await {
                Ok(report) => {
                    summary.cycles += 1;
                    summary.rendered += report.rendered;
                    debug!(
                        "Cycle {} done: rendered={}, subscribe={:?}",
                        summary.cycles, report.rendered, report.subscribe
                    );
                    match report.subscribe {
                        SubscribeOutcome::Completed => summary.subscribes += 1,
                        SubscribeOutcome::Detached(handle) => detached.push(handle),
                        SubscribeOutcome::Skipped => {}
                    }
                }
                Err(e) => {
                    summary.failures += 1;
                    warn!("Poll cycle failed: {}", e);
                    if self.config.failure_policy == FailurePolicy::Stop {
                        info!("Stopping poll loop after failure");
                        summary.exit = LoopExit::Failed(e);
                        break;
                    }
                }
            }
            summary.subscribes += reap_finished(&mut detached);

            if container.is_closed() {
                info!("Event container closed, stopping poll loop");
                summary.exit = LoopExit::OutputClosed;
                break;
            }

            if let Some(delay) = self.config.delay {
                tokio::time::sleep(delay).await;
            }
        }

        self.drain_subscribes(detached, &mut summary).await;

        info!(
            "Poll loop stopped ({:?}) after {} cycle(s), {} failure(s)",
            summary.exit, summary.cycles, summary.failures
        );
        summary
    }

    /// Waits for outstanding detached subscribes, sharing one deadline.
    /// Whatever is still running at the deadline is aborted.
    async fn drain_subscribes(&self, handles: Vec<JoinHandle<()>>, summary: &mut LoopSummary) {
        if handles.is_empty() {
            return;
        }
        debug!("Waiting for {} background subscribe(s)", handles.len());

        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => summary.subscribes += 1,
                Ok(Err(e)) => warn!("Background subscribe task failed: {}", e),
                Err(_) => {
                    handle.abort();
                    summary.abandoned_subscribes += 1;
                }
            }
        }

        if summary.abandoned_subscribes > 0 {
            warn!(
                "Gave up on {} background subscribe(s) after {:?}",
                summary.abandoned_subscribes, self.config.drain_timeout
            );
        }
    }
}

/// Drops handles whose task already ended and returns how many there were.
fn reap_finished(handles: &mut Vec<JoinHandle<()>>) -> usize {
    let before = handles.len();
    handles.retain(|handle| !handle.is_finished());
    before - handles.len()
}
