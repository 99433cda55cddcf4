//! Long-poll event listener: polls a server for HTML event fragments and
//! appends them to a container while the user stays on the events page.

pub mod core;
pub mod feed;
pub mod poller;

#[cfg(test)]
pub mod test_support;

pub use crate::core::container::{DomContainer, EventContainer, WriterContainer, render_events};
pub use crate::core::fragment::TrustedFragment;
pub use crate::core::guard::{Location, NavigationGuard, PathGuard, page_guard};
pub use feed::{EventSource, HttpEventSource, PollError, PollResponse, PollStatus};
pub use poller::{DEFAULT_DRAIN_TIMEOUT, FailurePolicy, LoopExit, LoopSummary, Poller, PollerConfig, SubscribeMode};
