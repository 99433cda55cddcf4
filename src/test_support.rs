//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::core::guard::Location;
use crate::feed::{EventSource, PollError, PollResponse, PollStatus};

/// A source that replays canned poll results in order and counts calls.
///
/// Once the script runs out every poll fails with a network error.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<PollResponse, PollError>>>,
    poll_times: Mutex<Vec<Instant>>,
    subscribe_calls: AtomicUsize,
    subscribes_finished: AtomicUsize,
    subscribe_delay: Option<Duration>,
    fail_subscribe: bool,
    navigate_after: Option<(usize, Location, String)>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<PollResponse, PollError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            poll_times: Mutex::new(Vec::new()),
            subscribe_calls: AtomicUsize::new(0),
            subscribes_finished: AtomicUsize::new(0),
            subscribe_delay: None,
            fail_subscribe: false,
            navigate_after: None,
        }
    }

    /// Every subscribe call fails with a network error.
    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Every subscribe call takes `delay` before it answers.
    pub fn slow_subscribe(mut self, delay: Duration) -> Self {
        self.subscribe_delay = Some(delay);
        self
    }

    /// Navigates `location` to `path` while serving poll number `polls`.
    pub fn navigate_after(mut self, polls: usize, location: Location, path: &str) -> Self {
        self.navigate_after = Some((polls, location, path.to_string()));
        self
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_times.lock().unwrap().len()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().unwrap().clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Subscribe calls that ran to the end, including any delay.
    pub fn subscribes_finished(&self) -> usize {
        self.subscribes_finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn poll(&self) -> Result<PollResponse, PollError> {
        let count = {
            let mut times = self.poll_times.lock().unwrap();
            times.push(Instant::now());
            times.len()
        };
        if let Some((after, location, path)) = &self.navigate_after
            && *after == count
        {
            location.navigate(path.as_str());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PollError::Network("script exhausted".into())))
    }

    async fn subscribe(&self) -> Result<(), PollError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.subscribe_delay {
            tokio::time::sleep(delay).await;
        }
        self.subscribes_finished.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe {
            return Err(PollError::Network("subscribe refused".into()));
        }
        Ok(())
    }
}

fn response(status: PollStatus, events: &[&str]) -> PollResponse {
    PollResponse {
        poll: status,
        events: Some(events.iter().map(|e| e.to_string()).collect()),
    }
}

/// A `"started"` response carrying `events`.
pub fn started(events: &[&str]) -> PollResponse {
    response(PollStatus::Other("started".to_string()), events)
}

/// A `"not started"` response carrying `events`.
pub fn not_started(events: &[&str]) -> PollResponse {
    response(PollStatus::NotStarted, events)
}

/// A writer whose reader has gone away: every write fails with `BrokenPipe`.
pub struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}
