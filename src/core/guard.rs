//! # Navigation Guard
//!
//! The poll loop keeps going only while the user is still on the events page.
//! Instead of reading global navigation state, the loop asks an injected
//! `NavigationGuard` once per iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use tokio::sync::watch;

/// Page the loop polls on unless configured otherwise.
pub const DEFAULT_PAGE: &str = "/event";

pub trait NavigationGuard {
    /// Returns true if another poll cycle should run.
    fn should_continue(&self) -> bool;
}

impl<F> NavigationGuard for F
where
    F: Fn() -> bool,
{
    fn should_continue(&self) -> bool {
        self()
    }
}

/// The current page path. Cloning shares the same underlying location.
#[derive(Debug, Clone)]
pub struct Location {
    path: Arc<watch::Sender<String>>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(path.into());
        Self { path: Arc::new(tx) }
    }

    pub fn pathname(&self) -> String {
        self.path.borrow().clone()
    }

    /// Moves to `path`. Works with no subscribers.
    pub fn navigate(&self, path: impl Into<String>) {
        let path = path.into();
        debug!("Navigating to {}", path);
        self.path.send_replace(path);
    }

    /// Watches for navigation changes.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.path.subscribe()
    }
}

/// Holds while `location` is on `page`.
#[derive(Debug, Clone)]
pub struct PathGuard {
    location: Location,
    page: String,
}

impl PathGuard {
    pub fn new(location: Location, page: impl Into<String>) -> Self {
        Self {
            location,
            page: page.into(),
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }
}

impl NavigationGuard for PathGuard {
    fn should_continue(&self) -> bool {
        *self.location.path.borrow() == self.page
    }
}

/// Holds for at most `limit` checks, then fails for good.
#[derive(Debug)]
pub struct CycleLimit {
    remaining: AtomicUsize,
}

impl CycleLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }
}

impl NavigationGuard for CycleLimit {
    fn should_continue(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Holds only while both guards hold. `first` is checked first.
pub struct Both<A, B> {
    first: A,
    second: B,
}

impl<A, B> Both<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: NavigationGuard, B: NavigationGuard> NavigationGuard for Both<A, B> {
    fn should_continue(&self) -> bool {
        self.first.should_continue() && self.second.should_continue()
    }
}

/// Guard for a loop running on `page`: holds while `location` stays there
/// and, with `cycle_limit`, for at most that many cycles.
pub fn page_guard(
    location: Location,
    page: impl Into<String>,
    cycle_limit: Option<usize>,
) -> Box<dyn NavigationGuard> {
    let on_page = PathGuard::new(location, page);
    match cycle_limit {
        Some(limit) => Box::new(Both::new(on_page, CycleLimit::new(limit))),
        None => Box::new(on_page),
    }
}
