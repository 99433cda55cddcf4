//! # Core
//!
//! The page-side pieces of the listener. None of this does network I/O.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Fragments (trust)    │
//!                    │  • Containers (render)  │
//!                    │  • Guards (navigation)  │
//!                    │  • Config               │
//!                    └───────────┬─────────────┘
//!                                │
//!                                ▼
//!                    ┌─────────────────────────┐
//!                    │  poller (loop + cycle)  │──► feed (HTTP)
//!                    └─────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`fragment`]: `TrustedFragment`, the markup trust boundary
//! - [`container`]: `EventContainer` and the event renderer
//! - [`guard`]: `NavigationGuard`, `Location`, `PathGuard`
//! - [`config`]: config file, env and CLI resolution

pub mod config;
pub mod container;
pub mod fragment;
pub mod guard;
