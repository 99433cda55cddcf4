pub mod http;
pub mod source;
pub mod types;

pub use http::{Endpoints, HttpEventSource};
pub use source::{EventSource, PollError};
pub use types::{PollResponse, PollStatus};
