//! Practice session lifecycle and aggregation.

mod engine;
mod summary;

pub use engine::{SessionEngine, SessionState};
pub use summary::{format_duration, SessionSummary};
