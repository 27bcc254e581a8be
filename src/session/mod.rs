//! The generation-attempt session: a bounded retry loop that drives the
//! generator, scores each draft, and adapts parameters between attempts.

mod controller;
mod machine;
mod summary;

pub use controller::{GenerationMode, SessionController, SessionRequest};
pub use machine::SessionState;
pub use summary::{AttemptSummary, SessionReport, SessionSummary};
