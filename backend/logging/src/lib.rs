//! Structured logging components for StudySnap.
//!
//! Handles subscriber setup (console + rolling NDJSON file) and scrubbing of
//! credentials from text before it is logged or shown to a user.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LogGuard};
pub use redact::redact_sensitive_data;
