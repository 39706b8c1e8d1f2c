pub mod session;
pub mod tracker;

pub use session::StudySession;
pub use tracker::{apply_message, ProblemTracker};
