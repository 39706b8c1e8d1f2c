pub mod channel;
pub mod collection;
pub mod error;
pub mod event;
pub mod message;
pub mod traits;
pub mod types;

pub use channel::SnapBus;
pub use collection::{ApplyResult, ProblemCollection, Snapshot, StatusCounts};
pub use error::SnapError;
pub use event::{Event, EventKind};
pub use message::{Message, Reply, SolveResult};
pub use traits::{Component, SolveProvider, SolveRequest, SolveResponse};
pub use types::{
    ImageReference, ProblemId, ProblemItem, ProblemStatus, SolveOutcome, Subject,
    EMPTY_SOLUTION_MESSAGE, FALLBACK_ERROR_MESSAGE,
};
