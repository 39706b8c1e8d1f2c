use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::SnapError;
use crate::types::{ProblemId, ProblemItem, SolveOutcome};

/// One-shot acknowledgement sent back once the tracker has applied a message.
pub type Reply<T> = oneshot::Sender<T>;

/// Messages consumed by the problem tracker, the collection's single writer.
#[derive(Debug)]
pub enum Message {
    /// Intake → Tracker: a freshly accepted batch, all `Analyzing`
    Submit {
        items: Vec<ProblemItem>,
        reply: Option<Reply<Result<usize, SnapError>>>,
    },
    /// Resolver → Tracker: one item's solve call finished
    Resolved(SolveResult),
    /// User → Tracker: remove one item; replies whether it existed
    Delete {
        id: ProblemId,
        reply: Option<Reply<bool>>,
    },
    /// User → Tracker: remove everything; replies with the number removed
    Clear { reply: Option<Reply<usize>> },
}

/// Completion event emitted by a solve resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveResult {
    pub id: ProblemId,
    pub outcome: SolveOutcome,
}

impl Message {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Submit { .. } => "submit",
            Message::Resolved(_) => "resolved",
            Message::Delete { .. } => "delete",
            Message::Clear { .. } => "clear",
        }
    }
}
