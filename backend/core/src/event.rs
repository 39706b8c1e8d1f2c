use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ProblemId;

/// A change applied to the problem collection, broadcast to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub problem_id: Option<ProblemId>,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Categories of collection changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new item entered the collection in `analyzing`
    ProblemAdded,
    /// An item's solve call returned a solution
    ProblemCompleted,
    /// An item's solve call failed or returned nothing
    ProblemFailed,
    /// The user removed an item
    ProblemDeleted,
    /// The user removed every item
    CollectionCleared,
    /// A solve result arrived for an item that no longer exists
    ResultOrphaned,
}

impl Event {
    pub fn new(problem_id: Option<ProblemId>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id,
            timestamp: Utc::now(),
            kind,
            payload,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}
