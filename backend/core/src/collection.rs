//! In-memory problem collection, updated reducer-style by identifier.
//!
//! The collection never reaches out to anything; every mutation is a plain
//! method call so a single owner (the tracker task) can apply messages in
//! order.

use std::sync::Arc;

use serde::Serialize;

use crate::error::SnapError;
use crate::types::{ProblemId, ProblemItem, ProblemStatus, SolveOutcome};

/// Result of merging a solve outcome into the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// The item moved to the given terminal status.
    Applied(ProblemStatus),
    /// No item with that id; it was deleted or cleared while in flight.
    Orphaned,
    /// The item had already reached a terminal state.
    AlreadyResolved,
}

/// Per-status tallies of the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub analyzing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    /// Count items per status; works on snapshots as well as the live list.
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a ProblemItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut counts, item| {
            match item.status {
                ProblemStatus::Analyzing => counts.analyzing += 1,
                ProblemStatus::Completed { .. } => counts.completed += 1,
                ProblemStatus::Error { .. } => counts.error += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.analyzing + self.completed + self.error
    }
}

/// Shared, immutable view of the collection at one point in time.
pub type Snapshot = Arc<[Arc<ProblemItem>]>;

/// Ordered problem list, newest first.
///
/// Items are reference-counted so a snapshot shares them with the live list;
/// a resolution copies only the item it changes.
#[derive(Debug, Clone, Default)]
pub struct ProblemCollection {
    items: Vec<Arc<ProblemItem>>,
}

impl ProblemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a batch ahead of every existing item, keeping the batch's own order.
    pub fn insert_batch(&mut self, batch: Vec<ProblemItem>) -> Result<usize, SnapError> {
        for (i, item) in batch.iter().enumerate() {
            let seen_in_batch = batch[..i].iter().any(|other| other.id == item.id);
            if seen_in_batch || self.get(&item.id).is_some() {
                return Err(SnapError::DuplicateProblem(item.id));
            }
        }
        let added = batch.len();
        let mut merged: Vec<Arc<ProblemItem>> = batch.into_iter().map(Arc::new).collect();
        merged.append(&mut self.items);
        self.items = merged;
        Ok(added)
    }

    /// Replace the status of the item with `id`; nothing else is touched.
    pub fn apply(&mut self, id: &ProblemId, outcome: SolveOutcome) -> ApplyResult {
        let Some(item) = self.items.iter_mut().find(|item| &item.id == id) else {
            return ApplyResult::Orphaned;
        };
        if item.status.is_terminal() {
            return ApplyResult::AlreadyResolved;
        }
        let item = Arc::make_mut(item);
        item.resolve(outcome);
        ApplyResult::Applied(item.status.clone())
    }

    pub fn remove(&mut self, id: &ProblemId) -> Option<ProblemItem> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        Some(Arc::unwrap_or_clone(self.items.remove(index)))
    }

    /// Drop everything. Returns how many items were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn get(&self, id: &ProblemId) -> Option<&ProblemItem> {
        self.items.iter().find(|item| &item.id == id).map(Arc::as_ref)
    }

    pub fn items(&self) -> &[Arc<ProblemItem>] {
        &self.items
    }

    pub fn snapshot(&self) -> Snapshot {
        self.items.as_slice().into()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(self.items.iter().map(Arc::as_ref))
    }
}
