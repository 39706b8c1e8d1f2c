use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use studysnap_core::{
    ApplyResult, Component, Event, EventKind, Message, ProblemCollection, ProblemStatus, Snapshot,
};

/// The tracker is the only writer of the problem collection.
///
/// Resolvers and users never touch the collection directly; they send
/// messages, and the tracker applies them one at a time in arrival order.
/// After each message it publishes a newest-first snapshot and broadcasts
/// what changed. Snapshots share unchanged items with the collection.
pub struct ProblemTracker {
    snapshot_tx: watch::Sender<Snapshot>,
    events_tx: broadcast::Sender<Event>,
}

impl ProblemTracker {
    /// Returns the tracker and a receiver for collection snapshots.
    pub fn new(events_tx: broadcast::Sender<Event>) -> (Self, watch::Receiver<Snapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::from(Vec::new()));
        (
            Self {
                snapshot_tx,
                events_tx,
            },
            snapshot_rx,
        )
    }

    fn publish(&self, collection: &ProblemCollection, events: Vec<Event>) {
        self.snapshot_tx.send_replace(collection.snapshot());
        for event in events {
            // No observers is fine
            let _ = self.events_tx.send(event);
        }
    }
}

/// Apply one message to the collection and describe what changed.
pub fn apply_message(collection: &mut ProblemCollection, msg: Message) -> Vec<Event> {
    match msg {
        Message::Submit { items, reply } => {
            let added: Vec<Event> = items
                .iter()
                .map(|item| {
                    Event::new(
                        Some(item.id),
                        EventKind::ProblemAdded,
                        json!({
                            "file_name": item.image.file_name,
                            "mime_type": item.image.mime_type,
                            "subject": item.subject,
                        }),
                    )
                })
                .collect();
            let result = collection.insert_batch(items);
            let events = match &result {
                Ok(count) => {
                    info!(added = count, total = collection.len(), "Problems added");
                    added
                }
                Err(e) => {
                    warn!(error = %e, "Rejected submitted batch");
                    Vec::new()
                }
            };
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
            events
        }
        Message::Resolved(result) => {
            let id = result.id;
            match collection.apply(&id, result.outcome) {
                ApplyResult::Applied(ProblemStatus::Completed { solution }) => {
                    info!(problem_id = %id, "Problem completed");
                    vec![Event::new(
                        Some(id),
                        EventKind::ProblemCompleted,
                        json!({ "chars": solution.len() }),
                    )]
                }
                ApplyResult::Applied(ProblemStatus::Error { message }) => {
                    warn!(problem_id = %id, error = %message, "Problem failed");
                    vec![Event::new(
                        Some(id),
                        EventKind::ProblemFailed,
                        json!({ "error": message }),
                    )]
                }
                ApplyResult::Applied(ProblemStatus::Analyzing) => Vec::new(),
                ApplyResult::Orphaned => {
                    debug!(problem_id = %id, "Result for a deleted problem; dropping");
                    vec![Event::new(Some(id), EventKind::ResultOrphaned, json!({}))]
                }
                ApplyResult::AlreadyResolved => {
                    warn!(problem_id = %id, "Duplicate result for a resolved problem");
                    Vec::new()
                }
            }
        }
        Message::Delete { id, reply } => {
            let removed = collection.remove(&id).is_some();
            if let Some(reply) = reply {
                let _ = reply.send(removed);
            }
            if removed {
                info!(problem_id = %id, remaining = collection.len(), "Problem deleted");
                vec![Event::new(Some(id), EventKind::ProblemDeleted, json!({}))]
            } else {
                debug!(problem_id = %id, "Delete for unknown problem");
                Vec::new()
            }
        }
        Message::Clear { reply } => {
            let removed = collection.clear();
            if let Some(reply) = reply {
                let _ = reply.send(removed);
            }
            info!(removed, "Collection cleared");
            vec![Event::new(
                None,
                EventKind::CollectionCleared,
                json!({ "removed": removed }),
            )]
        }
    }
}

#[async_trait]
impl Component for ProblemTracker {
    fn name(&self) -> &str {
        "tracker"
    }

    async fn start(&self, mut rx: mpsc::Receiver<Message>) -> Result<()> {
        info!("Tracker started");
        let mut collection = ProblemCollection::new();

        while let Some(msg) = rx.recv().await {
            debug!(msg_type = msg.kind(), "Applying message");
            let events = apply_message(&mut collection, msg);
            self.publish(&collection, events);
        }

        info!("Tracker channel closed, shutting down");
        Ok(())
    }
}
