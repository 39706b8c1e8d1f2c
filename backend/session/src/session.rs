//! Session handle: wires intake, resolvers, and the tracker together.

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

use std::sync::Arc;

use studysnap_core::{
    Component, Event, Message, ProblemId, ProblemItem, SnapBus, SnapError, Snapshot, Subject,
};
use studysnap_media::{IntakeMode, UploadIntake, UploadedFile};
use studysnap_solver::SolveResolver;

use crate::tracker::ProblemTracker;

/// One running StudySnap session.
///
/// Owns the sending side of the tracker's channel. The collection lives only
/// inside the tracker task; this handle reads it through snapshots.
pub struct StudySession {
    tracker_tx: mpsc::Sender<Message>,
    snapshot_rx: watch::Receiver<Snapshot>,
    events_tx: broadcast::Sender<Event>,
    resolver: SolveResolver,
    previews: bool,
}

impl StudySession {
    /// Start the tracker task with the default bus.
    pub fn start(resolver: SolveResolver) -> Self {
        Self::with_bus(resolver, SnapBus::new())
    }

    pub fn with_bus(resolver: SolveResolver, mut bus: SnapBus) -> Self {
        let (tracker, snapshot_rx) = ProblemTracker::new(bus.events_tx.clone());
        // A fresh bus always has its receiver
        if let Some(tracker_rx) = bus.take_tracker_rx() {
            tokio::spawn(async move {
                if let Err(e) = tracker.start(tracker_rx).await {
                    error!(error = %e, "Tracker task failed");
                }
            });
        } else {
            error!("Tracker receiver already taken; session will not apply updates");
        }

        info!(
            provider = %resolver.provider_name(),
            model = %resolver.model(),
            "Study session started"
        );

        Self {
            tracker_tx: bus.tracker_tx,
            snapshot_rx,
            events_tx: bus.events_tx,
            resolver,
            previews: false,
        }
    }

    /// Attach `data:` previews to new items (for UIs that display them).
    pub fn with_previews(mut self, enabled: bool) -> Self {
        self.previews = enabled;
        self
    }

    /// Accept a selection of files and start solving every accepted image.
    ///
    /// Returns once the new items are in the collection; solve calls keep
    /// running in the background, one independent task per item.
    pub async fn submit(
        &self,
        files: Vec<UploadedFile>,
        mode: IntakeMode,
        subject: Subject,
    ) -> Result<Vec<ProblemId>, SnapError> {
        let accepted = UploadIntake::new(mode)
            .with_previews(self.previews)
            .accept(files)?;
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let items: Vec<ProblemItem> = accepted
            .iter()
            .map(|image| image.to_item(subject, now))
            .collect();
        let ids: Vec<ProblemId> = items.iter().map(|item| item.id).collect();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Message::Submit {
            items,
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SnapError::ChannelClosed("tracker dropped submit reply".into()))??;

        for (id, image) in ids.iter().zip(accepted) {
            self.resolver
                .spawn(*id, image, subject, self.tracker_tx.clone());
        }

        Ok(ids)
    }

    /// Remove one item. Returns whether it existed.
    ///
    /// An in-flight solve call for it keeps running; its result is dropped.
    pub async fn delete(&self, id: ProblemId) -> Result<bool, SnapError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Message::Delete {
            id,
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SnapError::ChannelClosed("tracker dropped delete reply".into()))
    }

    /// Remove every item. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, SnapError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Message::Clear {
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SnapError::ChannelClosed("tracker dropped clear reply".into()))
    }

    /// Current collection, newest first. Shares items with the tracker.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn get(&self, id: &ProblemId) -> Option<Arc<ProblemItem>> {
        self.snapshot_rx
            .borrow()
            .iter()
            .find(|item| &item.id == id)
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until no item is `analyzing`, then return the collection.
    pub async fn wait_until_settled(&self) -> Result<Snapshot, SnapError> {
        let mut rx = self.snapshot_rx.clone();
        let settled = rx
            .wait_for(|items| items.iter().all(|item| item.status.is_terminal()))
            .await
            .map_err(|_| SnapError::ChannelClosed("tracker stopped".into()))?;
        Ok(settled.clone())
    }

    async fn send(&self, msg: Message) -> Result<(), SnapError> {
        self.tracker_tx
            .send(msg)
            .await
            .map_err(|_| SnapError::ChannelClosed("tracker is not running".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use studysnap_core::{EventKind, ProblemStatus};
    use studysnap_media::encode_base64;
    use studysnap_solver::MockProvider;

    fn session(provider: MockProvider) -> StudySession {
        StudySession::start(SolveResolver::new(Arc::new(provider), "mock-model"))
    }

    fn file(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile::new(name, None, bytes.to_vec())
    }

    fn names(items: &[Arc<ProblemItem>]) -> Vec<&str> {
        items.iter().map(|i| i.image.file_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_batch_submit_filters_and_orders() {
        let s = session(MockProvider::new("mock").with_delay(Duration::from_secs(60)));
        let ids = s
            .submit(
                vec![
                    file("a.png", b"a"),
                    file("b.jpg", b"b"),
                    file("not-an-image.txt", b"t"),
                ],
                IntakeMode::Batch,
                Subject::Math,
            )
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        let items = s.snapshot();
        assert_eq!(names(&items), vec!["a.png", "b.jpg"]);
        assert!(items.iter().all(|i| i.status == ProblemStatus::Analyzing));
        assert!(Arc::ptr_eq(&items, &s.snapshot()));
    }

    #[tokio::test]
    async fn test_newer_batch_goes_first() {
        let s = session(MockProvider::new("mock").with_delay(Duration::from_secs(60)));
        s.submit(vec![file("old.png", b"o")], IntakeMode::Batch, Subject::General)
            .await
            .unwrap();
        s.submit(vec![file("new.png", b"n")], IntakeMode::Batch, Subject::General)
            .await
            .unwrap();
        assert_eq!(names(&s.snapshot()), vec!["new.png", "old.png"]);
    }

    #[tokio::test]
    async fn test_single_mode_rejects_non_image() {
        let s = session(MockProvider::new("mock"));
        let err = s
            .submit(vec![file("essay.pdf", b"%PDF")], IntakeMode::Single, Subject::General)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapError::NotAnImage { .. }));
        assert!(s.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let provider = MockProvider::new("mock")
            .with_response("Step 1")
            .with_failure_for(encode_base64(b"x"), "network unreachable");
        let s = session(provider);
        let ids = s
            .submit(
                vec![file("x.png", b"x"), file("y.png", b"y")],
                IntakeMode::Batch,
                Subject::General,
            )
            .await
            .unwrap();

        let items = s.wait_until_settled().await.unwrap();
        let x = items.iter().find(|i| i.id == ids[0]).unwrap();
        let y = items.iter().find(|i| i.id == ids[1]).unwrap();
        assert_eq!(
            x.status,
            ProblemStatus::Error {
                message: "network unreachable".into()
            }
        );
        assert_eq!(y.solution_text(), "Step 1");
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let provider = MockProvider::new("mock")
            .with_response("solved")
            .with_delay_for(encode_base64(b"slow"), Duration::from_millis(300));
        let s = session(provider);
        let ids = s
            .submit(
                vec![file("slow.png", b"slow"), file("fast.png", b"fast")],
                IntakeMode::Batch,
                Subject::General,
            )
            .await
            .unwrap();

        let mut watch = s.watch();
        let intermediate = watch
            .wait_for(|items| items.iter().any(|i| i.status.is_terminal()))
            .await
            .unwrap()
            .clone();
        let slow = intermediate.iter().find(|i| i.id == ids[0]).unwrap();
        let fast = intermediate.iter().find(|i| i.id == ids[1]).unwrap();
        assert_eq!(slow.status, ProblemStatus::Analyzing);
        assert_eq!(fast.solution_text(), "solved");

        let settled = s.wait_until_settled().await.unwrap();
        assert!(settled.iter().all(|i| i.solution_text() == "solved"));
        assert_eq!(names(&settled), vec!["slow.png", "fast.png"]);
    }

    #[tokio::test]
    async fn test_delete_keeps_others_in_order() {
        let s = session(MockProvider::new("mock").with_delay(Duration::from_secs(60)));
        let ids = s
            .submit(
                vec![file("a.png", b"a"), file("b.png", b"b"), file("c.png", b"c")],
                IntakeMode::Batch,
                Subject::General,
            )
            .await
            .unwrap();

        assert!(s.delete(ids[1]).await.unwrap());
        assert!(!s.delete(ids[1]).await.unwrap());
        assert_eq!(names(&s.snapshot()), vec!["a.png", "c.png"]);
    }

    #[tokio::test]
    async fn test_deleted_item_result_is_dropped() {
        let provider = MockProvider::new("mock").with_delay(Duration::from_millis(100));
        let s = session(provider);
        let mut events = s.subscribe();
        let ids = s
            .submit(vec![file("a.png", b"a")], IntakeMode::Batch, Subject::General)
            .await
            .unwrap();
        s.delete(ids[0]).await.unwrap();

        loop {
            let event = events.recv().await.unwrap();
            if event.kind == EventKind::ResultOrphaned {
                assert_eq!(event.problem_id, Some(ids[0]));
                break;
            }
        }
        assert!(s.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_clear_with_in_flight_resolvers() {
        let s = session(MockProvider::new("mock").with_delay(Duration::from_millis(50)));
        s.submit(
            vec![file("a.png", b"a"), file("b.png", b"b")],
            IntakeMode::Batch,
            Subject::General,
        )
        .await
        .unwrap();

        assert_eq!(s.clear().await.unwrap(), 2);
        assert!(s.snapshot().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(s.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_all_non_images_creates_nothing() {
        let s = session(MockProvider::new("mock"));
        let ids = s
            .submit(vec![file("notes.txt", b"hi")], IntakeMode::Batch, Subject::General)
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert!(s.snapshot().is_empty());
    }
}
