//! Per-problem solve resolver.
//!
//! A resolver owns no collection state. It calls the collaborator once and
//! reports the outcome as a `Message::Resolved` to the tracker, which is the
//! only writer of the problem collection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use studysnap_core::{
    Message, ProblemId, SnapError, SolveOutcome, SolveProvider, SolveRequest, SolveResult,
    Subject,
};
use studysnap_logging::redact_sensitive_data;
use studysnap_media::{encode_base64, AcceptedImage};

use crate::prompt::tutoring_prompt;
use crate::{THINKING_BUDGET, TEMPERATURE};

/// Drives problem items from `analyzing` to a terminal state.
#[derive(Clone)]
pub struct SolveResolver {
    provider: Arc<dyn SolveProvider>,
    model: String,
}

impl SolveResolver {
    pub fn new(provider: Arc<dyn SolveProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the collaborator exactly once for `image`.
    ///
    /// Never fails: every error becomes `SolveOutcome::Failed`.
    pub async fn resolve(&self, image: &AcceptedImage, subject: Subject) -> SolveOutcome {
        let request = SolveRequest {
            model: self.model.clone(),
            image_base64: encode_base64(&image.bytes),
            mime_type: image.mime_type().to_string(),
            prompt: tutoring_prompt(subject),
            temperature: TEMPERATURE,
            thinking_budget: THINKING_BUDGET,
        };

        debug!(
            provider = %self.provider.name(),
            file = %image.file_name(),
            subject = %subject,
            "Calling solve provider"
        );

        match self.provider.solve(&request).await {
            Ok(response) if response.text.trim().is_empty() => {
                warn!(
                    provider = %response.provider,
                    file = %image.file_name(),
                    "Provider returned no text"
                );
                SolveOutcome::Failed(SnapError::EmptySolution.to_string())
            }
            Ok(response) => {
                info!(
                    provider = %response.provider,
                    model = %response.model,
                    latency_ms = response.latency_ms,
                    chars = response.text.len(),
                    "Problem solved"
                );
                SolveOutcome::Solved(response.text)
            }
            Err(e) => {
                let message = redact_sensitive_data(&format!("{:#}", e));
                warn!(
                    provider = %self.provider.name(),
                    file = %image.file_name(),
                    error = %message,
                    "Solve call failed"
                );
                SolveOutcome::Failed(message)
            }
        }
    }

    /// Resolve on a separate task and report to the tracker.
    ///
    /// The caller does not wait; many resolvers may be in flight at once.
    pub fn spawn(
        &self,
        id: ProblemId,
        image: AcceptedImage,
        subject: Subject,
        tracker_tx: mpsc::Sender<Message>,
    ) -> JoinHandle<()> {
        let resolver = self.clone();
        tokio::spawn(async move {
            let outcome = resolver.resolve(&image, subject).await;
            let msg = Message::Resolved(SolveResult { id, outcome });
            if tracker_tx.send(msg).await.is_err() {
                warn!(problem_id = %id, "Tracker gone; dropping solve result");
            }
        })
    }
}
