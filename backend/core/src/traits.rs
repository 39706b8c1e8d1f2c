use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::Message;

/// Trait for long-running StudySnap components (currently the tracker).
///
/// Each component receives messages from its channel and runs in its own Tokio task.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Start the component's event loop, consuming from the given receiver.
    async fn start(&self, rx: mpsc::Receiver<Message>) -> Result<()>;
}

/// The external solve collaborator: a hosted multimodal model.
#[async_trait]
pub trait SolveProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "mock").
    fn name(&self) -> &str;

    /// Send one image and prompt, return the generated explanation.
    async fn solve(&self, request: &SolveRequest) -> Result<SolveResponse>;
}

/// Request to a solve provider.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub model: String,
    /// Base64 image bytes, without a `data:` prefix
    pub image_base64: String,
    pub mime_type: String,
    pub prompt: String,
    pub temperature: f32,
    pub thinking_budget: u32,
}

/// Response from a solve provider.
#[derive(Debug, Clone)]
pub struct SolveResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}
