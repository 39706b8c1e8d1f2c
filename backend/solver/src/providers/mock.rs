use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use studysnap_core::{SolveProvider, SolveRequest, SolveResponse};

/// A mock solve provider that returns canned responses or failures.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    /// Per-image delays, for ordering resolutions in tests
    delays_by_image: Vec<(String, Duration)>,
    failures_by_image: Vec<(String, String)>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            failure: None,
            delay: None,
            delays_by_image: Vec::new(),
            failures_by_image: Vec::new(),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Every call fails with this message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay calls whose base64 payload equals `image_base64`.
    pub fn with_delay_for(mut self, image_base64: impl Into<String>, delay: Duration) -> Self {
        self.delays_by_image.push((image_base64.into(), delay));
        self
    }

    /// Fail calls whose base64 payload equals `image_base64`.
    pub fn with_failure_for(mut self, image_base64: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures_by_image.push((image_base64.into(), message.into()));
        self
    }
}

#[async_trait]
impl SolveProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn solve(&self, req: &SolveRequest) -> Result<SolveResponse> {
        let delay = self
            .delays_by_image
            .iter()
            .find(|(data, _)| data == &req.image_base64)
            .map(|(_, d)| *d)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures_by_image
            .iter()
            .find(|(data, _)| data == &req.image_base64)
            .map(|(_, message)| message)
            .or(self.failure.as_ref());
        if let Some(message) = failure {
            anyhow::bail!("{}", message);
        }

        Ok(SolveResponse {
            text: self
                .fixed_response
                .clone()
                .unwrap_or_else(|| "Mock solution".to_string()),
            provider: self.name.clone(),
            model: req.model.clone(),
            latency_ms: 0,
        })
    }
}
