use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use studysnap_core::{SnapError, SolveProvider, SolveRequest, SolveResponse};
use studysnap_media::strip_data_uri;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini multimodal provider (`generateContent`).
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateResponse {
    /// Concatenated answer text of the first candidate, thought summaries excluded.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SolveProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn solve(&self, request: &SolveRequest) -> Result<SolveResponse> {
        let start = Instant::now();

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: request.mime_type.clone(),
                            data: strip_data_uri(&request.image_base64).to_string(),
                        },
                    },
                    RequestPart::Text {
                        text: request.prompt.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                thinking_config: ThinkingConfig {
                    thinking_budget: request.thinking_budget,
                },
            },
        };

        debug!(
            model = %request.model,
            mime = %request.mime_type,
            image_b64_len = request.image_base64.len(),
            "Sending request to Gemini"
        );

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SnapError::Provider {
                provider: "gemini".to_string(),
                message: format!("{}: {}", status, error_body.trim()),
            }
            .into());
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        Ok(SolveResponse {
            text: generated.text(),
            provider: "gemini".to_string(),
            model: request.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
