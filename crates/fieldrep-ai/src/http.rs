//! HTTP extraction client for an Ollama-style model server.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ExtractionError, ExtractionService, ModelConfig, SYSTEM_PROMPT};

/// Request body for `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Extraction over an Ollama-style `/api/generate` endpoint.
pub struct HttpExtractionService {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpExtractionService {
    pub fn new(config: &ModelConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionService {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: SYSTEM_PROMPT,
            stream: false,
        };

        debug!(url = %url, model = %self.model, "requesting model extraction");
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractionError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        Ok(parsed.response)
    }
}
