//! Local models served by Ollama

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LanguageModel, Prompt};
use crate::{Error, Result};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response from `POST /api/generate` with streaming disabled
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Create a client for an Ollama server (e.g. `http://localhost:11434`)
    #[must_use]
    pub fn new(endpoint: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/generate", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            temperature,
        }
    }

    fn request_body(&self, prompt: &Prompt) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: prompt.completion_text(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        tracing::debug!(model = %self.model, "requesting Ollama completion");

        let response = self
            .client
            .post(&self.url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Ollama request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Ollama API error");
            return Err(Error::Llm(format!("Ollama API error {status}: {body}")));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
