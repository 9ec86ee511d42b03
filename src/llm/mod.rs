//! Language model boundary
//!
//! The classifier treats the model as an untrusted oracle: it accepts a
//! prompt and returns free text. Backends only move bytes; they never
//! interpret the reply.

mod chat;
mod ollama;

pub use chat::ChatCompletionsClient;
pub use ollama::OllamaClient;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::config::{LlmBackend, LlmConfig};

/// A prompt split into fixed instructions and the per-cycle input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Instructions, rules and few-shot examples
    pub instructions: String,
    /// The transcript being classified
    pub input: String,
}

impl Prompt {
    /// Single-string form for completion-style backends
    #[must_use]
    pub fn completion_text(&self) -> String {
        format!(
            "{}\n\nCommand: \"{}\"\nCategory:",
            self.instructions, self.input
        )
    }
}

/// Text-in, text-out language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete the prompt and return the raw reply
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached or rejects the request
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Model identifier for logging
    fn name(&self) -> &str;
}

/// Build the configured language model backend
#[must_use]
pub fn from_config(config: &LlmConfig) -> Arc<dyn LanguageModel> {
    let model: Arc<dyn LanguageModel> = match config.backend {
        LlmBackend::Ollama => Arc::new(OllamaClient::new(
            &config.endpoint,
            &config.model,
            config.temperature,
        )),
        LlmBackend::OpenAi => Arc::new(ChatCompletionsClient::new(
            &config.endpoint,
            &config.model,
            config
                .api_key
                .as_ref()
                .map(|k| SecretString::from(k.expose_secret().to_string())),
            config.temperature,
        )),
    };

    tracing::debug!(model = model.name(), backend = ?config.backend, "language model initialized");
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_text_embeds_input() {
        let prompt = Prompt {
            instructions: "Classify.".to_string(),
            input: "Hello there!".to_string(),
        };
        assert_eq!(
            prompt.completion_text(),
            "Classify.\n\nCommand: \"Hello there!\"\nCategory:"
        );
    }
}
