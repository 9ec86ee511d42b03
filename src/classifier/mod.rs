//! Emotion classification of transcripts
//!
//! Turns free text into exactly one [`EmotionCategory`]. The language model
//! is asked for a single lowercase label, but its reply is never trusted:
//! [`parse_reply`] scans for the first whole-word label and everything that
//! goes wrong (timeout, transport error, chatter without a label, empty
//! input) lands on [`EmotionCategory::FALLBACK`].

mod prompt;

pub use prompt::INSTRUCTIONS;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::EmotionCategory;
use crate::llm::{LanguageModel, Prompt};

/// Default bound on a single model call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Why a classification ended on the fallback category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Transcript was empty or whitespace; the model was not called
    EmptyTranscript,
    /// Model did not answer within the bound
    Timeout,
    /// Model call failed
    ModelError,
    /// Reply contained no category label
    Unrecognized,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyTranscript => "empty transcript",
            Self::Timeout => "timeout",
            Self::ModelError => "model error",
            Self::Unrecognized => "unrecognized reply",
        })
    }
}

/// Outcome of classifying one transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Transcript that was classified
    pub transcript: String,
    /// Resolved category
    pub category: EmotionCategory,
    /// Raw model reply, kept for diagnostics only
    pub raw_reply: Option<String>,
    /// Set when `category` is the fallback rather than a parsed label
    pub fallback: Option<FallbackReason>,
}

impl ClassificationResult {
    fn fallback(transcript: String, raw_reply: Option<String>, reason: FallbackReason) -> Self {
        Self {
            transcript,
            category: EmotionCategory::FALLBACK,
            raw_reply,
            fallback: Some(reason),
        }
    }
}

/// Classifies transcripts with a language model
pub struct EmotionClassifier {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl EmotionClassifier {
    /// Create a classifier around a model handle
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Build the constrained prompt for a transcript
    #[must_use]
    pub fn prompt(transcript: &str) -> Prompt {
        Prompt {
            instructions: INSTRUCTIONS.to_string(),
            input: transcript.trim().to_string(),
        }
    }

    /// Classify a transcript; never fails
    pub async fn classify(&self, transcript: &str) -> ClassificationResult {
        if transcript.trim().is_empty() {
            tracing::debug!("empty transcript, skipping model");
            return ClassificationResult::fallback(
                transcript.to_string(),
                None,
                FallbackReason::EmptyTranscript,
            );
        }

        let prompt = Self::prompt(transcript);
        let reply = match tokio::time::timeout(self.timeout, self.model.complete(&prompt)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, model = self.model.name(), "classification failed, defaulting to acknowledge");
                return ClassificationResult::fallback(
                    transcript.to_string(),
                    None,
                    FallbackReason::ModelError,
                );
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, model = self.model.name(), "classification timed out, defaulting to acknowledge");
                return ClassificationResult::fallback(
                    transcript.to_string(),
                    None,
                    FallbackReason::Timeout,
                );
            }
        };

        tracing::debug!(reply = %reply.trim(), "model reply");

        match parse_reply(&reply) {
            Some(category) => ClassificationResult {
                transcript: transcript.to_string(),
                category,
                raw_reply: Some(reply),
                fallback: None,
            },
            None => {
                tracing::info!(reply = %reply.trim(), "no category in reply, defaulting to acknowledge");
                ClassificationResult::fallback(
                    transcript.to_string(),
                    Some(reply),
                    FallbackReason::Unrecognized,
                )
            }
        }
    }
}

/// Find the first whole-word category label in a model reply
///
/// Scans left to right, so "happy or maybe curious" resolves to happy.
/// Words that merely contain a label ("unhappy") do not match.
#[must_use]
pub fn parse_reply(reply: &str) -> Option<EmotionCategory> {
    reply
        .trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .find_map(EmotionCategory::from_token)
}
