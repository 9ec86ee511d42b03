//! Wake word detection
//!
//! Detects the wake phrase in the microphone stream to start a cycle.
//! The default detector is a hybrid: local energy detection finds a speech
//! segment, then the transcriber verifies it contains a wake phrase.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Transcriber, Utterance, SAMPLE_RATE, calculate_rms};
use crate::{Error, Result};

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to trigger (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Longest segment sent for verification (in samples)
const MAX_SEGMENT_SAMPLES: usize = SAMPLE_RATE as usize * 4;

/// A recognised wake trigger
#[derive(Debug, Clone, PartialEq)]
pub struct WakeEvent {
    /// The wake phrase (or model name) that fired
    pub phrase: String,
    /// Detector score, when the backend produces one
    pub confidence: Option<f32>,
}

/// Scores the live microphone stream for the wake phrase
#[async_trait(?Send)]
pub trait WakeDetector {
    /// Feed one chunk of 16kHz mono samples
    ///
    /// Returns `Some` once the wake phrase has been recognised.
    ///
    /// # Errors
    ///
    /// Returns error if the detector itself fails
    async fn detect(&mut self, chunk: &[f32]) -> Result<Option<WakeEvent>>;

    /// Forget any partially accumulated audio
    fn reset(&mut self);
}

/// State of the phrase detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
}

/// Energy-gated wake detector verified by transcription
pub struct PhraseWakeDetector {
    phrases: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    verify_timeout: Duration,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    speech_samples: usize,
    silence_counter: usize,
}

impl PhraseWakeDetector {
    /// Create a detector for the given phrases (e.g. "hey r2")
    ///
    /// Each verification transcription is bounded by `verify_timeout`.
    #[must_use]
    pub fn new(
        phrases: Vec<String>,
        transcriber: Arc<dyn Transcriber>,
        verify_timeout: Duration,
    ) -> Self {
        let phrases: Vec<String> = phrases
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(phrases = ?phrases, ?verify_timeout, "wake phrase detector initialized");

        Self {
            phrases,
            transcriber,
            verify_timeout,
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            speech_samples: 0,
            silence_counter: 0,
        }
    }

    /// Feed samples through the energy segmenter
    ///
    /// Returns true once a speech segment followed by silence is buffered.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
            }
            DetectorState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                // Enough speech followed by silence, or the speaker never paused
                if (self.silence_counter > SILENCE_SAMPLES
                    && self.speech_samples > MIN_SPEECH_SAMPLES)
                    || self.speech_buffer.len() >= MAX_SEGMENT_SAMPLES
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "speech segment complete");
                    return true;
                }

                // Too much silence without enough speech
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("timeout - resetting");
                    self.reset();
                }
            }
        }

        false
    }

    /// Find the first configured phrase contained in a transcript
    #[must_use]
    pub fn match_phrase(&self, transcript: &str) -> Option<&str> {
        let normalized = normalize(transcript);
        let padded = format!(" {normalized} ");

        self.phrases
            .iter()
            .find(|phrase| padded.contains(&format!(" {phrase} ")))
            .map(String::as_str)
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Get the configured wake phrases
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

#[async_trait(?Send)]
impl WakeDetector for PhraseWakeDetector {
    async fn detect(&mut self, chunk: &[f32]) -> Result<Option<WakeEvent>> {
        if !self.process(chunk) {
            return Ok(None);
        }

        let segment = Utterance::new(std::mem::take(&mut self.speech_buffer), SAMPLE_RATE);
        self.reset();

        // A verification failure is a missed trigger, not a detector fault
        let verification =
            tokio::time::timeout(self.verify_timeout, self.transcriber.transcribe(&segment)).await;
        let transcript = match verification {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "wake verification failed");
                return Ok(None);
            }
            Err(_) => {
                let e = Error::Timeout {
                    stage: "wake verification",
                    elapsed: self.verify_timeout,
                };
                tracing::warn!(error = %e, "treating segment as a miss");
                return Ok(None);
            }
        };

        match self.match_phrase(&transcript) {
            Some(phrase) => {
                tracing::info!(phrase, transcript = %transcript, "wake word detected");
                Ok(Some(WakeEvent {
                    phrase: phrase.to_string(),
                    confidence: None,
                }))
            }
            None => {
                tracing::debug!(transcript = %transcript, "segment did not contain wake phrase");
                Ok(None)
            }
        }
    }

    fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.speech_samples = 0;
        self.silence_counter = 0;
    }
}

/// Lowercase, strip punctuation and collapse whitespace
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
