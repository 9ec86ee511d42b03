//! Cycle states and the per-cycle report

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::classifier::ClassificationResult;
use crate::emotion::EmotionCategory;
use crate::voice::{Utterance, WakeEvent};

/// Where the orchestrator is within one interaction cycle
///
/// Each state carries what the previous stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleState {
    /// Arming the wake detector
    Idle,
    /// Waiting for a trigger
    Listening,
    /// Capturing the command window
    Recording,
    /// Turning the utterance into text
    Transcribing(Utterance),
    /// Mapping the transcript to a category
    Classifying(String),
    /// Playing a clip for the category
    Responding(EmotionCategory),
}

impl CycleState {
    /// Short lowercase name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Recording => "recording",
            Self::Transcribing(_) => "transcribing",
            Self::Classifying(_) => "classifying",
            Self::Responding(_) => "responding",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A clip was played
    Responded,
    /// The input stream failed while waiting for a trigger
    ListenFailed,
    /// Recording the command failed; nothing downstream ran
    CaptureFailed,
    /// A clip was chosen but could not be played
    PlaybackFailed,
}

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    /// Trigger that started the cycle
    #[serde(skip)]
    pub wake: Option<WakeEvent>,
    /// `None` when transcription failed or timed out
    pub transcript: Option<String>,
    /// `None` when the classifier was not invoked
    pub classification: Option<ClassificationResult>,
    pub category: Option<EmotionCategory>,
    /// Id of the clip chosen for the response
    pub clip: Option<String>,
    pub outcome: Option<CycleOutcome>,
}

impl CycleReport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            wake: None,
            transcript: None,
            classification: None,
            category: None,
            clip: None,
            outcome: None,
        }
    }
}

impl Default for CycleReport {
    fn default() -> Self {
        Self::new()
    }
}
