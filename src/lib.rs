//! Astromech - an astromech droid that answers voice commands with chirps
//!
//! Say the wake phrase, speak a short command, and the droid replies with a
//! beep-and-whistle clip that matches the emotional register of what it
//! heard. It never speaks words.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Orchestrator                       │
//! │  Idle → Listening → Recording → Transcribing →       │
//! │         Classifying → Responding → Idle               │
//! └───┬──────────┬─────────────┬─────────────┬───────────┘
//!     │          │             │             │
//! ┌───▼───┐ ┌────▼─────┐ ┌─────▼──────┐ ┌────▼─────────┐
//! │ Audio │ │  Wake    │ │ Transcriber│ │  Emotion     │
//! │ Device│ │ Detector │ │  (STT)     │ │  Classifier  │
//! └───┬───┘ └──────────┘ └────────────┘ └────┬─────────┘
//!     │                                      │
//! ┌───▼──────────┐                     ┌─────▼────────┐
//! │ Sound Library│                     │ Language     │
//! │ (clips)      │                     │ Model        │
//! └──────────────┘                     └──────────────┘
//! ```

pub mod classifier;
pub mod config;
pub mod emotion;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod sounds;
pub mod voice;

pub use classifier::{ClassificationResult, EmotionClassifier, FallbackReason};
pub use config::Config;
pub use emotion::EmotionCategory;
pub use error::{Error, Result};
pub use llm::{LanguageModel, Prompt};
pub use orchestrator::{CycleOutcome, CycleReport, CycleSettings, CycleState, Orchestrator};
pub use sounds::{SoundClip, SoundLibrary};
pub use voice::{AudioDevice, Transcriber, Utterance, WakeDetector, WakeEvent};
