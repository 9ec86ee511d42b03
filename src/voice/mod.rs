//! Voice processing module
//!
//! Handles audio capture, wake word detection, transcription, and playback.

mod capture;
mod device;
mod playback;
mod stt;
#[cfg(feature = "wake-model")]
mod wake_model;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, Utterance, calculate_rms, samples_to_wav};
pub use device::{AudioDevice, CpalAudioDevice};
pub use playback::{AudioPlayback, resample};
pub use stt::{SpeechToText, Transcriber};
#[cfg(feature = "wake-model")]
pub use wake_model::ModelWakeDetector;
pub use wake_word::{DetectorState, PhraseWakeDetector, WakeDetector, WakeEvent};
