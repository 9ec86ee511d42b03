//! Keyword-spotting wake detector backed by a rustpotter model

use std::path::Path;

use async_trait::async_trait;
use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

use super::{SAMPLE_RATE, WakeDetector, WakeEvent};
use crate::{Error, Result};

/// Runs a `.rpw` wakeword model over fixed-size frames
pub struct ModelWakeDetector {
    detector: Rustpotter,
    pending: Vec<f32>,
    frame_len: usize,
}

impl ModelWakeDetector {
    /// Load the model at `path` with a detection threshold in (0, 1]
    ///
    /// # Errors
    ///
    /// Returns error if the detector cannot be built or the model fails to load
    pub fn new(path: &Path, threshold: f32) -> Result<Self> {
        let mut config = RustpotterConfig::default();
        config.fmt.sample_rate = SAMPLE_RATE as usize;
        config.fmt.channels = 1;
        config.fmt.sample_format = SampleFormat::F32;
        config.detector.threshold = threshold;

        let mut detector = Rustpotter::new(&config).map_err(|e| Error::WakeWord(e.to_string()))?;

        let key = path
            .file_stem()
            .map_or_else(|| "wakeword".to_string(), |s| s.to_string_lossy().into_owned());
        let file = path
            .to_str()
            .ok_or_else(|| Error::WakeWord(format!("non-UTF-8 model path: {}", path.display())))?;
        detector
            .add_wakeword_from_file(&key, file)
            .map_err(|e| Error::WakeWord(format!("failed to load {}: {e}", path.display())))?;

        let frame_len = detector.get_samples_per_frame();
        tracing::info!(model = %path.display(), threshold, frame_len, "wake model loaded");

        Ok(Self {
            detector,
            pending: Vec::with_capacity(frame_len * 2),
            frame_len,
        })
    }
}

#[async_trait(?Send)]
impl WakeDetector for ModelWakeDetector {
    async fn detect(&mut self, chunk: &[f32]) -> Result<Option<WakeEvent>> {
        self.pending.extend_from_slice(chunk);

        let mut event = None;
        let mut consumed = 0;
        while self.pending.len() - consumed >= self.frame_len {
            let frame = &self.pending[consumed..consumed + self.frame_len];
            consumed += self.frame_len;

            if let Some(detection) = self.detector.process_f32(frame) {
                tracing::info!(name = %detection.name, score = detection.score, "wake word detected");
                event = Some(WakeEvent {
                    phrase: detection.name,
                    confidence: Some(detection.score),
                });
                break;
            }
        }
        self.pending.drain(..consumed);

        Ok(event)
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}
