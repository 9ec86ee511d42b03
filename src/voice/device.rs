//! The microphone and speaker as one device lent to each cycle stage

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{AudioCapture, AudioPlayback, Utterance, SAMPLE_RATE};
use crate::config::AudioConfig;
use crate::sounds::SoundClip;
use crate::{Error, Result};

/// How long `listen` waits for the input stream to fill
const LISTEN_INTERVAL: Duration = Duration::from_millis(100);

/// Slack allowed past the requested recording length
const RECORD_GRACE: Duration = Duration::from_secs(1);

/// Audio input and output owned by the orchestrator
#[async_trait(?Send)]
pub trait AudioDevice {
    /// Wait for and return the next chunk of 16kHz mono input
    ///
    /// # Errors
    ///
    /// Returns error if the input stream has failed
    async fn listen(&mut self) -> Result<Vec<f32>>;

    /// Record a fixed-length utterance
    ///
    /// # Errors
    ///
    /// Returns error if the input stream fails or stops delivering samples
    async fn record(&mut self, duration: Duration) -> Result<Utterance>;

    /// Play a clip to completion
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    async fn play(&mut self, clip: &SoundClip) -> Result<()>;

    /// Discard everything captured so far
    fn drain_input(&mut self);
}

/// cpal-backed microphone and speaker
pub struct CpalAudioDevice {
    capture: AudioCapture,
    playback: AudioPlayback,
}

impl CpalAudioDevice {
    /// Open the configured devices and start the input stream
    ///
    /// # Errors
    ///
    /// Returns error if either device cannot be opened
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let mut capture = AudioCapture::new(config.input_device.as_deref())?;
        let playback = AudioPlayback::new(config.output_device.as_deref())?;
        capture.start()?;

        Ok(Self { capture, playback })
    }
}

#[async_trait(?Send)]
impl AudioDevice for CpalAudioDevice {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        tokio::time::sleep(LISTEN_INTERVAL).await;
        self.capture.check()?;
        Ok(self.capture.take_buffer())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn record(&mut self, duration: Duration) -> Result<Utterance> {
        let wanted = (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;
        let deadline = Instant::now() + duration + RECORD_GRACE;

        self.capture.clear_buffer();
        tracing::debug!(duration_ms = duration.as_millis(), "recording");

        while self.capture.buffered_len() < wanted {
            self.capture.check()?;
            if Instant::now() > deadline {
                return Err(Error::Audio(format!(
                    "input stalled: {} of {wanted} samples",
                    self.capture.buffered_len()
                )));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let mut samples = self.capture.take_buffer();
        samples.truncate(wanted);
        let utterance = Utterance::new(samples, SAMPLE_RATE);

        tracing::debug!(rms = utterance.rms(), "recording complete");
        Ok(utterance)
    }

    async fn play(&mut self, clip: &SoundClip) -> Result<()> {
        // Blocks the loop thread; nothing else runs during a response
        self.playback.play(clip.samples(), clip.sample_rate())
    }

    fn drain_input(&mut self) {
        self.capture.clear_buffer();
    }
}
