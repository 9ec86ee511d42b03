//! The interaction cycle state machine
//!
//! One cycle is `Idle → Listening → Recording → Transcribing → Classifying →
//! Responding → Idle`. [`Orchestrator::step`] is the only transition
//! function and never fails: every stage error is absorbed into the next
//! state and recorded on the [`CycleReport`].

mod state;

pub use state::{CycleOutcome, CycleReport, CycleState};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

use crate::Error;
use crate::classifier::EmotionClassifier;
use crate::config::{self, Config};
use crate::emotion::EmotionCategory;
use crate::sounds::SoundLibrary;
use crate::voice::{AudioDevice, Transcriber, WakeDetector};

/// Pause after a failed listen before re-arming
const LISTEN_BACKOFF: Duration = Duration::from_millis(500);

/// Timing knobs for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSettings {
    /// Length of the command window
    pub record_duration: Duration,
    /// Bound on one transcription call
    pub transcribe_timeout: Duration,
    /// Minimum gap between accepted triggers (zero disables)
    pub wake_cooldown: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            record_duration: config::DEFAULT_RECORD_DURATION,
            transcribe_timeout: config::DEFAULT_STT_TIMEOUT,
            wake_cooldown: config::DEFAULT_WAKE_COOLDOWN,
        }
    }
}

impl From<&Config> for CycleSettings {
    fn from(config: &Config) -> Self {
        Self {
            record_duration: config.audio.record_duration,
            transcribe_timeout: config.stt.timeout,
            wake_cooldown: config.wake.cooldown,
        }
    }
}

/// Drives wake → record → transcribe → classify → respond cycles
pub struct Orchestrator {
    device: Box<dyn AudioDevice>,
    wake: Box<dyn WakeDetector>,
    transcriber: Arc<dyn Transcriber>,
    classifier: EmotionClassifier,
    sounds: SoundLibrary,
    settings: CycleSettings,
    last_trigger: Option<Instant>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        device: Box<dyn AudioDevice>,
        wake: Box<dyn WakeDetector>,
        transcriber: Arc<dyn Transcriber>,
        classifier: EmotionClassifier,
        sounds: SoundLibrary,
        settings: CycleSettings,
    ) -> Self {
        Self {
            device,
            wake,
            transcriber,
            classifier,
            sounds,
            settings,
            last_trigger: None,
        }
    }

    /// Advance one state
    #[allow(clippy::future_not_send)]
    pub async fn step(&mut self, state: CycleState, report: &mut CycleReport) -> CycleState {
        match state {
            CycleState::Idle => {
                // Anything heard while responding is stale
                self.device.drain_input();
                self.wake.reset();
                CycleState::Listening
            }
            CycleState::Listening => self.listen(report).await,
            CycleState::Recording => match self.device.record(self.settings.record_duration).await {
                Ok(utterance) => {
                    tracing::debug!(duration = ?utterance.duration(), rms = utterance.rms(), "command recorded");
                    CycleState::Transcribing(utterance)
                }
                Err(e) => {
                    tracing::error!(error = %e, "recording failed");
                    report.outcome = Some(CycleOutcome::CaptureFailed);
                    CycleState::Idle
                }
            },
            CycleState::Transcribing(utterance) => {
                let timeout = self.settings.transcribe_timeout;
                match tokio::time::timeout(timeout, self.transcriber.transcribe(&utterance)).await {
                    Ok(Ok(transcript)) => {
                        tracing::info!(transcript = %transcript, "heard");
                        report.transcript = Some(transcript.clone());
                        CycleState::Classifying(transcript)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "transcription failed, defaulting to acknowledge");
                        CycleState::Responding(EmotionCategory::FALLBACK)
                    }
                    Err(_) => {
                        let e = Error::Timeout {
                            stage: "transcription",
                            elapsed: timeout,
                        };
                        tracing::warn!(error = %e, "defaulting to acknowledge");
                        CycleState::Responding(EmotionCategory::FALLBACK)
                    }
                }
            }
            CycleState::Classifying(transcript) => {
                let result = self.classifier.classify(&transcript).await;
                let category = result.category;
                if let Some(reason) = result.fallback {
                    tracing::debug!(reason = %reason, "classifier fell back");
                }
                report.classification = Some(result);
                CycleState::Responding(category)
            }
            CycleState::Responding(category) => {
                report.category = Some(category);
                let clip = self.sounds.pick(category);
                report.clip = Some(clip.id().to_string());

                tracing::info!(
                    category = %category,
                    clip = %clip,
                    transcript = report.transcript.as_deref().unwrap_or(""),
                    "responding"
                );

                match self.device.play(clip).await {
                    Ok(()) => report.outcome = Some(CycleOutcome::Responded),
                    Err(e) => {
                        tracing::error!(error = %e, clip = %clip, "playback failed");
                        report.outcome = Some(CycleOutcome::PlaybackFailed);
                    }
                }
                CycleState::Idle
            }
        }
    }

    /// Wait for an accepted trigger
    #[allow(clippy::future_not_send)]
    async fn listen(&mut self, report: &mut CycleReport) -> CycleState {
        loop {
            let chunk = match self.device.listen().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!(error = %e, "listening failed");
                    report.outcome = Some(CycleOutcome::ListenFailed);
                    tokio::time::sleep(LISTEN_BACKOFF).await;
                    return CycleState::Idle;
                }
            };

            // Triggers inside the cooldown are never verified
            let cooldown = self.settings.wake_cooldown;
            if self.last_trigger.is_some_and(|t| t.elapsed() < cooldown) {
                self.wake.reset();
                continue;
            }

            let event = match self.wake.detect(&chunk).await {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "wake detection failed");
                    report.outcome = Some(CycleOutcome::ListenFailed);
                    tokio::time::sleep(LISTEN_BACKOFF).await;
                    return CycleState::Idle;
                }
            };

            self.last_trigger = Some(Instant::now());
            tracing::info!(phrase = %event.phrase, confidence = ?event.confidence, "wake word accepted");
            report.wake = Some(event);
            return CycleState::Recording;
        }
    }

    /// Run one full cycle from `Idle` back to `Idle`
    #[allow(clippy::future_not_send)]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::new();
        let span = tracing::info_span!("cycle", id = %report.id);

        async {
            let mut state = self.step(CycleState::Idle, &mut report).await;
            while state != CycleState::Idle {
                state = self.step(state, &mut report).await;
            }
        }
        .instrument(span)
        .await;

        log_report(&report);
        report
    }

    /// Run cycles until `shutdown` fires
    ///
    /// Shutdown interrupts any stage except playback, which is allowed to
    /// finish.
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) {
        tracing::info!("listening for wake word");

        let mut report = CycleReport::new();
        let mut state = CycleState::Idle;

        loop {
            let span = tracing::info_span!("cycle", id = %report.id, state = %state);
            let responding = matches!(state, CycleState::Responding(_));

            let next = if responding {
                self.step(state, &mut report).instrument(span).await
            } else {
                tokio::select! {
                    // A closed channel disables this arm instead of stopping
                    Some(()) = shutdown.recv() => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    next = self.step(state, &mut report).instrument(span) => next,
                }
            };

            // Every path back to idle records an outcome
            if report.outcome.is_some() {
                log_report(&report);
                report = CycleReport::new();
            }
            state = next;
        }
    }
}

fn log_report(report: &CycleReport) {
    tracing::debug!(
        id = %report.id,
        outcome = ?report.outcome,
        category = ?report.category,
        clip = report.clip.as_deref().unwrap_or("-"),
        "cycle finished"
    );
}
