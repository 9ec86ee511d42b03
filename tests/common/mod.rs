//! Shared test utilities
//!
//! In-memory stand-ins for the audio device, wake detector, transcriber and
//! language model so cycles run without hardware or network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use astromech::classifier::EmotionClassifier;
use astromech::llm::{LanguageModel, Prompt};
use astromech::voice::{AudioDevice, SAMPLE_RATE, Transcriber, Utterance, WakeDetector, WakeEvent};
use astromech::{
    CycleSettings, EmotionCategory, Error, Orchestrator, Result, SoundClip, SoundLibrary,
};

/// Marker sample that makes [`FakeWake`] fire
pub const TRIGGER: f32 = 1.0;

/// Same cadence as the real device
pub const LISTEN_INTERVAL: Duration = Duration::from_millis(100);

/// A chunk the fake wake detector recognises
#[must_use]
pub fn trigger_chunk() -> Vec<f32> {
    vec![TRIGGER; 160]
}

/// A quiet chunk
#[must_use]
pub fn silence_chunk() -> Vec<f32> {
    vec![0.0; 1600]
}

/// Observable state behind a [`FakeDevice`]
#[derive(Default)]
pub struct DeviceState {
    /// Chunks returned by `listen`, in order; silence once exhausted
    pub script: VecDeque<Vec<f32>>,
    /// Audio captured while busy; cleared by `drain_input`
    pub buffered: VecDeque<Vec<f32>>,
    /// Push a trigger into `buffered` whenever a clip plays
    pub echo_trigger_on_play: bool,
    pub fail_listen: bool,
    pub fail_record: bool,
    pub fail_play: bool,
    /// How long each clip takes to play
    pub play_delay: Duration,
    pub records: usize,
    pub drains: usize,
    /// Ids of clips played
    pub played: Vec<String>,
    /// Clips whose playback ran to the end
    pub finished_plays: usize,
}

/// Scripted microphone and speaker
#[derive(Clone, Default)]
pub struct FakeDevice {
    pub state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    /// Device whose `listen` yields the given chunks
    #[must_use]
    pub fn with_script(chunks: impl IntoIterator<Item = Vec<f32>>) -> Self {
        let device = Self::default();
        device.state.lock().unwrap().script.extend(chunks);
        device
    }

    pub fn update(&self, f: impl FnOnce(&mut DeviceState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn push_script(&self, chunks: impl IntoIterator<Item = Vec<f32>>) {
        self.state.lock().unwrap().script.extend(chunks);
    }

    #[must_use]
    pub fn played(&self) -> Vec<String> {
        self.state.lock().unwrap().played.clone()
    }

    #[must_use]
    pub fn finished_plays(&self) -> usize {
        self.state.lock().unwrap().finished_plays
    }

    #[must_use]
    pub fn records(&self) -> usize {
        self.state.lock().unwrap().records
    }

    #[must_use]
    pub fn script_len(&self) -> usize {
        self.state.lock().unwrap().script.len()
    }
}

#[async_trait(?Send)]
impl AudioDevice for FakeDevice {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        tokio::time::sleep(LISTEN_INTERVAL).await;

        let mut state = self.state.lock().unwrap();
        if state.fail_listen {
            return Err(Error::Audio("input stream failed".to_string()));
        }
        Ok(state
            .buffered
            .pop_front()
            .or_else(|| state.script.pop_front())
            .unwrap_or_else(silence_chunk))
    }

    async fn record(&mut self, duration: Duration) -> Result<Utterance> {
        let mut state = self.state.lock().unwrap();
        if state.fail_record {
            return Err(Error::Audio("input stalled".to_string()));
        }
        state.records += 1;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;
        Ok(Utterance::new(vec![0.1; len], SAMPLE_RATE))
    }

    async fn play(&mut self, clip: &SoundClip) -> Result<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.played.push(clip.id().to_string());
            if state.echo_trigger_on_play {
                state.buffered.push_back(trigger_chunk());
            }
            if state.fail_play {
                return Err(Error::Audio("output stream failed".to_string()));
            }
            state.play_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().unwrap().finished_plays += 1;
        Ok(())
    }

    fn drain_input(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.buffered.clear();
        state.drains += 1;
    }
}

/// Fires on any chunk that starts with [`TRIGGER`]
#[derive(Clone, Default)]
pub struct FakeWake {
    pub resets: Arc<AtomicUsize>,
    /// Trigger chunks that reached `detect`
    pub triggers_seen: Arc<AtomicUsize>,
}

impl FakeWake {
    #[must_use]
    pub fn triggers_seen(&self) -> usize {
        self.triggers_seen.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl WakeDetector for FakeWake {
    async fn detect(&mut self, chunk: &[f32]) -> Result<Option<WakeEvent>> {
        let fired = chunk.first().is_some_and(|&s| (s - TRIGGER).abs() < f32::EPSILON);
        if fired {
            self.triggers_seen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(fired.then(|| WakeEvent {
            phrase: "hey r2".to_string(),
            confidence: Some(1.0),
        }))
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Canned reply with an optional delay, counting calls
pub struct Canned {
    reply: std::result::Result<String, String>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl Canned {
    #[must_use]
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn err(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> std::result::Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }
}

#[async_trait]
impl Transcriber for Canned {
    async fn transcribe(&self, _utterance: &Utterance) -> Result<String> {
        self.answer().await.map_err(Error::Stt)
    }
}

#[async_trait]
impl LanguageModel for Canned {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        self.answer().await.map_err(Error::Llm)
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// One clip per category, id `<category>/test.wav`
#[must_use]
pub fn test_library() -> SoundLibrary {
    SoundLibrary::from_clips(EmotionCategory::ALL.iter().map(|c| {
        SoundClip::new(format!("{c}/test.wav"), *c, vec![0.2; 1600], SAMPLE_RATE)
    }))
    .expect("every category has a clip")
}

/// Settings with cooldown disabled so back-to-back cycles are accepted
#[must_use]
pub fn test_settings() -> CycleSettings {
    CycleSettings {
        wake_cooldown: Duration::ZERO,
        ..CycleSettings::default()
    }
}

/// Wire fakes into an orchestrator
#[must_use]
pub fn orchestrator(
    device: &FakeDevice,
    transcriber: Arc<Canned>,
    model: Arc<Canned>,
    settings: CycleSettings,
) -> Orchestrator {
    orchestrator_with_wake(device, &FakeWake::default(), transcriber, model, settings)
}

/// Same as [`orchestrator`] with a wake detector the test keeps a handle on
#[must_use]
pub fn orchestrator_with_wake(
    device: &FakeDevice,
    wake: &FakeWake,
    transcriber: Arc<Canned>,
    model: Arc<Canned>,
    settings: CycleSettings,
) -> Orchestrator {
    Orchestrator::new(
        Box::new(device.clone()),
        Box::new(wake.clone()),
        transcriber,
        EmotionClassifier::new(model, Duration::from_secs(8)),
        test_library(),
        settings,
    )
}
