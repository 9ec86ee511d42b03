//! Configuration management for astromech
//!
//! Layering, lowest priority first: built-in defaults, the TOML file
//! (see [`file`]), `ASTROMECH_*` environment variables, then CLI overrides.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};
use file::AstromechConfigFile;

/// Default wake phrase for phrase verification
pub const DEFAULT_WAKE_PHRASE: &str = "hey r2";

/// Default model detection threshold
pub const DEFAULT_WAKE_THRESHOLD: f32 = 0.7;

/// Default cooldown between accepted wake triggers
pub const DEFAULT_WAKE_COOLDOWN: Duration = Duration::from_secs(5);

/// Default transcription endpoint (OpenAI-compatible)
pub const DEFAULT_STT_URL: &str = "https://api.groq.com/openai/v1";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3";

/// Default bound on a transcription call
pub const DEFAULT_STT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default Ollama server
pub const DEFAULT_LLM_URL: &str = "http://localhost:11434";

/// Default classification model
pub const DEFAULT_LLM_MODEL: &str = "mistral:7b";

/// Default sampling temperature (low, the answer is a single label)
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;

/// Default recording window after a wake trigger
pub const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(3);

/// Default sound asset directory
pub const DEFAULT_SOUNDS_DIR: &str = "sounds";

/// astromech configuration
#[derive(Debug)]
pub struct Config {
    /// Wake word configuration
    pub wake: WakeConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Audio device configuration
    pub audio: AudioConfig,

    /// Response sound configuration
    pub sounds: SoundsConfig,
}

/// Wake word configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Phrases accepted by transcript verification
    pub phrases: Vec<String>,

    /// Wake word model file (requires the `wake-model` feature)
    pub model_path: Option<PathBuf>,

    /// Model detection threshold
    pub threshold: f32,

    /// Triggers within this window of the previous one are ignored
    pub cooldown: Duration,
}

/// Transcription backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    /// `POST /audio/transcriptions` (OpenAI, Groq, local whisper servers)
    OpenAi,
    /// Deepgram `/v1/listen`
    Deepgram,
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    /// Backend
    pub backend: SttBackend,

    /// Base URL
    pub endpoint: String,

    /// Model name or size
    pub model: String,

    /// API key (not needed for local servers)
    pub api_key: Option<SecretString>,

    /// Upper bound on a transcription call
    pub timeout: Duration,
}

/// Language model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    /// Ollama `/api/generate`
    Ollama,
    /// OpenAI-compatible `/chat/completions`
    OpenAi,
}

/// Language model configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// Backend
    pub backend: LlmBackend,

    /// Base URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// API key (not needed for local servers)
    pub api_key: Option<SecretString>,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on a classification call
    pub timeout: Duration,
}

/// Audio device configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Recording window after a wake trigger
    pub record_duration: Duration,

    /// Input device name
    pub input_device: Option<String>,

    /// Output device name
    pub output_device: Option<String>,
}

/// Response sound configuration
#[derive(Debug, Clone)]
pub struct SoundsConfig {
    /// Root directory with one subdirectory per category
    pub dir: PathBuf,

    /// Avoid immediate repeats within a category
    pub avoid_repeat: bool,
}

/// Command-line overrides, applied on top of file and environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Replaces the wake phrases when non-empty
    pub wake_phrases: Vec<String>,
    /// Wake model path
    pub wake_model: Option<PathBuf>,
    /// Recording window in seconds
    pub record_secs: Option<f64>,
    /// Sound asset directory
    pub sounds_dir: Option<PathBuf>,
    /// Language model identifier
    pub llm_model: Option<String>,
    /// Transcription model
    pub stt_model: Option<String>,
    /// Input device name
    pub input_device: Option<String>,
    /// Output device name
    pub output_device: Option<String>,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// An explicit `path` must exist; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns error if the explicit file cannot be loaded or a value is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => file::load_config_file_from(p)?,
            None => file::load_config_file(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn from_sources(
        file: AstromechConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let wake = WakeConfig {
            phrases: env("ASTROMECH_WAKE_PHRASES")
                .map(|s| s.split(',').map(str::to_string).collect())
                .or(file.wake.phrases)
                .unwrap_or_else(|| vec![DEFAULT_WAKE_PHRASE.to_string()])
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            model_path: env("ASTROMECH_WAKE_MODEL")
                .map(PathBuf::from)
                .or(file.wake.model_path),
            threshold: parse_env(&env, "ASTROMECH_WAKE_THRESHOLD")?
                .or(file.wake.threshold)
                .unwrap_or(DEFAULT_WAKE_THRESHOLD),
            cooldown: seconds(
                parse_env(&env, "ASTROMECH_WAKE_COOLDOWN_SECS")?.or(file.wake.cooldown_secs),
                DEFAULT_WAKE_COOLDOWN,
                "wake cooldown",
            )?,
        };

        let stt_backend = match env("ASTROMECH_STT_BACKEND").or(file.stt.backend) {
            Some(s) => parse_stt_backend(&s)?,
            None => SttBackend::OpenAi,
        };
        let stt_endpoint = env("ASTROMECH_STT_URL")
            .or(file.stt.url)
            .unwrap_or_else(|| match stt_backend {
                SttBackend::OpenAi => DEFAULT_STT_URL.to_string(),
                SttBackend::Deepgram => "https://api.deepgram.com".to_string(),
            });
        let stt = SttConfig {
            backend: stt_backend,
            model: env("ASTROMECH_STT_MODEL")
                .or(file.stt.model)
                .unwrap_or_else(|| match stt_backend {
                    SttBackend::OpenAi => DEFAULT_STT_MODEL.to_string(),
                    SttBackend::Deepgram => "nova-2".to_string(),
                }),
            api_key: env("ASTROMECH_STT_API_KEY")
                .or_else(|| provider_key(&env, &stt_endpoint, stt_backend == SttBackend::Deepgram))
                .map(SecretString::from),
            endpoint: stt_endpoint,
            timeout: seconds(
                parse_env(&env, "ASTROMECH_STT_TIMEOUT_SECS")?.or(file.stt.timeout_secs),
                DEFAULT_STT_TIMEOUT,
                "transcription timeout",
            )?,
        };

        let llm_backend = match env("ASTROMECH_LLM_BACKEND").or(file.llm.backend) {
            Some(s) => parse_llm_backend(&s)?,
            None => LlmBackend::Ollama,
        };
        let llm_endpoint = env("ASTROMECH_LLM_URL")
            .or(file.llm.url)
            .unwrap_or_else(|| match llm_backend {
                LlmBackend::Ollama => DEFAULT_LLM_URL.to_string(),
                LlmBackend::OpenAi => DEFAULT_STT_URL.to_string(),
            });
        let llm = LlmConfig {
            backend: llm_backend,
            model: env("ASTROMECH_LLM_MODEL")
                .or(file.llm.model)
                .unwrap_or_else(|| match llm_backend {
                    LlmBackend::Ollama => DEFAULT_LLM_MODEL.to_string(),
                    LlmBackend::OpenAi => "llama-3.1-8b-instant".to_string(),
                }),
            api_key: env("ASTROMECH_LLM_API_KEY")
                .or_else(|| provider_key(&env, &llm_endpoint, false))
                .map(SecretString::from),
            endpoint: llm_endpoint,
            temperature: parse_env(&env, "ASTROMECH_LLM_TEMPERATURE")?
                .or(file.llm.temperature)
                .unwrap_or(DEFAULT_LLM_TEMPERATURE),
            timeout: seconds(
                parse_env(&env, "ASTROMECH_CLASSIFY_TIMEOUT_SECS")?.or(file.llm.timeout_secs),
                crate::classifier::DEFAULT_TIMEOUT,
                "classification timeout",
            )?,
        };

        let audio = AudioConfig {
            record_duration: seconds(
                parse_env(&env, "ASTROMECH_RECORD_SECS")?.or(file.audio.record_secs),
                DEFAULT_RECORD_DURATION,
                "recording duration",
            )?,
            input_device: env("ASTROMECH_INPUT_DEVICE").or(file.audio.input_device),
            output_device: env("ASTROMECH_OUTPUT_DEVICE").or(file.audio.output_device),
        };

        let sounds = SoundsConfig {
            dir: env("ASTROMECH_SOUNDS_DIR")
                .map(PathBuf::from)
                .or(file.sounds.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUNDS_DIR)),
            avoid_repeat: env("ASTROMECH_AVOID_REPEAT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(file.sounds.avoid_repeat)
                .unwrap_or(false),
        };

        Ok(Self {
            wake,
            stt,
            llm,
            audio,
            sounds,
        })
    }

    /// Apply command-line overrides
    ///
    /// # Errors
    ///
    /// Returns error if an override value is out of range
    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if !overrides.wake_phrases.is_empty() {
            self.wake.phrases = overrides
                .wake_phrases
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(path) = overrides.wake_model {
            self.wake.model_path = Some(path);
        }
        if let Some(secs) = overrides.record_secs {
            self.audio.record_duration = seconds(Some(secs), DEFAULT_RECORD_DURATION, "recording duration")?;
        }
        if let Some(dir) = overrides.sounds_dir {
            self.sounds.dir = dir;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(model) = overrides.stt_model {
            self.stt.model = model;
        }
        if overrides.input_device.is_some() {
            self.audio.input_device = overrides.input_device;
        }
        if overrides.output_device.is_some() {
            self.audio.output_device = overrides.output_device;
        }
        Ok(())
    }

    /// Check values the serving loop relies on
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.audio.record_duration.is_zero() {
            return Err(Error::Config("recording duration must be positive".to_string()));
        }
        if self.stt.timeout.is_zero() || self.llm.timeout.is_zero() {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }
        if !(self.wake.threshold > 0.0 && self.wake.threshold <= 1.0) {
            return Err(Error::Config(format!(
                "wake threshold must be in (0, 1], got {}",
                self.wake.threshold
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }

        match &self.wake.model_path {
            Some(path) if !path.is_file() => {
                return Err(Error::Config(format!(
                    "wake model not found: {}",
                    path.display()
                )));
            }
            None if self.wake.phrases.is_empty() => {
                return Err(Error::Config(
                    "at least one wake phrase or a wake model is required".to_string(),
                ));
            }
            _ => {}
        }

        if self.stt.api_key.is_none() && !is_local_endpoint(&self.stt.endpoint) {
            return Err(Error::Config(format!(
                "API key required for transcription endpoint {} (set GROQ_API_KEY, OPENAI_API_KEY, DEEPGRAM_API_KEY or ASTROMECH_STT_API_KEY)",
                self.stt.endpoint
            )));
        }
        if self.llm.backend == LlmBackend::OpenAi
            && self.llm.api_key.is_none()
            && !is_local_endpoint(&self.llm.endpoint)
        {
            return Err(Error::Config(format!(
                "API key required for language model endpoint {} (set ASTROMECH_LLM_API_KEY)",
                self.llm.endpoint
            )));
        }

        Ok(())
    }
}

/// Whether an endpoint points at this machine
#[must_use]
pub fn is_local_endpoint(endpoint: &str) -> bool {
    let rest = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest);
    if rest.starts_with("[::1]") {
        return true;
    }
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
}

/// Pick the provider API key matching an endpoint
fn provider_key(
    env: &impl Fn(&str) -> Option<String>,
    endpoint: &str,
    deepgram: bool,
) -> Option<String> {
    if deepgram {
        env("DEEPGRAM_API_KEY")
    } else if endpoint.contains("groq.com") {
        env("GROQ_API_KEY")
    } else if endpoint.contains("openai.com") {
        env("OPENAI_API_KEY")
    } else {
        None
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {key}: '{v}'")))
        })
        .transpose()
}

fn seconds(value: Option<f64>, default: Duration, what: &str) -> Result<Duration> {
    value.map_or(Ok(default), |secs| {
        Duration::try_from_secs_f64(secs)
            .map_err(|_| Error::Config(format!("invalid {what}: {secs} seconds")))
    })
}

fn parse_stt_backend(s: &str) -> Result<SttBackend> {
    match s.trim().to_lowercase().as_str() {
        "openai" | "groq" | "whisper" => Ok(SttBackend::OpenAi),
        "deepgram" => Ok(SttBackend::Deepgram),
        other => Err(Error::Config(format!(
            "unknown STT backend '{other}' (expected openai or deepgram)"
        ))),
    }
}

fn parse_llm_backend(s: &str) -> Result<LlmBackend> {
    match s.trim().to_lowercase().as_str() {
        "ollama" => Ok(LlmBackend::Ollama),
        "openai" | "groq" => Ok(LlmBackend::OpenAi),
        other => Err(Error::Config(format!(
            "unknown LLM backend '{other}' (expected ollama or openai)"
        ))),
    }
}
