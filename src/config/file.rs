//! TOML configuration file loading
//!
//! Supports `~/.config/astromech/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AstromechConfigFile {
    /// Wake word configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Audio device configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Response sound configuration
    #[serde(default)]
    pub sounds: SoundsFileConfig,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WakeFileConfig {
    /// Phrases that arm recording (e.g. `["hey r2"]`)
    pub phrases: Option<Vec<String>>,

    /// Path to a wake word model file
    pub model_path: Option<PathBuf>,

    /// Detection threshold for the model (0.0 - 1.0]
    pub threshold: Option<f32>,

    /// Seconds after a trigger during which new triggers are ignored
    pub cooldown_secs: Option<f64>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SttFileConfig {
    /// Backend ("openai" or "deepgram")
    pub backend: Option<String>,

    /// Base URL of the transcription API
    pub url: Option<String>,

    /// Model name or size (e.g. "whisper-large-v3", "base")
    pub model: Option<String>,

    /// Upper bound on a transcription call
    pub timeout_secs: Option<f64>,
}

/// Language model configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmFileConfig {
    /// Backend ("ollama" or "openai")
    pub backend: Option<String>,

    /// Base URL of the model server
    pub url: Option<String>,

    /// Model identifier (e.g. "mistral:7b")
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Upper bound on a classification call
    pub timeout_secs: Option<f64>,
}

/// Audio device configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioFileConfig {
    /// Length of the recording window after a wake trigger
    pub record_secs: Option<f64>,

    /// Input device name (system default when unset)
    pub input_device: Option<String>,

    /// Output device name (system default when unset)
    pub output_device: Option<String>,
}

/// Response sound configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoundsFileConfig {
    /// Root directory holding one subdirectory per emotion category
    pub dir: Option<PathBuf>,

    /// Never play the same clip twice in a row for a category
    pub avoid_repeat: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AstromechConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AstromechConfigFile {
    let Some(path) = config_file_path() else {
        return AstromechConfigFile::default();
    };

    if !path.exists() {
        return AstromechConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            AstromechConfigFile::default()
        }
    }
}

/// Load a config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file_from(path: &Path) -> Result<AstromechConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/astromech/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("astromech").join("config.toml"))
}
