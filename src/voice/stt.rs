//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::Utterance;
use crate::config::{SttBackend, SttConfig};
use crate::{Error, Result};

/// Turns a recorded utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the utterance; an empty string means nothing was heard
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or rejects the audio
    async fn transcribe(&self, utterance: &Utterance) -> Result<String>;
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    backend: SttBackend,
}

impl SpeechToText {
    /// Create a new STT client against any OpenAI-compatible endpoint
    /// (OpenAI, Groq, a local whisper server)
    #[must_use]
    pub fn new_openai(endpoint: &str, model: &str, api_key: Option<SecretString>) -> Self {
        Self::new(SttBackend::OpenAi, endpoint, model, api_key)
    }

    /// Create a new STT client using Deepgram
    #[must_use]
    pub fn new_deepgram(endpoint: &str, model: &str, api_key: Option<SecretString>) -> Self {
        Self::new(SttBackend::Deepgram, endpoint, model, api_key)
    }

    /// Build the configured backend
    #[must_use]
    pub fn from_config(config: &SttConfig) -> Self {
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()));
        Self::new(config.backend, &config.endpoint, &config.model, api_key)
    }

    fn new(backend: SttBackend, endpoint: &str, model: &str, api_key: Option<SecretString>) -> Self {
        tracing::debug!(backend = ?backend, endpoint, model, "speech-to-text initialized");
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            backend,
        }
    }

    fn transcription_url(&self) -> String {
        match self.backend {
            SttBackend::OpenAi => format!("{}/audio/transcriptions", self.endpoint),
            SttBackend::Deepgram => format!(
                "{}/v1/listen?model={}&punctuate=true",
                self.endpoint, self.model
            ),
        }
    }

    /// Transcribe using an OpenAI-compatible `/audio/transcriptions` endpoint
    async fn transcribe_whisper(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("command.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "json");

        let mut request = self.client.post(self.transcription_url()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Whisper request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let mut request = self
            .client
            .post(self.transcription_url())
            .header("Content-Type", "audio/wav")
            .body(audio);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Token {}", key.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Deepgram request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        Ok(deepgram_transcript(result))
    }
}

fn deepgram_transcript(response: DeepgramResponse) -> String {
    response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, utterance: &Utterance) -> Result<String> {
        let audio = utterance.to_wav()?;

        let text = match self.backend {
            SttBackend::OpenAi => self.transcribe_whisper(audio).await?,
            SttBackend::Deepgram => self.transcribe_deepgram(audio).await?,
        };
        let text = text.trim().to_string();

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_urls() {
        let whisper = SpeechToText::new_openai("https://api.groq.com/openai/v1/", "whisper-large-v3", None);
        assert_eq!(
            whisper.transcription_url(),
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );

        let deepgram = SpeechToText::new_deepgram("https://api.deepgram.com", "nova-2", None);
        assert_eq!(
            deepgram.transcription_url(),
            "https://api.deepgram.com/v1/listen?model=nova-2&punctuate=true"
        );
    }

    #[test]
    fn test_deepgram_first_alternative() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"hello there","confidence":0.98},{"transcript":"hello bear"}]}]}}"#;
        let parsed: DeepgramResponse = serde_json::from_str(json).unwrap();
        assert_eq!(deepgram_transcript(parsed), "hello there");

        let empty: DeepgramResponse = serde_json::from_str(r#"{"results":{"channels":[]}}"#).unwrap();
        assert_eq!(deepgram_transcript(empty), "");
    }
}
