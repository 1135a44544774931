//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::capture::{AudioInput, samples_to_wav};
use super::listen::{ListenOptions, listen};
use crate::credential::Credential;

/// Why no transcript came out of a capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Listening timed out before anyone spoke
    #[error("no speech detected before the listening timeout")]
    NoSpeechDetected,

    /// The recognizer returned no usable transcript
    #[error("speech could not be understood")]
    UnintelligibleAudio,

    /// The recognition request failed
    #[error("could not request results: {0}")]
    RecognitionService(String),

    /// The microphone could not be used
    #[error("microphone error: {0}")]
    Microphone(String),
}

/// Remote speech recognizer
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribe WAV audio
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::RecognitionService`] on network or API failure
    async fn transcribe(&self, wav: &[u8], credential: &Credential) -> Result<String, CaptureError>;
}

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text with `OpenAI` Whisper
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl SpeechToText {
    /// Create a Whisper client against `base_url` (e.g. `https://api.openai.com/v1`)
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Recognizer for SpeechToText {
    async fn transcribe(&self, wav: &[u8], credential: &Credential) -> Result<String, CaptureError> {
        tracing::debug!(audio_bytes = wav.len(), model = %self.model, "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| CaptureError::RecognitionService(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(credential.expose())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                CaptureError::RecognitionService(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(CaptureError::RecognitionService(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            CaptureError::RecognitionService(format!("failed to parse response: {e}"))
        })?;

        tracing::info!(chars = result.text.len(), "transcription complete");
        Ok(result.text)
    }
}

/// Microphone capture followed by remote transcription
pub struct SpeechCapture {
    recognizer: Box<dyn Recognizer>,
    options: ListenOptions,
}

impl SpeechCapture {
    /// Create a capture stage with the given recognizer and bounds
    #[must_use]
    pub fn new(recognizer: Box<dyn Recognizer>, options: ListenOptions) -> Self {
        Self {
            recognizer,
            options,
        }
    }

    /// Listening bounds in use
    #[must_use]
    pub const fn options(&self) -> &ListenOptions {
        &self.options
    }

    /// Listen for one utterance and return its transcript
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] naming why no transcript was produced
    pub async fn capture_utterance(
        &self,
        input: &mut dyn AudioInput,
        credential: &Credential,
    ) -> Result<String, CaptureError> {
        let wav = self.record(input).await?;
        self.recognize(&wav, credential).await
    }

    /// Listen for one utterance and encode it as WAV
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoSpeechDetected`] or [`CaptureError::Microphone`]
    pub async fn record(&self, input: &mut dyn AudioInput) -> Result<Vec<u8>, CaptureError> {
        let samples = listen(input, &self.options).await?;
        samples_to_wav(&samples, input.sample_rate())
            .map_err(|e| CaptureError::Microphone(e.to_string()))
    }

    /// Transcribe recorded WAV audio
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnintelligibleAudio`] for an empty transcript or
    /// [`CaptureError::RecognitionService`] if the request fails
    pub async fn recognize(&self, wav: &[u8], credential: &Credential) -> Result<String, CaptureError> {
        let transcript = self.recognizer.transcribe(wav, credential).await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(CaptureError::UnintelligibleAudio);
        }

        Ok(transcript.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialSource;

    fn credential() -> Credential {
        Credential::new("sk-test-key", CredentialSource::Environment)
    }

    #[test]
    fn test_whisper_response_parse() {
        let result: WhisperResponse = serde_json::from_str(r#"{"text": "Hello there"}"#).unwrap();
        assert_eq!(result.text, "Hello there");
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/audio/transcriptions")
            .match_header("authorization", "Bearer sk-test-key")
            .match_body(mockito::Matcher::Regex("whisper-1".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text": "What is 2+2?"}"#)
            .create_async()
            .await;

        let stt = SpeechToText::new(server.url(), "whisper-1");
        let text = stt.transcribe(b"RIFF", &credential()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "What is 2+2?");
    }

    #[tokio::test]
    async fn test_transcribe_api_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/audio/transcriptions")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let stt = SpeechToText::new(server.url(), "whisper-1");
        let err = stt.transcribe(b"RIFF", &credential()).await.unwrap_err();

        mock.assert_async().await;
        match err {
            CaptureError::RecognitionService(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transcribe_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/audio/transcriptions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json at all")
            .create_async()
            .await;

        let stt = SpeechToText::new(server.url(), "whisper-1");
        let err = stt.transcribe(b"RIFF", &credential()).await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("parse"));
    }
}
