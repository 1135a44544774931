//! Text-to-speech (TTS) processing

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::credential::Credential;

/// Google Translate speech endpoint (keyless)
pub const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text the Google endpoint accepts per request
const GOOGLE_MAX_CHARS: usize = 100;

/// TTS provider backend
#[derive(Debug, Clone, PartialEq)]
pub enum TtsBackend {
    /// Google Translate speech, selected by language code
    Google {
        /// Language code (e.g. "en")
        language: String,
    },
    /// `OpenAI` speech API
    OpenAi {
        /// Model (e.g. "tts-1")
        model: String,
        /// Voice (e.g. "alloy")
        voice: String,
        /// Speed multiplier (0.25 to 4.0)
        speed: f32,
    },
}

/// Why no audio came out of synthesis
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The speech service failed or returned nothing
    #[error("speech service error: {0}")]
    Service(String),

    /// The temporary audio file could not be written or read
    #[error("audio file error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Remote speech synthesizer producing MP3 bytes
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text`
    ///
    /// # Errors
    ///
    /// Returns [`SynthesisError::Service`] on network or API failure
    async fn synthesize(&self, text: &str, credential: &Credential) -> Result<Vec<u8>, SynthesisError>;
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    backend: TtsBackend,
    openai_base_url: String,
    google_url: String,
}

impl TextToSpeech {
    /// Create a TTS client for `backend`
    ///
    /// `openai_base_url` is only used by [`TtsBackend::OpenAi`].
    #[must_use]
    pub fn new(backend: TtsBackend, openai_base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            backend,
            openai_base_url: openai_base_url.into(),
            google_url: GOOGLE_TTS_URL.to_string(),
        }
    }

    /// Override the Google endpoint
    #[must_use]
    pub fn with_google_url(mut self, url: impl Into<String>) -> Self {
        self.google_url = url.into();
        self
    }

    /// Synthesize using Google Translate speech, one request per chunk
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        let chunks = split_for_tts(text, GOOGLE_MAX_CHARS);
        if chunks.is_empty() {
            return Err(SynthesisError::Service("no text to speak".to_string()));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();

            let response = self
                .client
                .get(&self.google_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .header("User-Agent", "Mozilla/5.0")
                .header("Referer", "https://translate.google.com/")
                .send()
                .await
                .map_err(|e| SynthesisError::Service(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(SynthesisError::Service(format!(
                    "Google TTS error {status}: {body}"
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SynthesisError::Service(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), language, "Google TTS complete");
        Ok(audio)
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(
        &self,
        text: &str,
        credential: &Credential,
        model: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<u8>, SynthesisError> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model,
            input: text,
            voice,
            speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.openai_base_url))
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::Service(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Service(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Service(e.to_string()))?;

        tracing::debug!(bytes = audio.len(), model, voice, "OpenAI TTS complete");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, credential: &Credential) -> Result<Vec<u8>, SynthesisError> {
        match &self.backend {
            TtsBackend::Google { language } => self.synthesize_google(text, language).await,
            TtsBackend::OpenAi {
                model,
                voice,
                speed,
            } => {
                self.synthesize_openai(text, credential, model, voice, *speed)
                    .await
            }
        }
    }
}

/// Split text into chunks of at most `max_chars` characters
///
/// Breaks on whitespace, ends a chunk after sentence punctuation, and
/// hard-splits words longer than the limit.
#[must_use]
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let mut flush = |current: &mut String, current_len: &mut usize| {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
        }
        *current_len = 0;
    };

    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();

        while word_chars.len() > max_chars {
            flush(&mut current, &mut current_len);
            let rest = word_chars.split_off(max_chars);
            current = word_chars.into_iter().collect();
            current_len = max_chars;
            flush(&mut current, &mut current_len);
            word_chars = rest;
        }

        let word_len = word_chars.len();
        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            flush(&mut current, &mut current_len);
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word_chars.iter());
        current_len += word_len;

        if word.ends_with(['.', '!', '?']) {
            flush(&mut current, &mut current_len);
        }
    }
    flush(&mut current, &mut current_len);

    chunks
}

/// Synthesized speech stored in a uniquely named temporary file
///
/// The file is removed when the artifact is consumed or dropped.
#[derive(Debug)]
pub struct AudioArtifact {
    path: tempfile::TempPath,
}

impl AudioArtifact {
    /// Write `audio` to a fresh `.mp3` file in `dir` (system temp dir if `None`)
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write(audio: &[u8], dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reply-").suffix(".mp3");

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(audio)?;
        file.flush()?;

        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Location of the audio file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the audio for playback and delete the file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or removed
    pub fn consume(self) -> std::io::Result<(PathBuf, Vec<u8>)> {
        let audio = std::fs::read(&self.path)?;
        let path = self.path.to_path_buf();
        self.path.close()?;
        Ok((path, audio))
    }
}

/// Speech synthesis stage: remote TTS followed by a temp-file handoff
pub struct SpeechSynthesis {
    synthesizer: Box<dyn Synthesizer>,
    temp_dir: Option<PathBuf>,
}

impl SpeechSynthesis {
    /// Create a synthesis stage writing to the system temp dir
    #[must_use]
    pub fn new(synthesizer: Box<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            temp_dir: None,
        }
    }

    /// Write artifacts into `dir` instead of the system temp dir
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Synthesize `text` into a temporary MP3 file
    ///
    /// # Errors
    ///
    /// Returns a [`SynthesisError`] if the service fails or the file cannot be written
    pub async fn synthesize(
        &self,
        text: &str,
        credential: &Credential,
    ) -> Result<AudioArtifact, SynthesisError> {
        let audio = self.synthesizer.synthesize(text, credential).await?;
        if audio.is_empty() {
            return Err(SynthesisError::Service("empty audio response".to_string()));
        }

        let artifact = AudioArtifact::write(&audio, self.temp_dir.as_deref())?;
        tracing::debug!(path = %artifact.path().display(), bytes = audio.len(), "speech written");
        Ok(artifact)
    }
}
