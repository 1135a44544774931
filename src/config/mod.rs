//! Configuration management for the voice assistant

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::credential::{CredentialConfig, DEFAULT_LAUNCH_CONFIG_PATH, OPENAI_API_KEY_VAR};
use crate::voice::{ListenOptions, TtsBackend};
use crate::{Error, Result};

use file::AssistantConfigFile;

/// Default `OpenAI` API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Voice assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completion configuration
    pub llm: LlmConfig,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Where the API credential is looked up
    pub credentials: CredentialConfig,
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,

    /// API base URL shared by chat, STT and `OpenAI` TTS
    pub base_url: String,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS backend and its settings
    pub tts: TtsBackend,

    /// Microphone listening bounds
    pub listen: ListenOptions,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources(
        fc: AssistantConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let llm = LlmConfig {
            model: env("VOICE_ASSISTANT_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            base_url: env("OPENAI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let provider = env("VOICE_ASSISTANT_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .unwrap_or_else(|| "google".to_string());
        let tts = match provider.to_ascii_lowercase().as_str() {
            "google" => TtsBackend::Google {
                language: env("VOICE_ASSISTANT_TTS_LANGUAGE")
                    .or(fc.voice.tts_language)
                    .unwrap_or_else(|| "en".to_string()),
            },
            "openai" => TtsBackend::OpenAi {
                model: fc.voice.tts_model.unwrap_or_else(|| "tts-1".to_string()),
                voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
                speed: fc.voice.tts_speed.unwrap_or(1.0),
            },
            other => {
                return Err(Error::Config(format!(
                    "unknown TTS provider '{other}' (expected \"google\" or \"openai\")"
                )));
            }
        };

        let defaults = ListenOptions::default();
        let listen = ListenOptions {
            ambient_duration: secs_or(fc.voice.ambient_secs, defaults.ambient_duration)?,
            timeout: secs_or(fc.voice.listen_timeout_secs, defaults.timeout)?,
            phrase_time_limit: secs_or(fc.voice.phrase_limit_secs, defaults.phrase_time_limit)?,
            ..defaults
        };

        let voice = VoiceConfig {
            stt_model: env("VOICE_ASSISTANT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts,
            listen,
        };

        // The IDE launch file is a developer convenience, off in release builds
        let launch_fallback = fc
            .credentials
            .launch_config_fallback
            .unwrap_or(cfg!(debug_assertions));
        let credentials = CredentialConfig {
            env_var: OPENAI_API_KEY_VAR.to_string(),
            launch_config: launch_fallback.then(|| {
                fc.credentials
                    .launch_config_path
                    .map_or_else(|| PathBuf::from(DEFAULT_LAUNCH_CONFIG_PATH), PathBuf::from)
            }),
        };

        Ok(Self {
            llm,
            voice,
            credentials,
        })
    }
}

/// Longest accepted listening bound, in seconds
const MAX_LISTEN_SECS: f32 = 600.0;

/// Convert an optional seconds value, rejecting negatives, NaN, and
/// anything above [`MAX_LISTEN_SECS`]
fn secs_or(value: Option<f32>, default: Duration) -> Result<Duration> {
    value.map_or(Ok(default), |secs| {
        if secs > MAX_LISTEN_SECS {
            return Err(Error::Config(format!(
                "invalid duration {secs}: must be at most {MAX_LISTEN_SECS} seconds"
            )));
        }
        Duration::try_from_secs_f32(secs)
            .map_err(|e| Error::Config(format!("invalid duration {secs}: {e}")))
    })
}
