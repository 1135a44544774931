//! TOML configuration file loading
//!
//! Supports `~/.config/voice-assistant/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AssistantConfigFile {
    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Credential resolution configuration
    #[serde(default)]
    pub credentials: CredentialsFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo")
    pub model: Option<String>,

    /// API base URL (e.g. `https://api.openai.com/v1`)
    pub base_url: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS backend ("google" or "openai")
    pub tts_provider: Option<String>,

    /// Language code for synthesized speech (e.g. "en")
    pub tts_language: Option<String>,

    /// TTS model for the `OpenAI` backend (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice for the `OpenAI` backend (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier for the `OpenAI` backend
    pub tts_speed: Option<f32>,

    /// Ambient-noise calibration window in seconds
    pub ambient_secs: Option<f32>,

    /// Seconds to wait for speech to start
    pub listen_timeout_secs: Option<f32>,

    /// Maximum phrase length in seconds
    pub phrase_limit_secs: Option<f32>,
}

/// Credential lookup configuration
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsFileConfig {
    /// Allow reading the key from an IDE launch configuration
    pub launch_config_fallback: Option<bool>,

    /// Override for the launch configuration path
    pub launch_config_path: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AssistantConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AssistantConfigFile {
    config_file_path().map_or_else(AssistantConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_config_from(path: &Path) -> AssistantConfigFile {
    if !path.exists() {
        return AssistantConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AssistantConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AssistantConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-assistant/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-assistant").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let content = r#"
            [llm]
            model = "gpt-4o-mini"

            [voice]
            tts_provider = "openai"
            phrase_limit_secs = 12.5
        "#;

        let config: AssistantConfigFile = toml::from_str(content).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert!(config.llm.base_url.is_none());
        assert_eq!(config.voice.tts_provider.as_deref(), Some("openai"));
        assert_eq!(config.voice.phrase_limit_secs, Some(12.5));
        assert!(config.credentials.launch_config_fallback.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml"));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();

        let config = load_config_from(&path);
        assert!(config.llm.model.is_none());
    }
}
