//! Voice processing module
//!
//! Handles microphone capture, utterance detection, STT, TTS, and playback.

mod capture;
mod listen;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, AudioInput, SAMPLE_RATE, samples_to_wav};
pub use listen::{DetectorState, ListenOptions, UtteranceDetector, calculate_energy, listen};
pub use playback::{AudioOutput, AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3, resample};
pub use stt::{CaptureError, Recognizer, SpeechCapture, SpeechToText};
pub use tts::{
    AudioArtifact, GOOGLE_TTS_URL, SpeechSynthesis, SynthesisError, Synthesizer, TextToSpeech,
    TtsBackend, split_for_tts,
};
