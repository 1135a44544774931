//! Shared test utilities: scripted stand-ins for audio devices and remote services

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voice_assistant::chat::{ChatError, ChatModel, ChatRequest, ResponseGenerator};
use voice_assistant::credential::{Credential, CredentialSource};
use voice_assistant::presenter::{SessionEvent, SessionView};
use voice_assistant::voice::{
    AudioInput, AudioOutput, CaptureError, ListenOptions, Recognizer, SAMPLE_RATE, SpeechCapture,
    SpeechSynthesis, SynthesisError, Synthesizer,
};
use voice_assistant::{Error, Pipeline, Result};

/// Samples handed out per `take_buffer` call (50 ms)
const CHUNK: usize = SAMPLE_RATE as usize / 20;

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f32 * duration_secs) as usize]
}

/// Listening bounds short enough for tests
pub fn fast_listen_options() -> ListenOptions {
    ListenOptions {
        ambient_duration: Duration::from_millis(100),
        timeout: Duration::from_millis(500),
        phrase_time_limit: Duration::from_secs(2),
        pause_threshold: Duration::from_millis(200),
        min_phrase: Duration::from_millis(100),
        poll_interval: Duration::from_millis(1),
    }
}

pub fn test_credential() -> Credential {
    Credential::new("sk-test-key", CredentialSource::Environment)
}

/// Microphone that replays the same script on every `start`, then silence
pub struct FakeInput {
    script: Vec<f32>,
    unplugged: bool,
    pending: Mutex<VecDeque<f32>>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl FakeInput {
    /// Someone says something on every turn
    pub fn speaking() -> Self {
        let mut script = generate_silence(0.1);
        script.extend(generate_sine_samples(440.0, 0.4, 0.3));
        Self::with_script(script)
    }

    /// Nobody ever speaks
    pub fn silent() -> Self {
        Self::with_script(Vec::new())
    }

    /// No device: every `start` fails
    pub fn unplugged() -> Self {
        Self {
            unplugged: true,
            ..Self::silent()
        }
    }

    fn with_script(script: Vec<f32>) -> Self {
        Self {
            script,
            unplugged: false,
            pending: Mutex::new(VecDeque::new()),
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl AudioInput for FakeInput {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.unplugged {
            return Err(Error::Audio("no input device available".to_string()));
        }
        *self.pending.lock().unwrap() = self.script.iter().copied().collect();
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn take_buffer(&self) -> Vec<f32> {
        let mut pending = self.pending.lock().unwrap();
        let n = CHUNK.min(pending.len());
        let mut chunk: Vec<f32> = pending.drain(..n).collect();
        chunk.resize(CHUNK, 0.0);
        chunk
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Recognizer returning scripted transcripts in order
pub struct FakeRecognizer {
    transcripts: Mutex<VecDeque<std::result::Result<String, CaptureError>>>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeRecognizer {
    pub fn new(transcripts: Vec<std::result::Result<String, CaptureError>>) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn transcribe(
        &self,
        wav: &[u8],
        _credential: &Credential,
    ) -> std::result::Result<String, CaptureError> {
        assert!(wav.starts_with(b"RIFF"), "recognizer expects WAV input");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// How the fake chat model answers
#[derive(Clone, Copy)]
pub enum ChatBehavior {
    /// Echo the transcript as "re: <transcript>"
    Echo,
    /// Fail as if the key were rejected
    Unauthorized,
    /// Fail as if rate limited
    RateLimited,
}

/// Chat model recording every request it receives
pub struct FakeChat {
    behavior: ChatBehavior,
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(
        &self,
        request: &ChatRequest,
        _credential: &Credential,
    ) -> std::result::Result<String, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.behavior {
            ChatBehavior::Echo => {
                let transcript = request.messages.last().map_or("", |m| m.content.as_str());
                Ok(format!("re: {transcript}"))
            }
            ChatBehavior::Unauthorized => Err(ChatError::Auth("401".into())),
            ChatBehavior::RateLimited => Err(ChatError::RateLimit("429".into())),
        }
    }
}

/// Synthesizer producing fixed bytes, or failing
pub struct FakeSynthesizer {
    fail: bool,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _credential: &Credential,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SynthesisError::Service("tts unavailable".into()));
        }
        Ok(format!("ID3:{text}").into_bytes())
    }
}

/// Speaker recording what it was asked to play
pub struct FakeOutput {
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl AudioOutput for FakeOutput {
    fn play_mp3(&mut self, mp3_data: &[u8]) -> Result<()> {
        self.played.lock().unwrap().push(mp3_data.to_vec());
        Ok(())
    }
}

/// View collecting a short tag per event
#[derive(Default)]
pub struct RecordingView {
    pub events: Vec<String>,
}

impl SessionView for RecordingView {
    fn show(&mut self, event: SessionEvent<'_>) {
        let tag = match event {
            SessionEvent::Listening => "listening".to_string(),
            SessionEvent::Processing => "processing".to_string(),
            SessionEvent::Transcript(t) => format!("transcript:{t}"),
            SessionEvent::Reply(r) => format!("reply:{r}"),
            SessionEvent::CaptureFailed(e) => format!("capture-failed:{e}"),
            SessionEvent::GenerationDegraded(_) => "degraded".to_string(),
            SessionEvent::SynthesisFailed(_) => "synthesis-failed".to_string(),
            SessionEvent::PlaybackFailed(_) => "playback-failed".to_string(),
            SessionEvent::History(turns) => format!("history:{}", turns.len()),
        };
        self.events.push(tag);
    }
}

/// Handles onto the fakes inside a built pipeline
pub struct Handles {
    pub recognizer_calls: Arc<AtomicUsize>,
    pub chat_requests: Arc<Mutex<Vec<ChatRequest>>>,
    pub synth_calls: Arc<AtomicUsize>,
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
    pub mic_starts: Arc<AtomicUsize>,
    pub mic_stops: Arc<AtomicUsize>,
}

impl Handles {
    pub fn generate_calls(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }
}

/// Pipeline settings for a test
pub struct Scenario {
    pub input: FakeInput,
    pub transcripts: Vec<std::result::Result<String, CaptureError>>,
    pub chat: ChatBehavior,
    pub synthesis_fails: bool,
    pub speaker: bool,
}

impl Scenario {
    pub fn speaking(transcripts: &[&str]) -> Self {
        Self {
            input: FakeInput::speaking(),
            transcripts: transcripts.iter().map(|t| Ok((*t).to_string())).collect(),
            chat: ChatBehavior::Echo,
            synthesis_fails: false,
            speaker: true,
        }
    }

    pub fn silent() -> Self {
        Self {
            input: FakeInput::silent(),
            ..Self::speaking(&[])
        }
    }

    pub fn unplugged() -> Self {
        Self {
            input: FakeInput::unplugged(),
            ..Self::speaking(&["never heard"])
        }
    }

    /// Build a pipeline writing audio artifacts into `temp_dir`
    pub fn build(self, temp_dir: &Path) -> (Pipeline, Handles) {
        let recognizer = FakeRecognizer::new(self.transcripts);
        let chat = FakeChat {
            behavior: self.chat,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let synthesizer = FakeSynthesizer {
            fail: self.synthesis_fails,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let played = Arc::new(Mutex::new(Vec::new()));

        let fakes = Handles {
            recognizer_calls: Arc::clone(&recognizer.calls),
            chat_requests: Arc::clone(&chat.requests),
            synth_calls: Arc::clone(&synthesizer.calls),
            played: Arc::clone(&played),
            mic_starts: Arc::clone(&self.input.starts),
            mic_stops: Arc::clone(&self.input.stops),
        };

        let output: Option<Box<dyn AudioOutput>> = if self.speaker {
            Some(Box::new(FakeOutput { played }))
        } else {
            None
        };

        let pipeline = Pipeline {
            capture: SpeechCapture::new(Box::new(recognizer), fast_listen_options()),
            generator: ResponseGenerator::new(Box::new(chat), "gpt-3.5-turbo"),
            synthesis: SpeechSynthesis::new(Box::new(synthesizer)).with_temp_dir(temp_dir),
            input: Box::new(self.input),
            output,
        };

        (pipeline, fakes)
    }
}
