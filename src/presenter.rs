//! Session presenter
//!
//! Owns the pipeline stages and the conversation log. Each trigger runs
//! capture → reply → speech to completion, then returns to [`PresenterState::Idle`].

use std::path::PathBuf;

use crate::chat::{ChatError, OpenAiChat, ResponseGenerator};
use crate::config::Config;
use crate::credential::{Credential, CredentialError, load_credential};
use crate::session::{ConversationLog, ConversationTurn};
use crate::voice::{
    AudioArtifact, AudioCapture, AudioInput, AudioOutput, AudioPlayback, CaptureError,
    SpeechCapture, SpeechSynthesis, SpeechToText, SynthesisError, TextToSpeech,
};
use crate::Error;

/// Presenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterState {
    /// Waiting for the trigger
    Idle,
    /// Running a pipeline cycle
    Processing,
}

/// Something the presenter wants shown to the user
#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// Microphone is open
    Listening,
    /// Utterance recorded, recognition in progress
    Processing,
    /// What the user said
    Transcript(&'a str),
    /// What the assistant answered
    Reply(&'a str),
    /// No transcript this turn
    CaptureFailed(&'a CaptureError),
    /// Reply is a fallback apology
    GenerationDegraded(&'a ChatError),
    /// Reply will not be spoken
    SynthesisFailed(&'a SynthesisError),
    /// Audio was produced but could not be played
    PlaybackFailed(&'a Error),
    /// Full conversation so far, oldest first
    History(&'a [ConversationTurn]),
}

/// Renders presenter events
pub trait SessionView {
    /// Show one event
    fn show(&mut self, event: SessionEvent<'_>);
}

/// What happened to the spoken reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// Audio was queued for playback; the artifact at this path is already deleted
    Played(PathBuf),
    /// No output device
    Muted,
    /// Synthesis or playback failed
    Failed,
}

/// Result of one trigger activation
#[derive(Debug)]
pub enum TurnOutcome {
    /// A transcript was obtained and a turn was logged
    Completed {
        /// The logged turn
        turn: ConversationTurn,
        /// Whether the reply was a fallback apology
        degraded: bool,
        /// What happened to the audio
        playback: Playback,
    },
    /// Capture failed; nothing was logged
    NoTranscript(CaptureError),
}

/// The stages and devices one session runs on
pub struct Pipeline {
    /// Microphone + STT
    pub capture: SpeechCapture,
    /// Chat completion
    pub generator: ResponseGenerator,
    /// TTS + temp file
    pub synthesis: SpeechSynthesis,
    /// Microphone
    pub input: Box<dyn AudioInput>,
    /// Speaker, if one is available
    pub output: Option<Box<dyn AudioOutput>>,
}

impl Pipeline {
    /// Build the production pipeline from configuration
    ///
    /// The microphone is opened per capture; a missing speaker mutes replies.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let base_url = config.llm.base_url.as_str();

        let capture = SpeechCapture::new(
            Box::new(SpeechToText::new(base_url, config.voice.stt_model.as_str())),
            config.voice.listen.clone(),
        );
        let generator =
            ResponseGenerator::new(Box::new(OpenAiChat::new(base_url)), config.llm.model.as_str());
        let synthesis =
            SpeechSynthesis::new(Box::new(TextToSpeech::new(config.voice.tts.clone(), base_url)));

        let input: Box<dyn AudioInput> = Box::new(AudioCapture::new());
        let output: Option<Box<dyn AudioOutput>> = match AudioPlayback::new() {
            Ok(playback) => Some(Box::new(playback)),
            Err(e) => {
                tracing::warn!(error = %e, "no audio output, replies will be text only");
                None
            }
        };

        Self {
            capture,
            generator,
            synthesis,
            input,
            output,
        }
    }
}

/// Interactive session: pipeline, credential, and conversation log
pub struct Assistant {
    credential: Credential,
    pipeline: Pipeline,
    log: ConversationLog,
    state: PresenterState,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("credential", &self.credential)
            .field("log", &self.log)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Start a session with an empty log
    #[must_use]
    pub const fn new(credential: Credential, pipeline: Pipeline) -> Self {
        Self {
            credential,
            pipeline,
            log: ConversationLog::new(),
            state: PresenterState::Idle,
        }
    }

    /// Resolve the credential, then build the production pipeline
    ///
    /// Nothing is opened or contacted unless the credential resolves.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] if no source yields a key
    pub fn from_config(config: &Config) -> Result<Self, CredentialError> {
        let credential = load_credential(&config.credentials)?;
        Ok(Self::new(credential, Pipeline::from_config(config)))
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PresenterState {
        self.state
    }

    /// Conversation so far
    #[must_use]
    pub const fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Run one full cycle for a trigger activation
    pub async fn run_turn(&mut self, view: &mut dyn SessionView) -> TurnOutcome {
        self.state = PresenterState::Processing;
        let outcome = self.process(view).await;
        self.state = PresenterState::Idle;

        view.show(SessionEvent::History(self.log.turns()));
        outcome
    }

    async fn process(&mut self, view: &mut dyn SessionView) -> TurnOutcome {
        view.show(SessionEvent::Listening);

        let transcript = match self.capture(view).await {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::info!(error = %e, "no transcript this turn");
                view.show(SessionEvent::CaptureFailed(&e));
                return TurnOutcome::NoTranscript(e);
            }
        };
        view.show(SessionEvent::Transcript(&transcript));

        let reply = self
            .pipeline
            .generator
            .generate_reply(&transcript, &self.credential)
            .await;
        if let Some(e) = &reply.degraded {
            view.show(SessionEvent::GenerationDegraded(e));
        }
        view.show(SessionEvent::Reply(&reply.text));

        let turn = self.log.append(transcript, reply.text).clone();
        let playback = self.speak(&turn.assistant_text, view).await;

        TurnOutcome::Completed {
            turn,
            degraded: reply.degraded.is_some(),
            playback,
        }
    }

    async fn capture(&mut self, view: &mut dyn SessionView) -> Result<String, CaptureError> {
        let capture = &self.pipeline.capture;
        let wav = capture.record(self.pipeline.input.as_mut()).await?;
        view.show(SessionEvent::Processing);
        capture.recognize(&wav, &self.credential).await
    }

    async fn speak(&mut self, text: &str, view: &mut dyn SessionView) -> Playback {
        let Some(output) = self.pipeline.output.as_mut() else {
            return Playback::Muted;
        };

        let artifact = match self.pipeline.synthesis.synthesize(text, &self.credential).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed");
                view.show(SessionEvent::SynthesisFailed(&e));
                return Playback::Failed;
            }
        };

        play_artifact(artifact, output.as_mut(), view)
    }
}

/// Hand the artifact to the speaker, deleting the file before playback runs
fn play_artifact(
    artifact: AudioArtifact,
    output: &mut dyn AudioOutput,
    view: &mut dyn SessionView,
) -> Playback {
    let (path, audio) = match artifact.consume() {
        Ok(consumed) => consumed,
        Err(e) => {
            let e = SynthesisError::Storage(e);
            view.show(SessionEvent::SynthesisFailed(&e));
            return Playback::Failed;
        }
    };

    match output.play_mp3(&audio) {
        Ok(()) => Playback::Played(path),
        Err(e) => {
            tracing::warn!(error = %e, "playback failed");
            view.show(SessionEvent::PlaybackFailed(&e));
            Playback::Failed
        }
    }
}
