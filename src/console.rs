//! Terminal rendering of session events

use std::io::Write;

use crate::presenter::{SessionEvent, SessionView};
use crate::voice::CaptureError;

/// Prints session events to a writer (stdout by default)
pub struct ConsoleView<W: Write = std::io::Stdout> {
    out: W,
}

impl ConsoleView {
    /// View on standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleView<W> {
    /// View on an arbitrary writer
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the view and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Title line shown once at startup
    pub fn banner(&mut self) {
        self.line("🎙️ AI Voice Assistant");
        self.line("Choose \"Start Speaking\" and talk into your microphone!");
        self.line("");
    }

    /// Usage steps shown once the session is ready
    pub fn instructions(&mut self) {
        self.line("### Instructions:");
        self.line("1. Select 'Start Speaking'");
        self.line("2. Ask any question clearly");
        self.line("3. Wait for the AI's spoken response");
        self.line("4. Enjoy your conversation!");
        self.line("");
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %e, "console write failed");
        }
    }
}

impl<W: Write> SessionView for ConsoleView<W> {
    fn show(&mut self, event: SessionEvent<'_>) {
        match event {
            SessionEvent::Listening => self.line("🎙️ Listening... Speak now!"),
            SessionEvent::Processing => self.line("🎯 Processing your speech..."),
            SessionEvent::Transcript(text) => self.line(&format!("👤 You said: {text}")),
            SessionEvent::Reply(text) => self.line(&format!("🤖 Assistant: {text}")),
            SessionEvent::CaptureFailed(e) => {
                let message = match e {
                    CaptureError::NoSpeechDetected => {
                        "❌ No speech detected. Please try again.".to_string()
                    }
                    CaptureError::UnintelligibleAudio => {
                        "❌ Sorry, I couldn't understand what you said.".to_string()
                    }
                    CaptureError::RecognitionService(m) => {
                        format!("❌ Could not request results; {m}")
                    }
                    CaptureError::Microphone(m) => format!("❌ Error: {m}"),
                };
                self.line(&message);
            }
            SessionEvent::GenerationDegraded(e) => {
                self.line(&format!("❌ Error generating AI response: {e}"));
            }
            SessionEvent::SynthesisFailed(e) => {
                self.line(&format!("❌ Error in text-to-speech conversion: {e}"));
            }
            SessionEvent::PlaybackFailed(e) => {
                self.line(&format!("❌ Could not play audio: {e}"));
            }
            SessionEvent::History(turns) => {
                if turns.is_empty() {
                    return;
                }
                self.line("");
                self.line("### Conversation History");
                for turn in turns {
                    self.line(&format!("You: {}", turn.user_text));
                    self.line(&format!("Assistant: {}", turn.assistant_text));
                    self.line("---");
                }
                self.line("");
            }
        }
    }
}
