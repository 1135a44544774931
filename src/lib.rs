//! Voice Assistant - push-to-talk speech in, chat completion, speech out
//!
//! Each activation listens for one utterance, transcribes it, asks a chat
//! model for a short reply, shows it, and speaks it back:
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │ Microphone │──▶│    STT     │──▶│    Chat    │──▶│    TTS     │──▶ speaker
//! │  (listen)  │   │ (Whisper)  │   │ completion │   │ (temp mp3) │
//! └────────────┘   └────────────┘   └────────────┘   └────────────┘
//!                                         │
//!                                         ▼
//!                                  ConversationLog
//! ```

pub mod chat;
pub mod config;
pub mod console;
pub mod credential;
pub mod error;
pub mod presenter;
pub mod session;
pub mod voice;

pub use config::Config;
pub use credential::{Credential, CredentialError, load_credential};
pub use error::{Error, Result};
pub use presenter::{Assistant, Pipeline, Playback, PresenterState, TurnOutcome};
pub use session::{ConversationLog, ConversationTurn};
