//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for voice assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration and audio devices
///
/// Per-turn failures (credential, capture, generation, synthesis) have their
/// own tagged enums next to the component that raises them.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),
}
