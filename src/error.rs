//! Error types for entrain
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for entrain
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Offline mix rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// Speech synthesis errors
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using entrain Error
pub type Result<T> = std::result::Result<T, Error>;
