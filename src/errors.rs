//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure type returned by external collaborators (request handlers and
/// signal callbacks).
///
/// Its `Display` text is what ends up in the `Internal error: …` envelope.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate error enumeration covering all transport failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Stream I/O failure (closed descriptor, broken pipe, generic I/O).
    Io(String),
    /// Signal name parsing or trap installation failure.
    Signal(String),
    /// Line framing failure (e.g. an inbound line over the size limit).
    Codec(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Signal(msg) => write!(f, "signal: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
