//! Error types for frame decoding, transports and the sampling run.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Why a single frame was discarded.
///
/// These never abort the pipeline; the consumer logs them and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The frame had no space separating topic and payload.
    MissingSeparator(String),
    /// The payload was not a valid message record.
    InvalidRecord(String),
    /// The record carried an empty id.
    EmptyId,
    /// `payload.data` was not a JSON object.
    InvalidData { id: String, reason: String },
    /// `publishedAt` was absent from the data blob.
    MissingPublishedAt { id: String },
    /// `publishedAt` was present but not a finite number.
    InvalidPublishedAt { id: String, value: String },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MissingSeparator(raw) => {
                write!(f, "Frame has no topic separator: {}", raw)
            }
            FrameError::InvalidRecord(msg) => write!(f, "Failed to parse JSON payload: {}", msg),
            FrameError::EmptyId => write!(f, "Message record has an empty id"),
            FrameError::InvalidData { id, reason } => {
                write!(f, "Failed to parse 'data' field of message {}: {}", id, reason)
            }
            FrameError::MissingPublishedAt { id } => {
                write!(f, "Message {} has no 'publishedAt' field", id)
            }
            FrameError::InvalidPublishedAt { id, value } => {
                write!(f, "Message {} has a non-numeric 'publishedAt': {}", id, value)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Failures reported by a pub/sub transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Connect { address: String, reason: String },
    Subscribe { topic: String, reason: String },
    Receive(String),
    /// The underlying subscription ended.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect { address, reason } => {
                write!(f, "Failed to connect to {}: {}", address, reason)
            }
            TransportError::Subscribe { topic, reason } => {
                write!(f, "Failed to subscribe to '{}': {}", topic, reason)
            }
            TransportError::Receive(reason) => write!(f, "Failed to receive message: {}", reason),
            TransportError::Closed => write!(f, "Subscription closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Fatal errors that end a sampling run.
#[derive(Debug)]
pub enum SamplerError {
    Transport(TransportError),
    Io { path: PathBuf, source: io::Error },
    /// A pipeline stage panicked or was cancelled.
    Task(String),
}

impl SamplerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SamplerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerError::Transport(e) => write!(f, "Transport error: {}", e),
            SamplerError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            SamplerError::Task(msg) => write!(f, "Pipeline task failed: {}", msg),
        }
    }
}

impl std::error::Error for SamplerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SamplerError::Transport(e) => Some(e),
            SamplerError::Io { source, .. } => Some(source),
            SamplerError::Task(_) => None,
        }
    }
}

impl From<TransportError> for SamplerError {
    fn from(e: TransportError) -> Self {
        SamplerError::Transport(e)
    }
}

impl From<tokio::task::JoinError> for SamplerError {
    fn from(e: tokio::task::JoinError) -> Self {
        SamplerError::Task(e.to_string())
    }
}
