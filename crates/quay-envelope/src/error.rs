//! Envelope error types.

use quay_core::{ErrorKind, ValidationError};
use thiserror::Error;

/// Error encoding or decoding an envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The message does not conform to the writer's schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Serialization failed after validation.
    #[error("encode error: {0}")]
    Encode(String),

    /// The buffer is not a well-formed envelope, or the writer's message
    /// cannot be resolved against the reader's schema.
    #[error("decode error: {0}")]
    Decode(String),
}

impl EnvelopeError {
    /// Taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}
