//! # Bus Error Types
//!
//! [`TransportError`] is what a transport reports. [`HandlerError`] is what
//! a consumer handler reports. [`BridgeError`] is everything the bridges
//! surface, either to the caller of a publish or through the observer side
//! channel.

use quay_core::{ErrorKind, ValidationError, ValidationViolations};
use quay_envelope::EnvelopeError;
use quay_schema::SchemaError;
use thiserror::Error;

/// Failure reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// `connect` has not been called, or the transport was closed.
    #[error("transport is not connected")]
    NotConnected,

    /// The transport refused the operation.
    #[error("transport rejected the operation: {0}")]
    Rejected(String),

    /// The transport failed for a reason of its own.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Failure of a consumer handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Wrap any displayable error as [`HandlerError::Failed`].
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Error surfaced by the publish and subscribe bridges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The transport rejected a publish.
    #[error("publish of '{event_name}' failed: {source}")]
    Publish {
        event_name: String,
        #[source]
        source: TransportError,
    },

    /// The transport rejected a subscription.
    #[error("subscription to '{event_name}' failed: {source}")]
    Subscribe {
        event_name: String,
        #[source]
        source: TransportError,
    },

    /// A consumer handler failed. Never propagated to the transport.
    #[error("handler for '{schema}' failed: {source}")]
    Handler {
        schema: String,
        #[source]
        source: HandlerError,
    },
}

impl BridgeError {
    /// Taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(e) => e.kind(),
            Self::Validation(_) => ErrorKind::Validation,
            Self::Envelope(e) => e.kind(),
            Self::Publish { .. } | Self::Subscribe { .. } => ErrorKind::Transport,
            Self::Handler { .. } => ErrorKind::Handler,
        }
    }

    /// The violations behind a validation failure, if this is one.
    pub fn violations(&self) -> Option<&ValidationViolations> {
        match self {
            Self::Validation(e) | Self::Envelope(EnvelopeError::Validation(e)) => {
                Some(&e.violations)
            }
            _ => None,
        }
    }
}
