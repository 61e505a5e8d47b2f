//! # Error Taxonomy
//!
//! Every error raised anywhere in Quay belongs to one [`ErrorKind`].
//!
//! ## Propagation
//!
//! - Configuration-time kinds (`MissingParameter`, `InvalidParameter`,
//!   `SchemaCompile`) are returned from registration calls and must be
//!   handled before traffic starts.
//! - Request-time kinds (`Validation`, `Encode`, `Transport`) fail the
//!   publish call and are also reported on the observer side channel.
//! - `Decode` and `Handler` occur on the consumer side and never escape the
//!   subscription callback.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Classification shared by all Quay error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required parameter was absent.
    MissingParameter,
    /// A parameter had the wrong shape or type.
    InvalidParameter,
    /// A schema document was malformed or could not be compiled.
    SchemaCompile,
    /// A value does not conform to its schema.
    Validation,
    /// A value could not be serialized into an envelope.
    Encode,
    /// An envelope was malformed or schema resolution was impossible.
    Decode,
    /// The transport collaborator failed.
    Transport,
    /// A consumer handler failed or panicked.
    Handler,
}

impl ErrorKind {
    /// Machine-readable code used in error bodies and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::SchemaCompile => "SCHEMA_COMPILE_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Encode => "ENCODE_ERROR",
            Self::Decode => "DECODE_ERROR",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Handler => "HANDLER_ERROR",
        }
    }

    /// Whether this kind is raised while registering routes or compiling
    /// schemas, as opposed to while handling traffic.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter | Self::InvalidParameter | Self::SchemaCompile
        )
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a fully-qualified schema name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name was empty.
    #[error("schema name is empty")]
    Empty,

    /// A dot-separated segment was empty (leading, trailing or doubled dot).
    #[error("schema name '{0}' has an empty segment")]
    EmptySegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::MissingParameter,
            ErrorKind::InvalidParameter,
            ErrorKind::SchemaCompile,
            ErrorKind::Validation,
            ErrorKind::Encode,
            ErrorKind::Decode,
            ErrorKind::Transport,
            ErrorKind::Handler,
        ];
        let mut codes: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn configuration_kinds() {
        assert!(ErrorKind::MissingParameter.is_configuration());
        assert!(ErrorKind::SchemaCompile.is_configuration());
        assert!(!ErrorKind::Validation.is_configuration());
        assert!(!ErrorKind::Handler.is_configuration());
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&ErrorKind::Decode).unwrap();
        assert_eq!(json, "\"DECODE_ERROR\"");
        assert_eq!(ErrorKind::Decode.to_string(), "DECODE_ERROR");
    }
}
