//! # API Error Types
//!
//! [`RouteConfigError`] is raised at registration time and must be handled
//! by whoever registers routes. [`AppError`] is the request-time error
//! returned by middleware; it renders as a structured JSON body.
//! [`RouteError`] is what a response writer receives when a publish-path
//! request fails.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quay_bus::BridgeError;
use quay_core::{ErrorKind, ValidationViolations};
use quay_schema::SchemaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error normalizing route options or registering a route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteConfigError {
    /// A required option is absent.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// An option has the wrong shape or an unrecognized value.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The route's schema failed normalization.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Another route already serves this path.
    #[error("a route is already registered at '{path}'")]
    DuplicateRoute { path: String },
}

impl RouteConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParameter(_) => ErrorKind::MissingParameter,
            Self::InvalidParameter { .. } | Self::DuplicateRoute { .. } => {
                ErrorKind::InvalidParameter
            }
            Self::Schema(e) => e.kind(),
        }
    }
}

/// Why a publish-path request failed, as handed to a response writer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The request body is not JSON.
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    /// Validation, encoding or the transport failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl RouteError {
    /// The violations behind a validation failure, if this is one.
    pub fn violations(&self) -> Option<&ValidationViolations> {
        match self {
            Self::Bridge(e) => e.violations(),
            Self::MalformedBody(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedBody(_) => ErrorKind::InvalidParameter,
            Self::Bridge(e) => e.kind(),
        }
    }
}

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "UNAUTHORIZED").
    pub code: String,
    pub message: String,
}

/// Request-time error with an HTTP status.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid caller identity (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_renders_error_body() {
        let err = AppError::Unauthorized("missing 'x-identity' header".into());
        assert_eq!(
            err.status_and_code(),
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn route_config_error_kinds() {
        assert_eq!(
            RouteConfigError::MissingParameter("options".into()).kind(),
            ErrorKind::MissingParameter
        );
        assert_eq!(
            RouteConfigError::invalid("method", "nope").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            RouteConfigError::from(SchemaError::Compile("x".into())).kind(),
            ErrorKind::SchemaCompile
        );
        assert_eq!(
            RouteConfigError::invalid("method", "expected a string").to_string(),
            "invalid parameter 'method': expected a string"
        );
    }
}
