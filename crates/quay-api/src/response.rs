//! Response writers turn the outcome of a publish-path request into an HTTP
//! response.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::RouteError;

/// What the publish path produced: the transport's result (`Null` when the
/// publish was left running in the background) or the failure.
pub type RouteOutcome = Result<Value, RouteError>;

pub type ResponseWriter = Arc<dyn Fn(RouteOutcome) -> Response + Send + Sync>;

/// 200 `{"success": true}` on success. On failure, 400 with
/// `{"error": [<path>: <message>, ...]}` for validation failures and
/// `{"error": <message>}` otherwise.
pub fn default_response_writer() -> ResponseWriter {
    Arc::new(write_default)
}

fn write_default(outcome: RouteOutcome) -> Response {
    match outcome {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(err) => {
            let error = match err.violations() {
                Some(violations) => json!(violations.messages()),
                None => json!(err.to_string()),
            };
            (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quay_bus::{BridgeError, TransportError};
    use quay_core::{ValidationError, Violation};

    #[test]
    fn success_is_200() {
        let response = default_response_writer()(Ok(Value::Null));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn failures_are_400() {
        let validation = RouteError::Bridge(BridgeError::Validation(ValidationError {
            schema: "api.test".into(),
            violations: vec![Violation::new("id", "string", "expected string, got number")]
                .into(),
        }));
        let publish = RouteError::Bridge(BridgeError::Publish {
            event_name: "api.test".into(),
            source: TransportError::NotConnected,
        });
        for err in [validation, publish, RouteError::MalformedBody("eof".into())] {
            let response = default_response_writer()(Err(err));
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }
}
