//! Named request middleware.
//!
//! A [`Middleware`] runs before the publish path with mutable access to the
//! [`RequestScope`]. It can attach a context (which becomes the envelope's
//! context) or reject the request with an [`AppError`]. Router nodes apply
//! each distinct name once, in registration order.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, Uri};
use serde_json::{json, Value};

use crate::error::AppError;

/// What middleware sees of a request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Published as the envelope context. `None` publishes `{}`.
    pub context: Option<Value>,
}

impl RequestScope {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            context: None,
        }
    }

    /// Header value as text, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type MiddlewareFn = dyn Fn(&mut RequestScope) -> Result<(), AppError> + Send + Sync;

#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    apply: Arc<MiddlewareFn>,
}

impl Middleware {
    pub fn new(
        name: impl Into<String>,
        apply: impl Fn(&mut RequestScope) -> Result<(), AppError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            apply: Arc::new(apply),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, scope: &mut RequestScope) -> Result<(), AppError> {
        (self.apply)(scope)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Sets `context = {"identity": <value of header>}`; rejects with 401 when
/// the header is absent or empty.
pub fn require_identity_header(header: impl Into<String>) -> Middleware {
    let header = header.into();
    Middleware::new(format!("require-identity:{header}"), move |scope| {
        let identity = scope
            .header(&header)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        match identity {
            Some(identity) => {
                scope.context = Some(json!({ "identity": identity }));
                Ok(())
            }
            None => Err(AppError::Unauthorized(format!("missing '{header}' header"))),
        }
    })
}
