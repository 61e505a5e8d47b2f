//! # quay-api — Schema-Addressed HTTP Routes
//!
//! Each registered schema becomes one route. The path is derived from the
//! schema's name, the request body is the message, and whatever identity
//! the route's middleware attaches becomes the envelope context:
//!
//! | Schema                 | Endpoint    | Route                          |
//! |------------------------|-------------|--------------------------------|
//! | `com.example.FullName` | `/`         | `POST /com/example/FullName`   |
//! | `com.example.Surname`  | `/`         | `POST /com/example/Surname`    |
//! | `test`                 | `/api/v1.0` | `POST /api/v1.0/test`          |
//!
//! Routes are registered on a [`Server`] directly or from a
//! [`RouteManifest`]. Clients get 200 `{"success": true}` on success and
//! 400 `{"error": ...}` on any publish-path failure.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → DefaultBodyLimit → node Middleware → Handler
//! ```

pub mod config;
pub mod error;
pub mod manifest;
pub mod middleware;
pub mod response;
pub mod route;
pub mod server;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, ServerConfig};
pub use error::{AppError, ErrorBody, ErrorDetail, RouteConfigError, RouteError};
pub use manifest::{ManifestError, Registry, RouteManifest};
pub use middleware::{require_identity_header, Middleware, RequestScope};
pub use response::{default_response_writer, ResponseWriter, RouteOutcome};
pub use route::{
    default_path_mapper, join_endpoint, normalize, normalize_endpoint, HttpMethod, PathMapper,
    RouteConfiguration, RouteOptions,
};
pub use server::{RouterNode, Server, LIVENESS_PATH, READINESS_PATH};

/// Assemble the application router for every route registered on `server`.
///
/// Health probes (`/health/*`) are mounted outside the route middleware and
/// body limit.
pub fn app(server: &Server) -> Router {
    let api = server
        .router()
        .layer(DefaultBodyLimit::max(server.body_limit()))
        .layer(TraceLayer::new_for_http());

    let health = Router::new()
        .route(LIVENESS_PATH, get(liveness))
        .route(READINESS_PATH, get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 once the routes are mounted.
async fn readiness() -> &'static str {
    "ready"
}
