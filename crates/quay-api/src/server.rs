//! # Route Table
//!
//! [`Server`] owns the route table: a map from `apiEndpoint` to
//! [`RouterNode`]. Registration is synchronous and happens before traffic;
//! [`Server::router`] then freezes the table into an axum [`Router`].
//!
//! ## Request Flow
//!
//! 1. Node middleware runs in registration order. A rejection returns its
//!    [`AppError`](crate::AppError) body directly.
//! 2. The body is parsed as JSON. An empty body is `{}`.
//! 3. The message is validated and encoded before anything is answered.
//! 4. Synchronous routes await the transport; the others leave the publish
//!    running in a spawned task whose failures reach only the observer.
//! 5. The route's response writer renders the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::on;
use axum::Router;
use quay_bus::Bus;
use serde_json::{json, Value};

use crate::config::{ServerConfig, DEFAULT_BODY_LIMIT_BYTES};
use crate::error::{RouteConfigError, RouteError};
use crate::middleware::{Middleware, RequestScope};
use crate::route::{normalize, normalize_endpoint, RouteConfiguration, RouteOptions};

pub const LIVENESS_PATH: &str = "/health/liveness";
pub const READINESS_PATH: &str = "/health/readiness";

/// Routes sharing one `apiEndpoint`, keyed by schema short name.
#[derive(Debug, Clone)]
pub struct RouterNode {
    api_endpoint: String,
    middleware: Vec<Middleware>,
    routes: BTreeMap<String, RouteConfiguration>,
}

impl RouterNode {
    fn new(api_endpoint: String) -> Self {
        Self {
            api_endpoint,
            middleware: Vec::new(),
            routes: BTreeMap::new(),
        }
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    /// Union of every route's middleware, first occurrence of each name
    /// kept.
    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn routes(&self) -> &BTreeMap<String, RouteConfiguration> {
        &self.routes
    }

    pub fn route(&self, short_name: &str) -> Option<&RouteConfiguration> {
        self.routes.get(short_name)
    }

    fn merge_middleware(&mut self, middleware: &[Middleware]) {
        for m in middleware {
            if !self.middleware.iter().any(|seen| seen.name() == m.name()) {
                self.middleware.push(m.clone());
            }
        }
    }
}

pub struct Server {
    bus: Bus,
    default_endpoint: String,
    body_limit: usize,
    nodes: BTreeMap<String, RouterNode>,
}

impl Server {
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            default_endpoint: "/".to_string(),
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
            nodes: BTreeMap::new(),
        }
    }

    pub fn from_config(bus: Bus, config: &ServerConfig) -> Self {
        Self::new(bus)
            .with_default_endpoint(&config.base_endpoint)
            .with_body_limit(config.body_limit_bytes)
    }

    /// Endpoint used by routes that do not set one.
    pub fn with_default_endpoint(mut self, endpoint: &str) -> Self {
        self.default_endpoint = normalize_endpoint(endpoint);
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    pub fn nodes(&self) -> &BTreeMap<String, RouterNode> {
        &self.nodes
    }

    pub fn node(&self, api_endpoint: &str) -> Option<&RouterNode> {
        self.nodes.get(api_endpoint)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteConfiguration> {
        self.nodes.values().flat_map(|node| node.routes.values())
    }

    /// Normalize `options` and attach the route to its node.
    ///
    /// # Errors
    ///
    /// Any [`normalize`] error, or [`RouteConfigError::DuplicateRoute`] when
    /// the node already has a route with this short name or the path is a
    /// health probe.
    pub fn add_route(
        &mut self,
        mut options: RouteOptions,
    ) -> Result<&RouteConfiguration, RouteConfigError> {
        if options.endpoint.is_none() {
            options.endpoint = Some(self.default_endpoint.clone());
        }
        let config = normalize(Some(options))?;
        let path = config.route_path();
        if path == LIVENESS_PATH || path == READINESS_PATH {
            return Err(RouteConfigError::DuplicateRoute { path });
        }

        let node = self
            .nodes
            .entry(config.api_endpoint.clone())
            .or_insert_with(|| RouterNode::new(config.api_endpoint.clone()));
        let short_name = config.short_name().to_string();
        if node.routes.contains_key(&short_name) {
            return Err(RouteConfigError::DuplicateRoute { path });
        }
        node.merge_middleware(&config.middleware);

        tracing::info!(
            method = %config.method,
            path = %path,
            event_name = config.event_name(),
            synchronous = config.synchronous,
            "route registered"
        );
        Ok(node.routes.entry(short_name).or_insert(config))
    }

    /// Build the axum router for every registered route.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for node in self.nodes.values() {
            let middleware: Arc<[Middleware]> = node.middleware.clone().into();
            for config in node.routes.values() {
                let route = Arc::new(RouteHandler {
                    config: config.clone(),
                    middleware: Arc::clone(&middleware),
                    bus: self.bus.clone(),
                });
                let handler = move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                    let route = Arc::clone(&route);
                    async move { route.handle(method, uri, headers, body).await }
                };
                router = router.route(&config.route_path(), on(config.method.filter(), handler));
            }
        }
        router
    }
}

struct RouteHandler {
    config: RouteConfiguration,
    middleware: Arc<[Middleware]>,
    bus: Bus,
}

impl RouteHandler {
    async fn handle(&self, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
        let mut scope = RequestScope::new(method, uri, headers);
        for middleware in self.middleware.iter() {
            if let Err(err) = middleware.apply(&mut scope) {
                tracing::debug!(
                    middleware = middleware.name(),
                    path = %scope.uri.path(),
                    error = %err,
                    "request rejected by middleware"
                );
                return err.into_response();
            }
        }

        let writer = &self.config.response_writer;
        let message = match parse_body(&body) {
            Ok(message) => message,
            Err(err) => return writer(Err(err)),
        };

        let prepared = match self.bus.prepare(
            &self.config.schema,
            message,
            scope.context,
            self.config.publish.clone(),
        ) {
            Ok(prepared) => prepared,
            Err(err) => return writer(Err(err.into())),
        };

        if self.config.synchronous {
            let outcome = self.bus.dispatch(prepared).await.map_err(RouteError::from);
            writer(outcome)
        } else {
            let bus = self.bus.clone();
            tokio::spawn(async move {
                // Failures are reported through the bus observer.
                let _ = bus.dispatch(prepared).await;
            });
            writer(Ok(Value::Null))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Value, RouteError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| RouteError::MalformedBody(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::require_identity_header;
    use quay_bus::MockTransport;

    fn server() -> Server {
        Server::new(Bus::new(Arc::new(MockTransport::new())))
    }

    fn schema(name: &str, namespace: &str) -> Value {
        json!({
            "type": "record", "name": name, "namespace": namespace,
            "fields": [{"name": "value", "type": "string"}]
        })
    }

    #[test]
    fn shared_namespace_groups_under_one_node() {
        let mut server = server();
        server
            .add_route(RouteOptions::new(schema("FullName", "com.example")))
            .unwrap();
        server
            .add_route(RouteOptions::new(schema("Surname", "com.example")))
            .unwrap();

        assert_eq!(server.nodes().len(), 1);
        let node = server.node("/com/example").unwrap();
        let names: Vec<&str> = node.routes().keys().map(String::as_str).collect();
        assert_eq!(names, ["FullName", "Surname"]);
        assert_eq!(server.routes().count(), 2);
    }

    #[test]
    fn duplicate_short_name_rejected() {
        let mut server = server();
        server
            .add_route(RouteOptions::new(schema("FullName", "com.example")))
            .unwrap();
        let err = server
            .add_route(RouteOptions::new(schema("FullName", "com.example")).method("put"))
            .unwrap_err();
        assert_eq!(
            err,
            RouteConfigError::DuplicateRoute {
                path: "/com/example/FullName".into()
            }
        );
    }

    #[test]
    fn health_paths_reserved() {
        let mut server = server();
        let err = server
            .add_route(RouteOptions::new(schema("liveness", "health")))
            .unwrap_err();
        assert!(matches!(err, RouteConfigError::DuplicateRoute { .. }));
        assert!(server.nodes().is_empty());
    }

    #[test]
    fn node_middleware_is_deduplicated_union() {
        let mut server = server();
        let audit = Middleware::new("audit", |_| Ok(()));
        server
            .add_route(
                RouteOptions::new(schema("FullName", "com.example"))
                    .middleware(require_identity_header("x-identity"))
                    .middleware(audit.clone()),
            )
            .unwrap();
        server
            .add_route(
                RouteOptions::new(schema("Surname", "com.example"))
                    .middleware(audit)
                    .middleware(Middleware::new("trace", |_| Ok(()))),
            )
            .unwrap();

        let names: Vec<&str> = server
            .node("/com/example")
            .unwrap()
            .middleware()
            .iter()
            .map(Middleware::name)
            .collect();
        assert_eq!(names, ["require-identity:x-identity", "audit", "trace"]);
    }

    #[test]
    fn default_endpoint_applies_when_unset() {
        let mut server = server().with_default_endpoint("api/v1/");
        let path = server
            .add_route(RouteOptions::new(schema("FullName", "com.example")))
            .unwrap()
            .route_path();
        assert_eq!(path, "/api/v1/com/example/FullName");

        let path = server
            .add_route(RouteOptions::new(schema("Surname", "com.example")).endpoint("/"))
            .unwrap()
            .route_path();
        assert_eq!(path, "/com/example/Surname");
    }

    #[test]
    fn capture_syntax_in_endpoint_rejected_before_routing() {
        let mut server = server().with_default_endpoint("/api/{version}");
        let err = server
            .add_route(RouteOptions::new(schema("FullName", "com.example")))
            .unwrap_err();
        assert!(matches!(err, RouteConfigError::InvalidParameter { .. }));

        let err = server
            .add_route(RouteOptions::new(schema("FullName", "com.example")).endpoint("/api/:v"))
            .unwrap_err();
        assert!(matches!(err, RouteConfigError::InvalidParameter { .. }));

        assert!(server.nodes().is_empty());
        let _router = server.router();
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
        assert_eq!(parse_body(b"  \n").unwrap(), json!({}));
        assert_eq!(parse_body(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(
            parse_body(b"{nope"),
            Err(RouteError::MalformedBody(_))
        ));
    }
}
