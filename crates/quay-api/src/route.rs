//! # Route Configuration
//!
//! [`normalize`] turns caller-supplied [`RouteOptions`] into an immutable
//! [`RouteConfiguration`]. The route's address is derived from its schema:
//!
//! ```text
//! com.example.FullName  ->  namespace "com.example", short name "FullName"
//! apiEndpoint = normalize(endpoint) + pathMapper(namespace)  ->  /com/example
//! route path  = apiEndpoint + "/" + short name               ->  /com/example/FullName
//! ```
//!
//! Endpoint joins always produce exactly one leading slash and never a
//! doubled slash, whatever the endpoint and mapper return.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::MethodFilter;
use quay_bus::PublishOverrides;
use quay_schema::{normalize as normalize_schema, CompiledSchema, SchemaInput};
use serde_json::{Map, Value};

use crate::error::RouteConfigError;
use crate::manifest::Registry;
use crate::middleware::Middleware;
use crate::response::{default_response_writer, ResponseWriter};

/// Maps a schema namespace to a path fragment.
pub type PathMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The default path mapper: `com.example` becomes `com/example`.
pub fn default_path_mapper() -> PathMapper {
    Arc::new(|namespace: &str| namespace.replace('.', "/"))
}

/// HTTP verbs a route may be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Lowercase token, e.g. `post`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
            Self::Head => Method::HEAD,
            Self::Options => Method::OPTIONS,
        }
    }

    pub(crate) fn filter(&self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Patch => MethodFilter::PATCH,
            Self::Delete => MethodFilter::DELETE,
            Self::Head => MethodFilter::HEAD,
            Self::Options => MethodFilter::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = RouteConfigError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                RouteConfigError::invalid(
                    "method",
                    format!(
                        "'{s}' is not one of [{}]",
                        Self::ALL.map(|m| m.as_str()).join(", ")
                    ),
                )
            })
    }
}

/// Caller-supplied route options. Everything but the schema is optional.
#[derive(Clone, Default)]
pub struct RouteOptions {
    pub schema: Option<SchemaInput>,
    /// Base endpoint. Defaults to `/`.
    pub endpoint: Option<String>,
    /// Verb token, checked by [`normalize`]. Defaults to `post`.
    pub method: Option<String>,
    pub middleware: Vec<Middleware>,
    pub path_mapper: Option<PathMapper>,
    pub response_writer: Option<ResponseWriter>,
    pub publish: PublishOverrides,
    /// Wait for the transport before responding. Defaults to `false`.
    pub synchronous: Option<bool>,
}

impl RouteOptions {
    pub fn new(schema: impl Into<SchemaInput>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn path_mapper(mut self, mapper: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.path_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn response_writer(mut self, writer: ResponseWriter) -> Self {
        self.response_writer = Some(writer);
        self
    }

    pub fn event_name(mut self, event_name: impl Into<String>) -> Self {
        self.publish.event_name = Some(event_name.into());
        self
    }

    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = Some(synchronous);
        self
    }

    /// Build options from a loosely-typed document, resolving middleware,
    /// path mapper and response writer names through `registry`.
    ///
    /// Recognized keys: `schema` (string or object), `endpoint`, `method`,
    /// `middleware` (list of names), `pathMapper`, `responseWriter`,
    /// `synchronous` and `publishOptions` (`eventName`, `attributes`).
    ///
    /// # Errors
    ///
    /// [`RouteConfigError::InvalidParameter`] when `value` is not an object,
    /// a key has the wrong shape, or a name is not registered.
    pub fn from_value(value: &Value, registry: &Registry) -> Result<Self, RouteConfigError> {
        let object = value
            .as_object()
            .ok_or_else(|| RouteConfigError::invalid("options", "expected an object"))?;

        let schema = match object.get("schema") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(SchemaInput::Raw(raw.clone())),
            Some(document @ Value::Object(_)) => Some(SchemaInput::Document(document.clone())),
            Some(_) => {
                return Err(RouteConfigError::invalid(
                    "schema",
                    "expected a schema document or its JSON text",
                ))
            }
        };

        let mut middleware = Vec::new();
        if let Some(names) = object.get("middleware") {
            let names = names.as_array().ok_or_else(|| {
                RouteConfigError::invalid("middleware", "expected a list of middleware names")
            })?;
            for name in names {
                let name = name.as_str().ok_or_else(|| {
                    RouteConfigError::invalid("middleware", "expected a list of middleware names")
                })?;
                let found = registry.middleware(name).ok_or_else(|| {
                    RouteConfigError::invalid("middleware", format!("unknown middleware '{name}'"))
                })?;
                middleware.push(found);
            }
        }

        let path_mapper = optional_str(object, "pathMapper")?
            .map(|name| {
                registry.path_mapper(name).ok_or_else(|| {
                    RouteConfigError::invalid("pathMapper", format!("unknown path mapper '{name}'"))
                })
            })
            .transpose()?;

        let response_writer = optional_str(object, "responseWriter")?
            .map(|name| {
                registry.response_writer(name).ok_or_else(|| {
                    RouteConfigError::invalid(
                        "responseWriter",
                        format!("unknown response writer '{name}'"),
                    )
                })
            })
            .transpose()?;

        let synchronous = match object.get("synchronous") {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(RouteConfigError::invalid("synchronous", "expected a boolean")),
        };

        Ok(Self {
            schema,
            endpoint: optional_str(object, "endpoint")?.map(str::to_string),
            method: optional_str(object, "method")?.map(str::to_string),
            middleware,
            path_mapper,
            response_writer,
            publish: publish_overrides(object.get("publishOptions"))?,
            synchronous,
        })
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("schema", &self.schema)
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("middleware", &self.middleware)
            .field("path_mapper", &self.path_mapper.is_some())
            .field("response_writer", &self.response_writer.is_some())
            .field("publish", &self.publish)
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

fn optional_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, RouteConfigError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(RouteConfigError::invalid(key, "expected a string")),
    }
}

fn publish_overrides(value: Option<&Value>) -> Result<PublishOverrides, RouteConfigError> {
    let Some(value) = value else {
        return Ok(PublishOverrides::default());
    };
    let object = value
        .as_object()
        .ok_or_else(|| RouteConfigError::invalid("publishOptions", "expected an object"))?;

    let mut overrides = PublishOverrides {
        event_name: optional_str(object, "eventName")?.map(str::to_string),
        ..PublishOverrides::default()
    };
    if let Some(attributes) = object.get("attributes") {
        let attributes = attributes.as_object().ok_or_else(|| {
            RouteConfigError::invalid("publishOptions.attributes", "expected an object")
        })?;
        for (key, value) in attributes {
            let value = value.as_str().ok_or_else(|| {
                RouteConfigError::invalid(
                    "publishOptions.attributes",
                    format!("attribute '{key}' must be a string"),
                )
            })?;
            overrides.attributes.insert(key.clone(), value.to_string());
        }
    }
    Ok(overrides)
}

/// A normalized, immutable route.
#[derive(Clone)]
pub struct RouteConfiguration {
    pub schema: CompiledSchema,
    /// Normalized endpoint plus the mapped namespace, e.g. `/com/example`.
    pub api_endpoint: String,
    pub method: HttpMethod,
    pub middleware: Vec<Middleware>,
    pub path_mapper: PathMapper,
    pub response_writer: ResponseWriter,
    /// Publish overrides with the event name always resolved.
    pub publish: PublishOverrides,
    pub synchronous: bool,
}

impl RouteConfiguration {
    pub fn short_name(&self) -> &str {
        self.schema.name().short_name()
    }

    /// `{apiEndpoint}/{shortName}`.
    pub fn route_path(&self) -> String {
        join_endpoint(&self.api_endpoint, self.short_name())
    }

    pub fn event_name(&self) -> &str {
        self.publish.event_name.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for RouteConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfiguration")
            .field("schema", &self.schema.full_name())
            .field("api_endpoint", &self.api_endpoint)
            .field("method", &self.method)
            .field("middleware", &self.middleware)
            .field("publish", &self.publish)
            .field("synchronous", &self.synchronous)
            .finish_non_exhaustive()
    }
}

/// Normalize route options, applying defaults and deriving the endpoint.
///
/// # Errors
///
/// - [`RouteConfigError::MissingParameter`] when `options` is `None`.
/// - [`RouteConfigError::InvalidParameter`] for an unrecognized method, or
///   an endpoint with a segment the router would read as a capture.
/// - [`RouteConfigError::Schema`] when the schema fails normalization.
pub fn normalize(options: Option<RouteOptions>) -> Result<RouteConfiguration, RouteConfigError> {
    let options = options.ok_or_else(|| RouteConfigError::MissingParameter("options".into()))?;

    let schema = normalize_schema(options.schema)?;
    let method = match options.method.as_deref() {
        Some(token) => token.parse()?,
        None => HttpMethod::default(),
    };
    let path_mapper = options.path_mapper.unwrap_or_else(default_path_mapper);
    let endpoint = normalize_endpoint(options.endpoint.as_deref().unwrap_or("/"));
    let api_endpoint = join_endpoint(
        &endpoint,
        &path_mapper(schema.name().namespace_or_empty()),
    );
    check_segments(&api_endpoint)?;

    let mut publish = options.publish;
    if publish.event_name.is_none() {
        publish.event_name = Some(schema.full_name());
    }

    Ok(RouteConfiguration {
        schema,
        api_endpoint,
        method,
        middleware: options.middleware,
        path_mapper,
        response_writer: options
            .response_writer
            .unwrap_or_else(default_response_writer),
        publish,
        synchronous: options.synchronous.unwrap_or(false),
    })
}

/// Endpoints are literal paths: no `:param`, `{capture}` or `*wildcard`.
fn check_segments(api_endpoint: &str) -> Result<(), RouteConfigError> {
    let reserved = api_endpoint
        .split('/')
        .find(|s| s.starts_with(':') || s.contains(['{', '}', '*']));
    match reserved {
        Some(segment) => Err(RouteConfigError::invalid(
            "endpoint",
            format!("'{api_endpoint}' has reserved path segment '{segment}'"),
        )),
        None => Ok(()),
    }
}

/// Exactly one leading slash, no empty segments, no trailing slash.
/// The root endpoint is `/`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    join_endpoint(endpoint, "")
}

/// Join two path fragments under the rules of [`normalize_endpoint`].
pub fn join_endpoint(base: &str, tail: &str) -> String {
    let segments: Vec<&str> = base
        .split('/')
        .chain(tail.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}
