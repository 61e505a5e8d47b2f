//! # Route Manifests
//!
//! Routes can be declared in a YAML or JSON file instead of code:
//!
//! ```yaml
//! routes:
//!   - schemaFile: schemas/full_name.avsc
//!     endpoint: /api
//!     middleware: [require-identity]
//!   - schema: '{"type":"record","name":"test","namespace":"api","fields":[]}'
//!     method: put
//!     synchronous: true
//! ```
//!
//! The document is checked against an embedded JSON Schema (Draft 2020-12)
//! first, so every structural problem is reported at once. Entries are then
//! converted with [`RouteOptions::from_value`], which resolves middleware,
//! path mapper and response writer names through a [`Registry`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use quay_core::{ErrorKind, ValidationViolations, Violation};
use serde_json::Value;
use thiserror::Error;

use crate::error::RouteConfigError;
use crate::middleware::{require_identity_header, Middleware};
use crate::response::{default_response_writer, ResponseWriter};
use crate::route::{default_path_mapper, PathMapper, RouteOptions};
use crate::server::Server;

const MANIFEST_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "type": "object",
  "required": ["routes"],
  "additionalProperties": false,
  "properties": {
    "routes": {
      "type": "array",
      "items": {
        "type": "object",
        "additionalProperties": false,
        "oneOf": [{"required": ["schema"]}, {"required": ["schemaFile"]}],
        "properties": {
          "schema": {"type": ["string", "object"]},
          "schemaFile": {"type": "string", "minLength": 1},
          "endpoint": {"type": "string"},
          "method": {"type": "string"},
          "middleware": {"type": "array", "items": {"type": "string"}},
          "pathMapper": {"type": "string"},
          "responseWriter": {"type": "string"},
          "synchronous": {"type": "boolean"},
          "publishOptions": {
            "type": "object",
            "additionalProperties": false,
            "properties": {
              "eventName": {"type": "string"},
              "attributes": {"type": "object", "additionalProperties": {"type": "string"}}
            }
          }
        }
      }
    }
  }
}"#;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("manifest schema failed to compile: {0}")]
    SchemaCompile(String),

    #[error("{path} is not a valid route manifest: {violations}")]
    Invalid {
        path: PathBuf,
        violations: ValidationViolations,
    },

    #[error("route {index} in {path}: {source}")]
    Route {
        path: PathBuf,
        index: usize,
        #[source]
        source: RouteConfigError,
    },
}

impl ManifestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Parse { .. } => ErrorKind::InvalidParameter,
            Self::SchemaCompile(_) => ErrorKind::SchemaCompile,
            Self::Invalid { .. } => ErrorKind::Validation,
            Self::Route { source, .. } => source.kind(),
        }
    }
}

/// Named middleware, path mappers and response writers a manifest may
/// refer to.
#[derive(Clone, Default)]
pub struct Registry {
    middleware: HashMap<String, Middleware>,
    path_mappers: HashMap<String, PathMapper>,
    response_writers: HashMap<String, ResponseWriter>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in entries:
    ///
    /// | kind            | name               | behavior                            |
    /// |-----------------|--------------------|-------------------------------------|
    /// | middleware      | `require-identity` | `x-identity` header becomes context |
    /// | path mapper     | `slashes`          | `com.example` to `com/example`      |
    /// | path mapper     | `flat`             | ignores the namespace               |
    /// | response writer | `default`          | 200 / 400 JSON bodies               |
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_middleware("require-identity", require_identity_header("x-identity"));
        registry.register_path_mapper_arc("slashes", default_path_mapper());
        registry.register_path_mapper("flat", |_| String::new());
        registry.register_response_writer("default", default_response_writer());
        registry
    }

    pub fn register_middleware(&mut self, name: impl Into<String>, middleware: Middleware) {
        self.middleware.insert(name.into(), middleware);
    }

    pub fn register_path_mapper(
        &mut self,
        name: impl Into<String>,
        mapper: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        self.register_path_mapper_arc(name, Arc::new(mapper));
    }

    fn register_path_mapper_arc(&mut self, name: impl Into<String>, mapper: PathMapper) {
        self.path_mappers.insert(name.into(), mapper);
    }

    pub fn register_response_writer(&mut self, name: impl Into<String>, writer: ResponseWriter) {
        self.response_writers.insert(name.into(), writer);
    }

    pub fn middleware(&self, name: &str) -> Option<Middleware> {
        self.middleware.get(name).cloned()
    }

    pub fn path_mapper(&self, name: &str) -> Option<PathMapper> {
        self.path_mappers.get(name).cloned()
    }

    pub fn response_writer(&self, name: &str) -> Option<ResponseWriter> {
        self.response_writers.get(name).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("middleware", &sorted_names(&self.middleware))
            .field("path_mappers", &sorted_names(&self.path_mappers))
            .field("response_writers", &sorted_names(&self.response_writers))
            .finish()
    }
}

fn sorted_names<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

/// Route options loaded from a manifest file.
#[derive(Debug)]
pub struct RouteManifest {
    path: PathBuf,
    routes: Vec<RouteOptions>,
}

impl RouteManifest {
    /// Read, validate and convert the manifest at `path`. `schemaFile`
    /// entries are resolved relative to the manifest's directory.
    pub fn load(path: impl AsRef<Path>, registry: &Registry) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let document = read_document(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_document(path, &document, base_dir, registry)
    }

    /// Validate and convert an already-parsed manifest document. `path`
    /// only labels errors.
    pub fn from_document(
        path: impl AsRef<Path>,
        document: &Value,
        base_dir: &Path,
        registry: &Registry,
    ) -> Result<Self, ManifestError> {
        let path = path.as_ref().to_path_buf();
        check_structure(&path, document)?;

        let entries = document
            .get("routes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut routes = Vec::with_capacity(entries.len());
        for (index, mut entry) in entries.into_iter().enumerate() {
            if let Some(file) = entry
                .as_object_mut()
                .and_then(|o| o.remove("schemaFile"))
                .and_then(|f| f.as_str().map(str::to_string))
            {
                let schema = read_schema_file(&base_dir.join(file))?;
                entry["schema"] = schema;
            }
            let options =
                RouteOptions::from_value(&entry, registry).map_err(|source| ManifestError::Route {
                    path: path.clone(),
                    index,
                    source,
                })?;
            routes.push(options);
        }

        tracing::debug!(path = %path.display(), routes = routes.len(), "route manifest loaded");
        Ok(Self { path, routes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn routes(&self) -> &[RouteOptions] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register every route on `server`, in manifest order. Returns the
    /// number of routes added.
    pub fn install(self, server: &mut Server) -> Result<usize, ManifestError> {
        let count = self.routes.len();
        for (index, options) in self.routes.into_iter().enumerate() {
            server
                .add_route(options)
                .map_err(|source| ManifestError::Route {
                    path: self.path.clone(),
                    index,
                    source,
                })?;
        }
        Ok(count)
    }
}

fn manifest_validator() -> Result<&'static jsonschema::Validator, ManifestError> {
    static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).map_err(|e| e.to_string())?;
            jsonschema::options()
                .with_draft(jsonschema::Draft::Draft202012)
                .build(&schema)
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| ManifestError::SchemaCompile(e.clone()))
}

fn check_structure(path: &Path, document: &Value) -> Result<(), ManifestError> {
    let validator = manifest_validator()?;
    let violations: ValidationViolations = validator
        .iter_errors(document)
        .map(|err| Violation::new(err.instance_path.to_string(), "", err.to_string()))
        .collect::<Vec<_>>()
        .into();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            violations,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

fn read_to_string(path: &Path) -> Result<String, ManifestError> {
    std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a YAML or JSON file into a JSON value, by extension.
fn read_document(path: &Path) -> Result<Value, ManifestError> {
    let content = read_to_string(path)?;
    let parsed = if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| ManifestError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// JSON schema files are passed through as text so schema parse errors
/// surface from schema normalization; YAML files are converted first.
fn read_schema_file(path: &Path) -> Result<Value, ManifestError> {
    if is_yaml(path) {
        read_document(path)
    } else {
        read_to_string(path).map(Value::String)
    }
}
