//! # Serve Subcommand
//!
//! Loads a route manifest, mounts its routes and serves them over the
//! in-memory transport. Every route also gets a consumer that logs what it
//! receives, so a local request can be followed end to end:
//!
//! ```text
//! POST /com/example/FullName → validate → envelope → transport → consumer log
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use quay_api::{Registry, RouteManifest, Server, ServerConfig};
use quay_bus::{Bus, Delivery, HandlerError, InMemoryTransport, SubscribeOverrides, Transport};

/// Arguments for `quay serve`. Flags override `QUAY_*` variables.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Route manifest (YAML or JSON). Overrides QUAY_ROUTES.
    #[arg(long, value_name = "FILE")]
    pub routes: Option<PathBuf>,

    /// Port to listen on. Overrides QUAY_PORT.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Endpoint for routes that do not set one. Overrides QUAY_BASE_ENDPOINT.
    #[arg(long, value_name = "PATH")]
    pub endpoint: Option<String>,

    /// Maximum request body size. Overrides QUAY_BODY_LIMIT_BYTES.
    #[arg(long, value_name = "BYTES")]
    pub body_limit: Option<usize>,
}

impl ServeArgs {
    /// Apply these flags on top of `config`.
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(routes) = &self.routes {
            config.routes = Some(routes.clone());
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(endpoint) = &self.endpoint {
            config.base_endpoint = quay_api::normalize_endpoint(endpoint);
        }
        if let Some(limit) = self.body_limit {
            config.body_limit_bytes = limit;
        }
        config
    }
}

pub fn run_serve(args: &ServeArgs) -> Result<u8> {
    let config = args.apply(ServerConfig::from_env().context("invalid server configuration")?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(serve(config))?;
    Ok(0)
}

async fn serve(config: ServerConfig) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let server = build_server(&config, &Registry::with_builtins(), transport).await?;
    let app = quay_api::app(&server);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        routes = server.routes().count(),
        "Quay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    server.bus().close().await.context("failed to close transport")?;
    tracing::info!("Quay stopped");
    Ok(())
}

/// Connect the transport, mount the manifest routes and subscribe a logging
/// consumer per route.
pub async fn build_server(
    config: &ServerConfig,
    registry: &Registry,
    transport: Arc<dyn Transport>,
) -> Result<Server> {
    let bus = Bus::new(transport);
    bus.connect().await.context("failed to connect transport")?;

    let mut server = Server::from_config(bus, config);
    match &config.routes {
        Some(path) => {
            let manifest = RouteManifest::load(path, registry)
                .with_context(|| format!("failed to load routes from {}", path.display()))?;
            let count = manifest.install(&mut server)?;
            tracing::info!(path = %path.display(), routes = count, "routes mounted");
        }
        None => tracing::warn!("no route manifest configured; serving health probes only"),
    }

    for route in server.routes() {
        let overrides = SubscribeOverrides {
            event_name: Some(route.event_name().to_string()),
            ..SubscribeOverrides::default()
        };
        server
            .bus()
            .subscriber()
            .handle_compiled(&route.schema, log_delivery, overrides)
            .await
            .with_context(|| format!("failed to subscribe to {}", route.event_name()))?;
    }
    Ok(server)
}

async fn log_delivery(delivery: Delivery) -> Result<(), HandlerError> {
    tracing::info!(
        event_name = %delivery.event_name,
        message = %delivery.message,
        context = %delivery.context,
        "message received"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_manifest(dir: &Path) -> PathBuf {
        let path = dir.join("routes.yaml");
        std::fs::write(
            &path,
            r#"
routes:
  - schema: '{"type":"record","name":"FullName","namespace":"com.example","fields":[{"name":"first","type":"string"}]}'
  - schema: '{"type":"record","name":"Surname","namespace":"com.example","fields":[{"name":"last","type":"string"}]}'
    endpoint: /api
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn flags_override_config() {
        let args = ServeArgs {
            routes: Some(PathBuf::from("routes.yaml")),
            port: Some(9000),
            endpoint: Some("api/".into()),
            body_limit: None,
        };
        let config = args.apply(ServerConfig::default());
        assert_eq!(config.port, 9000);
        assert_eq!(config.base_endpoint, "/api");
        assert_eq!(config.routes, Some(PathBuf::from("routes.yaml")));
        assert_eq!(config.body_limit_bytes, ServerConfig::default().body_limit_bytes);
    }

    #[tokio::test]
    async fn builds_routes_and_consumers_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            routes: Some(write_manifest(dir.path())),
            ..ServerConfig::default()
        };
        let transport = Arc::new(InMemoryTransport::new());
        let server = build_server(&config, &Registry::with_builtins(), transport.clone())
            .await
            .unwrap();

        assert!(server.node("/com/example").is_some());
        assert!(server.node("/api/com/example").is_some());
        assert_eq!(server.routes().count(), 2);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn no_manifest_serves_nothing() {
        let server = build_server(
            &ServerConfig::default(),
            &Registry::with_builtins(),
            Arc::new(InMemoryTransport::new()),
        )
        .await
        .unwrap();
        assert_eq!(server.routes().count(), 0);
    }

    #[tokio::test]
    async fn bad_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.yaml");
        std::fs::write(&path, "routes: nope\n").unwrap();
        let config = ServerConfig {
            routes: Some(path),
            ..ServerConfig::default()
        };
        let result = build_server(
            &config,
            &Registry::with_builtins(),
            Arc::new(InMemoryTransport::new()),
        )
        .await;
        assert!(result.is_err());
    }
}
