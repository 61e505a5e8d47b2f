//! # Transport Abstraction
//!
//! The one seam between Quay and a delivery mechanism. A transport moves
//! opaque envelope buffers. It owns its connection lifecycle, retries,
//! and acknowledgement policy; the bridges never open or close transport
//! resources themselves.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use quay_schema::CompiledSchema;
use serde_json::Value;

use crate::error::TransportError;

/// Boxed future returned by buffer handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a subscribed handler tells the transport about one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Processed.
    Ack,
    /// Not processed: the buffer did not decode or the handler failed.
    /// The transport decides what, if anything, to do about it.
    Nack,
}

/// Callback a transport invokes once per inbound buffer.
pub type BufferHandler = Arc<dyn Fn(Vec<u8>) -> BoxFuture<DeliveryOutcome> + Send + Sync>;

/// Options passed with every publish.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Routing key; the full schema name unless overridden.
    pub event_name: String,
    /// The validated message, for transports that route on content.
    pub message: Value,
    /// The context carried alongside the message.
    pub context: Value,
    /// The message's writer schema.
    pub schema: CompiledSchema,
    /// Transport-specific extras passed through untouched.
    pub attributes: BTreeMap<String, String>,
}

/// Options passed with every subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub event_name: String,
    /// Maximum overlapping deliveries. `1` means strictly sequential.
    pub prefetch: usize,
    pub attributes: BTreeMap<String, String>,
}

impl SubscribeOptions {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            prefetch: 1,
            attributes: BTreeMap::new(),
        }
    }
}

/// A message transport.
///
/// `publish` resolves with the transport's own result, which the publish
/// bridge returns unchanged. `subscribe` resolves once the handler is
/// registered, not once per message.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn publish(
        &self,
        buffer: Vec<u8>,
        options: PublishOptions,
    ) -> Result<Value, TransportError>;

    async fn subscribe(
        &self,
        handler: BufferHandler,
        options: SubscribeOptions,
    ) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
