//! # Subscribe Bridge
//!
//! Wraps a [`MessageHandler`] in the buffer callback a transport invokes.
//! Per buffer:
//!
//! - Decode the envelope against the handler's schema. On failure report
//!   the error and stop; the handler is never called.
//! - Report `Received`, then run the handler in its own task and await it.
//!   An `Err` or a panic is reported as [`BridgeError::Handler`] and turned
//!   into [`DeliveryOutcome::Nack`]; nothing propagates to the transport.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use quay_envelope::EnvelopeCodec;
use quay_schema::{CompiledSchema, SchemaInput};
use serde_json::Value;

use crate::error::{BridgeError, HandlerError};
use crate::observer::{BridgeEvent, BridgeObserver};
use crate::transport::{
    BoxFuture, BufferHandler, DeliveryOutcome, SubscribeOptions, Transport,
};

/// One decoded message as seen by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: Value,
    pub context: Value,
    pub event_name: String,
}

/// A consumer of decoded messages.
///
/// Implemented for any `Fn(Delivery) -> impl Future<Output = Result<(),
/// HandlerError>>`.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
        (self)(delivery).await
    }
}

/// Caller overrides for one subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOverrides {
    /// Replaces the default event name (the full schema name).
    pub event_name: Option<String>,
    /// Overlapping deliveries allowed; `None` means one at a time.
    pub prefetch: Option<usize>,
    pub attributes: BTreeMap<String, String>,
}

/// Registers handlers with a transport.
#[derive(Clone)]
pub struct SubscribeBridge {
    transport: Arc<dyn Transport>,
    codec: EnvelopeCodec,
    observer: Arc<dyn BridgeObserver>,
}

struct Subscription {
    schema: CompiledSchema,
    event_name: String,
    handler: Arc<dyn MessageHandler>,
    codec: EnvelopeCodec,
    observer: Arc<dyn BridgeObserver>,
}

impl SubscribeBridge {
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: EnvelopeCodec,
        observer: Arc<dyn BridgeObserver>,
    ) -> Self {
        Self {
            transport,
            codec,
            observer,
        }
    }

    /// Normalize `schema` and register `handler` for its messages.
    ///
    /// Resolves once the transport has registered the handler.
    pub async fn handle(
        &self,
        schema: impl Into<SchemaInput>,
        handler: impl MessageHandler,
        overrides: SubscribeOverrides,
    ) -> Result<(), BridgeError> {
        let schema = CompiledSchema::new(schema).map_err(|e| self.report(e.into()))?;
        self.handle_compiled(&schema, handler, overrides).await
    }

    /// Register `handler` with an already-compiled schema.
    pub async fn handle_compiled(
        &self,
        schema: &CompiledSchema,
        handler: impl MessageHandler,
        overrides: SubscribeOverrides,
    ) -> Result<(), BridgeError> {
        let event_name = overrides
            .event_name
            .unwrap_or_else(|| schema.full_name());
        let subscription = Arc::new(Subscription {
            schema: schema.clone(),
            event_name: event_name.clone(),
            handler: Arc::new(handler),
            codec: self.codec.clone(),
            observer: Arc::clone(&self.observer),
        });
        let callback: BufferHandler =
            Arc::new(move |buffer: Vec<u8>| -> BoxFuture<DeliveryOutcome> {
                let subscription = Arc::clone(&subscription);
                Box::pin(async move { subscription.deliver(buffer).await })
            });
        let options = SubscribeOptions {
            event_name: event_name.clone(),
            prefetch: overrides.prefetch.unwrap_or(1).max(1),
            attributes: overrides.attributes,
        };

        self.transport
            .subscribe(callback, options)
            .await
            .map_err(|source| {
                self.report(BridgeError::Subscribe {
                    event_name: event_name.clone(),
                    source,
                })
            })?;
        self.observer.on_info(&BridgeEvent::Subscribed {
            schema: schema.full_name(),
            event_name,
        });
        Ok(())
    }

    fn report(&self, error: BridgeError) -> BridgeError {
        self.observer.on_error(&error);
        error
    }
}

impl Subscription {
    async fn deliver(&self, buffer: Vec<u8>) -> DeliveryOutcome {
        let decoded = match self.codec.decode(&self.schema, &buffer) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.observer.on_error(&e.into());
                return DeliveryOutcome::Nack;
            }
        };

        let schema = self.schema.full_name();
        self.observer.on_info(&BridgeEvent::Received {
            schema: schema.clone(),
            event_name: self.event_name.clone(),
        });

        let delivery = Delivery {
            message: decoded.message,
            context: decoded.context,
            event_name: self.event_name.clone(),
        };
        let handler = Arc::clone(&self.handler);
        let outcome = match tokio::spawn(async move { handler.handle(delivery).await }).await {
            Ok(Ok(())) => return DeliveryOutcome::Ack,
            Ok(Err(e)) => e,
            Err(join) if join.is_panic() => {
                HandlerError::Panicked(panic_message(join.into_panic()))
            }
            Err(join) => HandlerError::Failed(join.to_string()),
        };
        self.observer.on_error(&BridgeError::Handler {
            schema,
            source: outcome,
        });
        DeliveryOutcome::Nack
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
