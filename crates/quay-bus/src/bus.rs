//! The [`Bus`] facade: one transport, one codec and one observer shared by
//! a publish bridge and a subscribe bridge.

use std::sync::Arc;

use quay_envelope::EnvelopeCodec;
use quay_schema::{CompiledSchema, SchemaInput};
use serde_json::Value;

use crate::error::{BridgeError, TransportError};
use crate::observer::{BridgeObserver, TracingObserver};
use crate::publish::{PreparedPublish, PublishBridge, PublishOverrides};
use crate::subscribe::{MessageHandler, SubscribeBridge, SubscribeOverrides};
use crate::transport::Transport;

#[derive(Clone)]
pub struct Bus {
    transport: Arc<dyn Transport>,
    publisher: PublishBridge,
    subscriber: SubscribeBridge,
}

impl Bus {
    /// A bus reporting through [`TracingObserver`].
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_observer(transport, Arc::new(TracingObserver))
    }

    pub fn with_observer(transport: Arc<dyn Transport>, observer: Arc<dyn BridgeObserver>) -> Self {
        let codec = EnvelopeCodec::new();
        Self {
            publisher: PublishBridge::new(
                Arc::clone(&transport),
                codec.clone(),
                Arc::clone(&observer),
            ),
            subscriber: SubscribeBridge::new(Arc::clone(&transport), codec, observer),
            transport,
        }
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect().await
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.transport.close().await
    }

    pub fn publisher(&self) -> &PublishBridge {
        &self.publisher
    }

    pub fn subscriber(&self) -> &SubscribeBridge {
        &self.subscriber
    }

    /// See [`PublishBridge::publish`].
    pub async fn publish(
        &self,
        schema: impl Into<SchemaInput>,
        message: Value,
        context: Option<Value>,
        overrides: PublishOverrides,
    ) -> Result<Value, BridgeError> {
        self.publisher
            .publish(schema, message, context, overrides)
            .await
    }

    /// See [`PublishBridge::prepare`].
    pub fn prepare(
        &self,
        schema: &CompiledSchema,
        message: Value,
        context: Option<Value>,
        overrides: PublishOverrides,
    ) -> Result<PreparedPublish, BridgeError> {
        self.publisher.prepare(schema, message, context, overrides)
    }

    /// See [`PublishBridge::dispatch`].
    pub async fn dispatch(&self, prepared: PreparedPublish) -> Result<Value, BridgeError> {
        self.publisher.dispatch(prepared).await
    }

    /// See [`SubscribeBridge::handle`].
    pub async fn subscribe(
        &self,
        schema: impl Into<SchemaInput>,
        handler: impl MessageHandler,
        overrides: SubscribeOverrides,
    ) -> Result<(), BridgeError> {
        self.subscriber.handle(schema, handler, overrides).await
    }
}
