//! # Mock Transport
//!
//! Records publishes and subscriptions and lets the caller drive inbound
//! deliveries by hand. Used by the bridge and HTTP tests, and by anyone
//! embedding Quay who wants to assert on what would have been sent.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::transport::{
    BufferHandler, DeliveryOutcome, PublishOptions, SubscribeOptions, Transport,
};

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct PublishedBuffer {
    pub buffer: Vec<u8>,
    pub options: PublishOptions,
}

/// Transport double with scripted behaviour.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    published: Mutex<Vec<PublishedBuffer>>,
    subscriptions: Mutex<Vec<(SubscribeOptions, BufferHandler)>>,
    reject_with: Mutex<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail with
    /// [`TransportError::Rejected`].
    pub fn reject_publishes(&self, reason: impl Into<String>) {
        *self.reject_with.lock() = Some(reason.into());
    }

    /// Accept publishes again.
    pub fn accept_publishes(&self) {
        *self.reject_with.lock() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every publish accepted so far, oldest first.
    pub fn published(&self) -> Vec<PublishedBuffer> {
        self.published.lock().clone()
    }

    /// Options of every registered subscription.
    pub fn subscriptions(&self) -> Vec<SubscribeOptions> {
        self.subscriptions
            .lock()
            .iter()
            .map(|(options, _)| options.clone())
            .collect()
    }

    /// Hand `buffer` to every handler subscribed to `event_name`, one after
    /// another, and collect their outcomes.
    pub async fn deliver(&self, event_name: &str, buffer: &[u8]) -> Vec<DeliveryOutcome> {
        let handlers: Vec<BufferHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(options, _)| options.event_name == event_name)
            .map(|(_, handler)| handler.clone())
            .collect();
        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            outcomes.push(handler(buffer.to_vec()).await);
        }
        outcomes
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        buffer: Vec<u8>,
        options: PublishOptions,
    ) -> Result<Value, TransportError> {
        if let Some(reason) = self.reject_with.lock().clone() {
            return Err(TransportError::Rejected(reason));
        }
        let result = json!({"eventName": options.event_name, "accepted": true});
        self.published
            .lock()
            .push(PublishedBuffer { buffer, options });
        Ok(result)
    }

    async fn subscribe(
        &self,
        handler: BufferHandler,
        options: SubscribeOptions,
    ) -> Result<(), TransportError> {
        self.subscriptions.lock().push((options, handler));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
