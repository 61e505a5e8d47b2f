//! # Observer Side Channel
//!
//! The bridges report every success and every failure here, in addition to
//! returning publish errors to the caller. Handler failures are reported
//! only here: they never reach the transport.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::BridgeError;

/// Informational event emitted by the bridges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A buffer was handed to the transport and accepted.
    Published {
        schema: String,
        event_name: String,
        bytes: usize,
    },
    /// A handler was registered with the transport.
    Subscribed { schema: String, event_name: String },
    /// A buffer decoded and is about to reach its handler.
    Received { schema: String, event_name: String },
}

/// Receives bridge events and errors.
pub trait BridgeObserver: Send + Sync {
    fn on_info(&self, event: &BridgeEvent) {
        let _ = event;
    }

    fn on_error(&self, error: &BridgeError) {
        let _ = error;
    }
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BridgeObserver for TracingObserver {
    fn on_info(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::Published {
                schema,
                event_name,
                bytes,
            } => tracing::info!(%schema, event = %event_name, bytes, "published"),
            BridgeEvent::Subscribed { schema, event_name } => {
                tracing::info!(%schema, event = %event_name, "subscribed")
            }
            BridgeEvent::Received { schema, event_name } => {
                tracing::info!(%schema, event = %event_name, "received {schema} event")
            }
        }
    }

    fn on_error(&self, error: &BridgeError) {
        tracing::error!(kind = %error.kind(), error = %error, "bridge failure");
    }
}

/// Observer that keeps everything it sees. Cloning shares the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<BridgeEvent>>>,
    errors: Arc<Mutex<Vec<BridgeError>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<BridgeError> {
        self.errors.lock().clone()
    }
}

impl BridgeObserver for RecordingObserver {
    fn on_info(&self, event: &BridgeEvent) {
        self.events.lock().push(event.clone());
    }

    fn on_error(&self, error: &BridgeError) {
        self.errors.lock().push(error.clone());
    }
}

impl<O: BridgeObserver + ?Sized> BridgeObserver for Arc<O> {
    fn on_info(&self, event: &BridgeEvent) {
        (**self).on_info(event);
    }

    fn on_error(&self, error: &BridgeError) {
        (**self).on_error(error);
    }
}
