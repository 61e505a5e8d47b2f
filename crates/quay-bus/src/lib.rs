//! # quay-bus — Transport Seam & Publish/Subscribe Bridges
//!
//! Quay does not deliver messages itself. It hands envelope buffers to a
//! [`Transport`] (`connect`, `publish`, `subscribe`, `close`) and owns only
//! the logic on either side of that call:
//!
//! - [`PublishBridge`] — validates a message against its schema (every
//!   violation, not just the first), encodes the envelope and publishes it
//!   under the full schema name unless overridden. Transport failures come
//!   back as [`BridgeError::Publish`] carrying the original cause.
//! - [`SubscribeBridge`] — decodes each inbound buffer against the
//!   consumer's schema and invokes its [`MessageHandler`]. Decode failures,
//!   handler errors and handler panics are reported and contained; the
//!   transport only ever sees a [`DeliveryOutcome`].
//!
//! Both report through a [`BridgeObserver`] injected at construction. The
//! default [`TracingObserver`] emits structured `tracing` events.
//!
//! ## Transports
//!
//! - [`InMemoryTransport`] — `tokio::sync::broadcast` loopback.
//! - [`MockTransport`] — records publishes and delivers buffers on demand.
//!
//! ## Crate Policy
//!
//! - No network code. Broker-backed transports live with their callers.
//! - A handler failure never escapes the subscribe callback.

pub mod bus;
pub mod error;
pub mod memory;
pub mod mock;
pub mod observer;
pub mod publish;
pub mod subscribe;
pub mod transport;

pub use bus::Bus;
pub use error::{BridgeError, HandlerError, TransportError};
pub use memory::InMemoryTransport;
pub use mock::{MockTransport, PublishedBuffer};
pub use observer::{BridgeEvent, BridgeObserver, RecordingObserver, TracingObserver};
pub use publish::{PreparedPublish, PublishBridge, PublishOverrides};
pub use subscribe::{Delivery, MessageHandler, SubscribeBridge, SubscribeOverrides};
pub use transport::{
    BoxFuture, BufferHandler, DeliveryOutcome, PublishOptions, SubscribeOptions, Transport,
};
