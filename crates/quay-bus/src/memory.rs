//! # In-Memory Transport
//!
//! Loopback transport on `tokio::sync::broadcast`. Suitable for a single
//! process (tests, the CLI's `serve`, embedding); distributed deployments
//! plug in a broker-backed [`Transport`] instead.
//!
//! Each subscription owns one worker task that filters the broadcast by
//! event name. With `prefetch <= 1` deliveries run strictly one after
//! another; with `prefetch > 1` up to `prefetch` handler invocations overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{
    BufferHandler, DeliveryOutcome, PublishOptions, SubscribeOptions, Transport,
};

/// Default broadcast capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Frame {
    event_name: Arc<str>,
    buffer: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    acknowledged: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Ack => self.acknowledged.fetch_add(1, Ordering::Relaxed),
            DeliveryOutcome::Nack => self.rejected.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Broadcast-backed loopback transport.
pub struct InMemoryTransport {
    sender: Mutex<Option<broadcast::Sender<Frame>>>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A transport whose broadcast channel buffers `capacity` frames.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sender: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Buffers accepted by `publish`.
    pub fn published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    /// Deliveries a handler acknowledged.
    pub fn acknowledged(&self) -> u64 {
        self.counters.acknowledged.load(Ordering::Relaxed)
    }

    /// Deliveries a handler rejected.
    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    fn sender(&self) -> Result<broadcast::Sender<Frame>, TransportError> {
        self.sender
            .lock()
            .as_ref()
            .cloned()
            .ok_or(TransportError::NotConnected)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut sender = self.sender.lock();
        if sender.is_none() {
            let (tx, _) = broadcast::channel(self.capacity);
            *sender = Some(tx);
            debug!(capacity = self.capacity, "in-memory transport connected");
        }
        Ok(())
    }

    async fn publish(
        &self,
        buffer: Vec<u8>,
        options: PublishOptions,
    ) -> Result<Value, TransportError> {
        let sender = self.sender()?;
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        let frame = Frame {
            event_name: Arc::from(options.event_name.as_str()),
            buffer: Arc::from(buffer),
        };
        let receivers = match sender.send(frame) {
            Ok(receivers) => receivers,
            Err(_) => {
                warn!(event = %options.event_name, "no subscribers, buffer dropped");
                0
            }
        };
        Ok(json!({"eventName": options.event_name, "receivers": receivers}))
    }

    async fn subscribe(
        &self,
        handler: BufferHandler,
        options: SubscribeOptions,
    ) -> Result<(), TransportError> {
        let receiver = self.sender()?.subscribe();
        let counters = Arc::clone(&self.counters);
        debug!(
            event = %options.event_name,
            prefetch = options.prefetch,
            "in-memory subscription registered"
        );
        tokio::spawn(run_worker(receiver, handler, options, counters));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender lets every worker drain and stop.
        if self.sender.lock().take().is_some() {
            debug!("in-memory transport closed");
        }
        Ok(())
    }
}

async fn run_worker(
    mut receiver: broadcast::Receiver<Frame>,
    handler: BufferHandler,
    options: SubscribeOptions,
    counters: Arc<Counters>,
) {
    let limit = Arc::new(Semaphore::new(options.prefetch.max(1)));
    loop {
        let frame = match receiver.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(event = %options.event_name, skipped, "subscriber lagged, buffers dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if *frame.event_name != *options.event_name {
            continue;
        }

        if options.prefetch <= 1 {
            let outcome = handler(frame.buffer.to_vec()).await;
            counters.record(outcome);
            continue;
        }

        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            break;
        };
        let handler = Arc::clone(&handler);
        let counters = Arc::clone(&counters);
        tokio::spawn(async move {
            let outcome = handler(frame.buffer.to_vec()).await;
            counters.record(outcome);
            drop(permit);
        });
    }
    debug!(event = %options.event_name, "in-memory subscription stopped");
}
