//! # Publish Bridge
//!
//! Turns `(schema, message, context)` into a transport publish:
//!
//! 1. Normalize the schema unless it is already compiled.
//! 2. Validate the message, collecting every violation.
//! 3. Resolve the event name: the override, else the full schema name.
//! 4. Encode the envelope.
//! 5. Call `transport.publish` and return its result unchanged.
//!
//! Steps 1-4 are [`PublishBridge::prepare`] and step 5 is
//! [`PublishBridge::dispatch`], so a caller can answer its own client once
//! the message is known to be valid and leave the transport call running.
//! Every failure is returned to the caller *and* reported to the observer.

use std::collections::BTreeMap;
use std::sync::Arc;

use quay_envelope::EnvelopeCodec;
use quay_schema::{CompiledSchema, SchemaInput};
use serde_json::{json, Value};

use crate::error::BridgeError;
use crate::observer::{BridgeEvent, BridgeObserver};
use crate::transport::{PublishOptions, Transport};

/// Caller overrides for one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOverrides {
    /// Replaces the default event name (the full schema name).
    pub event_name: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl PublishOverrides {
    pub fn event_name(name: impl Into<String>) -> Self {
        Self {
            event_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// A validated, encoded message ready for the transport.
#[derive(Debug, Clone)]
pub struct PreparedPublish {
    pub buffer: Vec<u8>,
    pub options: PublishOptions,
}

impl PreparedPublish {
    pub fn event_name(&self) -> &str {
        &self.options.event_name
    }
}

/// Validates, envelopes and publishes messages.
#[derive(Clone)]
pub struct PublishBridge {
    transport: Arc<dyn Transport>,
    codec: EnvelopeCodec,
    observer: Arc<dyn BridgeObserver>,
}

impl PublishBridge {
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

    /// Normalize `schema` and publish.
    pub async fn publish(
        &self,
        schema: impl Into<SchemaInput>,
        message: Value,
        context: Option<Value>,
        overrides: PublishOverrides,
    ) -> Result<Value, BridgeError> {
        let schema = CompiledSchema::new(schema).map_err(|e| self.report(e.into()))?;
        self.publish_compiled(&schema, message, context, overrides)
            .await
    }

    /// Publish with an already-compiled schema.
    pub async fn publish_compiled(
        &self,
        schema: &CompiledSchema,
        message: Value,
        context: Option<Value>,
        overrides: PublishOverrides,
    ) -> Result<Value, BridgeError> {
        let prepared = self.prepare(schema, message, context, overrides)?;
        self.dispatch(prepared).await
    }

    /// Validate and encode without touching the transport.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Validation`] listing every violation, or
    /// [`BridgeError::Envelope`] when encoding fails.
    pub fn prepare(
        &self,
        schema: &CompiledSchema,
        message: Value,
        context: Option<Value>,
        overrides: PublishOverrides,
    ) -> Result<PreparedPublish, BridgeError> {
        let value = schema
            .validate(&message)
            .map_err(|e| self.report(e.into()))?;

        let event_name = overrides
            .event_name
            .unwrap_or_else(|| schema.full_name());
        let context = context.unwrap_or_else(|| json!({}));
        let buffer = self
            .codec
            .encode_conformed(schema, value, Some(&context))
            .map_err(|e| self.report(e.into()))?;

        Ok(PreparedPublish {
            buffer,
            options: PublishOptions {
                event_name,
                message,
                context,
                schema: schema.clone(),
                attributes: overrides.attributes,
            },
        })
    }

    /// Hand a prepared message to the transport.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Publish`] carrying the transport's error.
    pub async fn dispatch(&self, prepared: PreparedPublish) -> Result<Value, BridgeError> {
        let PreparedPublish { buffer, options } = prepared;
        let event_name = options.event_name.clone();
        let schema = options.schema.full_name();
        let bytes = buffer.len();

        match self.transport.publish(buffer, options).await {
            Ok(result) => {
                self.observer.on_info(&BridgeEvent::Published {
                    schema,
                    event_name,
                    bytes,
                });
                Ok(result)
            }
            Err(source) => Err(self.report(BridgeError::Publish { event_name, source })),
        }
    }

    fn report(&self, error: BridgeError) -> BridgeError {
        self.observer.on_error(&error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::mock::MockTransport;
    use crate::observer::RecordingObserver;
    use quay_core::ErrorKind;

    fn bridge() -> (PublishBridge, Arc<MockTransport>, RecordingObserver) {
        let transport = Arc::new(MockTransport::new());
        let observer = RecordingObserver::new();
        let bridge = PublishBridge::new(
            transport.clone(),
            EnvelopeCodec::new(),
            Arc::new(observer.clone()),
        );
        (bridge, transport, observer)
    }

    fn test_schema() -> Value {
        json!({
            "type": "record", "name": "test", "namespace": "api",
            "fields": [{"name": "id", "type": "string"}]
        })
    }

    #[tokio::test]
    async fn default_event_name_is_full_schema_name() {
        let (bridge, transport, observer) = bridge();
        let result = bridge
            .publish(test_schema(), json!({"id": "abc"}), None, PublishOverrides::default())
            .await
            .unwrap();
        assert_eq!(result, json!({"eventName": "api.test", "accepted": true}));

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].options.event_name, "api.test");
        assert_eq!(published[0].options.message, json!({"id": "abc"}));
        assert_eq!(published[0].options.context, json!({}));
        assert_eq!(published[0].options.schema.full_name(), "api.test");
        assert!(matches!(
            observer.events().as_slice(),
            [BridgeEvent::Published { event_name, .. }] if event_name == "api.test"
        ));
    }

    #[tokio::test]
    async fn event_name_override_wins() {
        let (bridge, transport, _) = bridge();
        bridge
            .publish(
                test_schema(),
                json!({"id": "abc"}),
                Some(json!({"identity": "alice"})),
                PublishOverrides::event_name("custom.route"),
            )
            .await
            .unwrap();
        let published = transport.published();
        assert_eq!(published[0].options.event_name, "custom.route");
        assert_eq!(published[0].options.context, json!({"identity": "alice"}));
    }

    #[tokio::test]
    async fn invalid_message_never_reaches_transport() {
        let (bridge, transport, observer) = bridge();
        let schema = json!({
            "type": "record", "name": "person", "namespace": "api",
            "fields": [
                {"name": "id", "type": "string"},
                {"name": "age", "type": "int"}
            ]
        });
        let err = bridge
            .publish(schema, json!({"id": 1, "age": "x"}), None, PublishOverrides::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.violations().map(|v| v.len()), Some(2));
        assert!(transport.published().is_empty());
        assert_eq!(observer.errors(), vec![err]);
    }

    #[tokio::test]
    async fn schema_errors_reported() {
        let (bridge, _, observer) = bridge();
        let err = bridge
            .publish("{nope", json!({}), None, PublishOverrides::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaCompile);
        assert_eq!(observer.errors().len(), 1);
    }

    #[tokio::test]
    async fn transport_rejection_wrapped_with_cause() {
        let (bridge, transport, observer) = bridge();
        transport.reject_publishes("queue full");
        let err = bridge
            .publish(test_schema(), json!({"id": "abc"}), None, PublishOverrides::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Publish {
                event_name: "api.test".into(),
                source: TransportError::Rejected("queue full".into()),
            }
        );
        assert!(observer.events().is_empty());
        assert_eq!(observer.errors().len(), 1);

        transport.accept_publishes();
        bridge
            .publish(test_schema(), json!({"id": "abc"}), None, PublishOverrides::default())
            .await
            .unwrap();
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test]
    async fn prepare_does_not_touch_transport() {
        let (bridge, transport, _) = bridge();
        let schema = CompiledSchema::new(test_schema()).unwrap();
        let prepared = bridge
            .prepare(&schema, json!({"id": "abc"}), None, PublishOverrides::default())
            .unwrap();
        assert_eq!(prepared.event_name(), "api.test");
        assert!(!prepared.buffer.is_empty());
        assert!(transport.published().is_empty());

        bridge.dispatch(prepared).await.unwrap();
        assert_eq!(transport.published().len(), 1);
    }

    #[test]
    fn prepared_buffer_matches_codec_encoding() {
        let (bridge, _, _) = bridge();
        let schema = CompiledSchema::new(test_schema()).unwrap();
        let context = json!({"identity": "alice"});
        let prepared = bridge
            .prepare(
                &schema,
                json!({"id": "abc"}),
                Some(context.clone()),
                PublishOverrides::default(),
            )
            .unwrap();

        let content = quay_envelope::EnvelopeContent::new(json!({"id": "abc"})).with_context(context);
        let expected = EnvelopeCodec::new().encode(&schema, &content).unwrap();
        assert_eq!(prepared.buffer, expected);
    }
}
