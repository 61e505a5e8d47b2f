//! # quay-envelope — Self-Describing Message Envelope
//!
//! Every buffer Quay hands to a transport is an [`Envelope`]: one fixed
//! outer Avro record with four fields, in this order:
//!
//! | Field           | Type     | Content                                      |
//! |-----------------|----------|----------------------------------------------|
//! | `contextSchema` | `string` | schema document inferred from the context    |
//! | `contextBuffer` | `bytes`  | context encoded with that schema             |
//! | `messageSchema` | `string` | the writer's message schema document         |
//! | `messageBuffer` | `bytes`  | message encoded with the writer's schema     |
//!
//! The framing is fixed and byte-compatible across independently built
//! producers and consumers.
//!
//! ## Schema Resolution
//!
//! [`EnvelopeCodec::decode`] never trusts the reader's schema to describe
//! the bytes. It compiles the embedded writer document on its own, then
//! resolves the writer's value against the reader's schema: fields the
//! reader does not declare are dropped, and fields the writer never wrote
//! take the reader's default. A missing field with no default is a
//! [`EnvelopeError::Decode`].
//!
//! The context is decoded with its embedded schema as-is. It is free-form
//! and never evolved against a reader schema.
//!
//! ## Crate Policy
//!
//! - Encode and decode are pure apart from the writer-schema cache, which
//!   only memoizes document parsing.
//! - No `unwrap()` outside tests.

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{Decoded, EnvelopeCodec, EnvelopeContent, DEFAULT_WRITER_CACHE_CAPACITY};
pub use envelope::{envelope_schema, Envelope, ENVELOPE_SCHEMA};
pub use error::EnvelopeError;
