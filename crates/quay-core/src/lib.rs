//! # quay-core — Foundational Types for Quay
//!
//! Quay bridges HTTP requests and queue consumers to a message transport.
//! Every payload is described by an Avro schema, and every buffer on the wire
//! carries its own writer schema so that consumers built against a different
//! but compatible schema version can still read it.
//!
//! This crate holds the primitives every other `quay-*` crate shares:
//!
//! - [`SchemaName`] — a fully-qualified schema name split into namespace and
//!   short name. Route paths and default event names derive from it.
//! - [`Violation`] / [`ValidationViolations`] — structured validation
//!   failures, one entry per offending field path.
//! - [`ErrorKind`] — the error taxonomy. Every error type in the workspace
//!   maps onto exactly one kind, which the HTTP layer and the observer side
//!   channel use for codes and log fields.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `quay-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod name;
pub mod violation;

pub use error::{ErrorKind, NameError};
pub use name::SchemaName;
pub use violation::{ValidationError, ValidationViolations, Violation};
