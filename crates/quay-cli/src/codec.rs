//! # Envelope Subcommands
//!
//! `encode`, `decode` and `check` run the envelope codec against schema
//! files so producers and consumers can be exercised without a broker.
//!
//! Exit codes: 0 on success, 1 when the message does not conform, 2 on
//! operational errors (reported by `main`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use quay_envelope::{Decoded, EnvelopeCodec, EnvelopeContent, EnvelopeError};
use quay_schema::CompiledSchema;
use serde_json::Value;

use crate::{json_arg, load_schema};

/// Arguments for `quay encode`.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Avro schema file (JSON, or YAML by extension).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Message as JSON text, or @FILE.
    #[arg(long, value_name = "JSON")]
    pub message: String,

    /// Context as JSON text, or @FILE. Defaults to `{}`.
    #[arg(long, value_name = "JSON")]
    pub context: Option<String>,

    /// Where to write the envelope bytes.
    #[arg(long, short, value_name = "FILE")]
    pub output: PathBuf,
}

/// Arguments for `quay decode`.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Reader schema file.
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Envelope file to decode.
    #[arg(long, short, value_name = "FILE")]
    pub input: PathBuf,
}

/// Arguments for `quay check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Message as JSON text, or @FILE.
    #[arg(long, value_name = "JSON")]
    pub message: String,
}

pub fn run_encode(args: &EncodeArgs) -> Result<u8> {
    let schema = load_schema(&args.schema)?;
    let message = json_arg(&args.message)?;
    let context = args.context.as_deref().map(json_arg).transpose()?;

    match encode_to_file(&schema, message, context, &args.output) {
        Ok(bytes) => {
            println!(
                "wrote {bytes} bytes ({}) to {}",
                schema.full_name(),
                args.output.display()
            );
            Ok(0)
        }
        Err(EncodeFailure::Invalid(err)) => {
            print_violations(&err);
            Ok(1)
        }
        Err(EncodeFailure::Other(err)) => Err(err),
    }
}

pub fn run_decode(args: &DecodeArgs) -> Result<u8> {
    let schema = load_schema(&args.schema)?;
    let decoded = decode_file(&schema, &args.input)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(0)
}

pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let schema = load_schema(&args.schema)?;
    let message = json_arg(&args.message)?;

    let violations = schema.violations(&message);
    if violations.is_empty() {
        println!("OK: message conforms to {}", schema.full_name());
        return Ok(0);
    }
    println!(
        "{} violation(s) against {}:",
        violations.len(),
        schema.full_name()
    );
    for v in violations.iter() {
        println!("  FAIL: {v} (expected {})", v.expected);
    }
    Ok(1)
}

/// Why [`encode_to_file`] failed.
#[derive(Debug)]
pub enum EncodeFailure {
    /// The message or context does not conform.
    Invalid(EnvelopeError),
    Other(anyhow::Error),
}

/// Encode one envelope and write it to `output`. Returns the byte count.
pub fn encode_to_file(
    schema: &CompiledSchema,
    message: Value,
    context: Option<Value>,
    output: &Path,
) -> Result<usize, EncodeFailure> {
    let mut content = EnvelopeContent::new(message);
    if let Some(context) = context {
        content = content.with_context(context);
    }
    let bytes = EnvelopeCodec::new()
        .encode(schema, &content)
        .map_err(|e| match e {
            EnvelopeError::Validation(_) => EncodeFailure::Invalid(e),
            other => EncodeFailure::Other(other.into()),
        })?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))
        .map_err(EncodeFailure::Other)?;
    tracing::debug!(schema = %schema.full_name(), bytes = bytes.len(), "envelope written");
    Ok(bytes.len())
}

/// Read and decode the envelope at `input` against the reader `schema`.
pub fn decode_file(schema: &CompiledSchema, input: &Path) -> Result<Decoded> {
    let bytes =
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    EnvelopeCodec::new()
        .decode(schema, &bytes)
        .with_context(|| format!("failed to decode {}", input.display()))
}

fn print_violations(err: &EnvelopeError) {
    match err {
        EnvelopeError::Validation(validation) => {
            println!(
                "{} violation(s) against {}:",
                validation.violations.len(),
                validation.schema
            );
            for v in validation.violations.iter() {
                println!("  FAIL: {v}");
            }
        }
        other => println!("FAIL: {other}"),
    }
}
