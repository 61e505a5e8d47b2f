//! # quay CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quay_cli::codec::{run_check, run_decode, run_encode, CheckArgs, DecodeArgs, EncodeArgs};
use quay_cli::serve::{run_serve, ServeArgs};

/// Quay: schema-validated message envelopes over HTTP and message buses.
#[derive(Parser, Debug)]
#[command(name = "quay", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Ignored when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines. Also enabled by QUAY_LOG_JSON=1.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve routes from a manifest over the in-memory transport.
    Serve(ServeArgs),

    /// Validate a message and write its envelope to a file.
    Encode(EncodeArgs),

    /// Decode an envelope file against a reader schema.
    Decode(DecodeArgs),

    /// Check a message against a schema and list every violation.
    Check(CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json || log_json_from_env());

    tracing::debug!("quay CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Serve(args) => run_serve(&args),
        Commands::Encode(args) => run_encode(&args),
        Commands::Decode(args) => run_decode(&args),
        Commands::Check(args) => run_check(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn log_json_from_env() -> bool {
    std::env::var("QUAY_LOG_JSON")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
