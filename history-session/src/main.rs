//! # Canvas History CLI
//!
//! Inspects, validates and lists saved history bundles.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use history_session::cli::{self, CliArgs};
use history_session::SessionConfig;

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,history_session=debug,history_core=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
/// Logs go to stderr so command output stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,history_session=debug,history_core=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = SessionConfig::from_env();
    tracing::debug!(?args, "Starting canvas-history");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::run(&args, &config, &mut out)
}
