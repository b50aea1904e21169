//! Structured logging setup.
//!
//! Logs go to stderr so the JSON report on stdout stays machine-readable.

use anyhow::Context;
use clap::ValueEnum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line logs
    Pretty,
    /// One JSON object per event
    Json,
}

/// Initialize structured logging
///
/// `RUST_LOG` overrides `default_filter` when set.
pub fn init_logging(format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(json_layer))
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(fmt_layer))
        }
    }
    .context("Failed to set global default subscriber")?;

    info!(
        log_format = ?format,
        filter = default_filter,
        "Logging initialized"
    );
    Ok(())
}
