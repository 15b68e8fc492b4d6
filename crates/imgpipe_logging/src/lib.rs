//! Shared logging utilities for imgpipe binaries.
//!
//! Logs always go to stderr: stdout carries the stage result document that
//! the orchestrator (or a shell pipeline) consumes.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "imgpipe=info,imgpipe_stages=info";
const VERBOSE_LOG_FILTER: &str = "imgpipe=debug,imgpipe_stages=debug";

/// Logging configuration shared by imgpipe binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Emit one JSON object per event instead of human readable lines.
    pub json: bool,
}

/// Initialize tracing with stderr output.
///
/// `RUST_LOG` takes precedence over the built-in filter.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.verbose)));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .try_init()
    };
    installed.with_context(|| format!("Failed to initialize logging for {}", config.app_name))?;

    tracing::debug!(app = config.app_name, json = config.json, "logging initialized");
    Ok(())
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert!(default_filter(false).contains("=info"));
        assert!(default_filter(true).contains("=debug"));
        assert!(!default_filter(true).contains("=info"));
    }

    #[test]
    fn default_filters_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
    }
}
