//! Logging configuration for safedrive.
//!
//! This module provides initialization and configuration for the tracing-based
//! logging system used throughout safedrive.
//!
//! One line per HTTP request is logged under [`REQUEST_TARGET`], so access
//! logging can be tuned separately, e.g.
//! `RUST_LOG=safedrive=info,safedrive::request=off`.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Target of the per-request access log lines.
pub const REQUEST_TARGET: &str = "safedrive::request";

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Default filter directives for `verbosity`.
///
/// Quiet mode also drops access lines. From debug up, axum's extractor
/// rejections (why a payload was refused) are shown as well.
#[must_use]
pub fn default_filter(verbosity: Verbosity) -> String {
    let level = verbosity.to_level_filter();
    match verbosity {
        Verbosity::Quiet => format!("safedrive={level},{REQUEST_TARGET}=off"),
        Verbosity::Normal => format!("safedrive={level}"),
        Verbosity::Verbose | Verbosity::Trace => {
            format!("safedrive={level},axum::rejection=trace")
        }
    }
}

/// Initialize the logging system.
///
/// This should be called once at application startup. The logging level can be
/// controlled via:
/// 1. The `verbosity` parameter
/// 2. The `RUST_LOG` environment variable (takes precedence)
///
/// # Examples
///
/// ```no_run
/// use safedrive::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    // Allow RUST_LOG to override
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore the error if a subscriber is already installed
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
///
/// Only warnings and errors are shown, written through the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
