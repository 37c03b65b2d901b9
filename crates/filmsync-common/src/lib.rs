//! Filmsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared functionality for the filmsync workspace members.
//!
//! Currently this is the logging bootstrap: every filmsync binary
//! initializes `tracing` through [`logging::init_logging`] so log level,
//! format, and output destination are configured the same way everywhere.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
