//! Observability utilities.
//!
//! Events from production runs go through `tracing`; this module installs
//! the subscriber that prints them.

mod logging;

pub use logging::{init_from_env, init_logging, parse_level, LoggingConfig};
