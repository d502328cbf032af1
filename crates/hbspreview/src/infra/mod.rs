//! Infrastructure adapters for config, logging, file watching, and discovery.

pub mod config;
pub mod discovery;
pub mod logging;
pub mod watch;
