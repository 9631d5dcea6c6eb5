//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML settings file from the
//! platform config directory and converts it into the orchestrator's runtime
//! configuration.  A missing file yields defaults (first run).

pub mod config;
