// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing lives in [`args`]; [`commands`] wires each subcommand to
//! the library with a console (and optional file) log sink.

/// CLI arguments.
pub mod args;

/// Subcommand implementations.
pub mod commands;

pub use commands::run;
