//! Command-line front end for the loadq loaders.
//!
//! `main.rs` is the composition root; everything it wires lives here so the
//! parsing, configuration and output naming can be tested.

#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary only
use tracing_subscriber as _;

pub mod config;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod progress;

pub use config::CliConfig;
pub use error::CliError;
pub use parser::{Cli, Commands};
