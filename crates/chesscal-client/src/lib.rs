//! chesscal command-line interface.
//!
//! This crate provides the `chesscal` binary: it authenticates against Google
//! Calendar, inserts a test event and lists upcoming events.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
