//! CLI module
//!
//! Command-line interface for calling the API through the client.
//!
//! # Commands
//!
//! - `request` - Send one request and print the response body
//! - `validate` - Load and validate the client configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
