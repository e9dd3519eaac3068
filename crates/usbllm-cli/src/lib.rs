//! Command-line entry point for the usb-llm launcher.
//!
//! `main.rs` is the composition root; this library holds the parser and the
//! command handlers so they can be tested without a binary.
#![deny(unsafe_code)]

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use parser::Cli;
