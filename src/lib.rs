//! `qatrack` - QA tracker library
//!
//! This crate provides the `qt` CLI on top of `qatrack-core`: a SQLite-backed
//! store, layered configuration, logging and output formatting.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`cli`] - Command-line interface using clap
//! - [`storage`] - `SQLite` implementation of the core store traits
//! - [`config`] - Configuration management
//! - [`format`] - Output formatting (text, JSON)
//! - [`logging`] - Tracing subscriber setup

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod format;
pub mod logging;
pub mod storage;

pub use qatrack_core::{Result, TrackerError};

/// Run the CLI application.
///
/// This is the main entry point called from `main()`.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
