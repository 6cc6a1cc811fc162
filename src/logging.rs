//! Tracing setup for the `qt` binary.
//!
//! Diagnostics always go to stderr so `--json` output on stdout stays clean.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter directive for the given verbosity flags.
///
/// `-q` wins over `-v`; with neither, only warnings are shown.
#[must_use]
pub fn level_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence when no verbosity flag was given.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> anyhow::Result<()> {
    let directive = level_directive(verbose, quiet);
    let filter = if verbose == 0 && !quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    } else {
        EnvFilter::new(directive)
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}
