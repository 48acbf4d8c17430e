//! Structured logging setup.
//!
//! Initialized once per process from `RUST_LOG` (default `info`); `--verbose`
//! raises the default to `debug` without requiring `RUST_LOG` to be set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber. `verbose` only changes the
/// *default* filter level; an explicit `RUST_LOG` always wins.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
    Ok(())
}
