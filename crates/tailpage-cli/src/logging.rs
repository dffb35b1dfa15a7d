//! Diagnostics for the command-line front end.
//!
//! Stdout carries the rendered document, so log lines go to stderr, or to a
//! file with `--log-file`. `RUST_LOG` overrides the default level.

use std::{fs::File, io, path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init(log_file: Option<&Path>) -> Result<()> {
    let default_level = if log_file.is_some() { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .try_init()?;
        }
        None => registry.with(fmt::layer().with_writer(io::stderr)).try_init()?,
    }
    Ok(())
}
