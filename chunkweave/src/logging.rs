//! Subscriber setup for the command-line front end.
//!
//! The library only emits `tracing` events; this is the one place a
//! subscriber gets installed.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, Registry};

/// Filter used when `RUST_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "chunkweave=debug,info"
    } else {
        "chunkweave=info,warn"
    }
}

/// Install a stderr fmt subscriber, plus an append-only ANSI-free file sink
/// when `log_file` is given.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let env_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
    };

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create log directory: {}", parent.display())
                    })?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            let subscriber = Registry::default()
                .with(env_filter())
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false));
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        None => {
            let subscriber = Registry::default()
                .with(env_filter())
                .with(fmt::layer().with_writer(std::io::stderr));
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }

    Ok(())
}
