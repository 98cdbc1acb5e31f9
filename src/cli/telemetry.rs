//! Tracing subscriber setup.
//!
//! Verbosity flags on the CLI set a base level; `RUST_LOG` overrides it when
//! present so operators can still target individual modules.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = level.map_or("error", |level| match level {
                tracing::Level::WARN => "warn",
                tracing::Level::INFO => "info",
                tracing::Level::DEBUG => "debug",
                tracing::Level::TRACE => "trace",
                tracing::Level::ERROR => "error",
            });
            EnvFilter::new(directive)
        }
    };

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
