//! # Discord bridge server
//!
//! Bootstrap and event routing for the Matrix <-> Discord appservice.
//!
//! The [`Orchestrator`] brings the store, the appservice transport and the
//! bridge logic online in a fixed order (see [`Stage`]), installs the
//! [`EventRouter`] and hands back a [`Running`] bridge.
//!
//! ## Example
//! ```no_run
//! use mxd_kernel::config::load_config;
//! use mxd_kernel::registration::load_registration;
//! use mxd_server::{BridgeContext, DiscordComponents, Orchestrator};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config("config.yaml", None)?;
//! let registration = load_registration("discord-registration.yaml")?;
//!
//! let running = Orchestrator::new(DiscordComponents, Arc::new(BridgeContext::new()))
//!     .run(config, registration)
//!     .await?;
//! mxd_server::shutdown_signal().await?;
//! running.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod cli;
mod context;
mod lifecycle;
mod orchestrator;
pub mod router;

pub use context::BridgeContext;
pub use lifecycle::{Lifecycle, LifecycleState, Stage, StartupError, StartupErrorExt};
pub use orchestrator::{Components, DiscordComponents, Orchestrator, Running};
pub use router::{DispatchError, EventRouter};

use anyhow::{Context, Result};
use mxd_logger::Logger;
use tokio::signal;

/// Console-only logger for paths that run before (or without) a valid config.
///
/// A setup failure is reported on stderr and the caller carries on unlogged.
#[must_use]
pub fn fallback_logger(name: &str) -> Option<Logger> {
    match Logger::console_fallback(name) {
        Ok(logger) => Some(logger),
        Err(e) => {
            eprintln!("{name}: console logger unavailable: {e}");
            None
        },
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
///
/// # Errors
/// Returns an error if a signal handler cannot be installed.
pub async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}
