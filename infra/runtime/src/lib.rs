//! # Runtime
//!
//! Tokio runtime profiles for the bridge.
//!
//! * **Service**: the long-running bridge process (appservice listener + event dispatch).
//! * **Compact**: one-shot commands such as registration generation.
//!
//! ## Example
//!
//! ```rust,ignore
//! #[mxd_runtime::main(service)]
//! async fn main() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

pub use anyhow::Result;
pub use mxd_derive::main;

use anyhow::anyhow;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const FALLBACK_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 256;
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Worker count from `TOKIO_WORKER_THREADS`, falling back to the available parallelism.
fn detect_worker_threads() -> usize {
    std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
        .unwrap_or_else(|| {
            available_parallelism().map(std::num::NonZero::get).unwrap_or(FALLBACK_WORKER_THREADS)
        })
}

/// Configuration for the Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detect_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: "mxd-worker".to_owned(),
            thread_keep_alive: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    /// Profile for the bridge service: every core, long keep-alive.
    #[must_use]
    pub fn service() -> Self {
        Self {
            thread_name: "mxd-service".to_owned(),
            thread_keep_alive: Duration::from_secs(300),
            ..Self::default()
        }
    }

    /// Profile for short-lived commands.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            worker_threads: (detect_worker_threads() / 2).max(1),
            thread_name: "mxd-compact".to_owned(),
            thread_keep_alive: Duration::from_secs(10),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    #[must_use]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    fn normalized(&self) -> Self {
        let thread_name = if self.thread_name.trim().is_empty() {
            "mxd-worker".to_owned()
        } else {
            self.thread_name.clone()
        };

        Self {
            worker_threads: self.worker_threads.clamp(1, MAX_WORKER_THREADS),
            stack_size: self.stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name,
            thread_keep_alive: self.thread_keep_alive,
        }
    }
}

/// Builds a multi-threaded runtime with every driver (I/O, time, signal) enabled.
///
/// # Errors
/// Returns an error if the OS refuses to create the worker threads.
pub fn build_runtime(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building tokio runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to initialize runtime: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_threads_are_clamped() {
        assert_eq!(RuntimeConfig::default().with_worker_threads(0).worker_threads, 1);
        assert_eq!(
            RuntimeConfig::default().with_worker_threads(10_000).worker_threads,
            MAX_WORKER_THREADS
        );
    }

    #[test]
    fn stack_size_is_clamped() {
        assert_eq!(RuntimeConfig::default().with_stack_size(100).stack_size, MIN_STACK_SIZE);
        assert_eq!(
            RuntimeConfig::default().with_stack_size(100 * 1024 * 1024).stack_size,
            MAX_STACK_SIZE
        );
    }

    #[test]
    fn compact_profile_uses_fewer_workers() {
        assert!(RuntimeConfig::compact().worker_threads <= RuntimeConfig::service().worker_threads);
    }

    #[test]
    fn runtime_builds_and_runs() {
        let rt = build_runtime(&RuntimeConfig::compact()).expect("runtime");
        assert_eq!(rt.block_on(async { 21 * 2 }), 42);
    }
}
