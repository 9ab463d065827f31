use mxd_logger::LogMultiplexer;
use mxd_metrics::{BridgeMetrics, MetricPeg};
use std::sync::Arc;

/// Process-wide shared state, built once in `main` and handed down explicitly.
#[derive(Debug, Default)]
pub struct BridgeContext {
    log: Arc<LogMultiplexer>,
    metrics: MetricPeg,
}

impl BridgeContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log sink handed to the transport.
    #[must_use]
    pub fn log(&self) -> Arc<LogMultiplexer> {
        Arc::clone(&self.log)
    }

    #[must_use]
    pub const fn metric_peg(&self) -> &MetricPeg {
        &self.metrics
    }

    /// The active collector, or a no-op one before metrics are attached.
    #[must_use]
    pub fn metrics(&self) -> Arc<dyn BridgeMetrics> {
        self.metrics.get()
    }
}
