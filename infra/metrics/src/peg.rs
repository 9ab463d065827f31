use crate::error::MetricsError;
use crate::{BridgeMetrics, NoopMetrics};
use std::sync::{Arc, OnceLock};

/// Write-once slot for the active [`BridgeMetrics`].
///
/// Readers never wait: until [`MetricPeg::set`] succeeds they get a
/// [`NoopMetrics`].
#[derive(Debug, Default)]
pub struct MetricPeg {
    collector: OnceLock<Arc<dyn BridgeMetrics>>,
}

impl MetricPeg {
    #[must_use]
    pub const fn new() -> Self {
        Self { collector: OnceLock::new() }
    }

    /// # Errors
    /// [`MetricsError::AlreadySet`] when a collector was set before; the
    /// existing one stays in place.
    pub fn set(&self, collector: Arc<dyn BridgeMetrics>) -> Result<(), MetricsError> {
        self.collector.set(collector).map_err(|_| MetricsError::AlreadySet { context: None })
    }

    #[must_use]
    pub fn get(&self) -> Arc<dyn BridgeMetrics> {
        match self.collector.get() {
            Some(collector) => Arc::clone(collector),
            None => Arc::new(NoopMetrics),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.collector.get().is_some()
    }
}
