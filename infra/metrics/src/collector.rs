use crate::error::{MetricsError, MetricsErrorExt};
use crate::{BridgeMetrics, EventKind};
use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use mxd_appservice::Transport;
use mxd_domain::config::MetricsConfig;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const NAMESPACE: &str = "discord_bridge";
const KIND_LABEL: &str = "kind";
const TEXT_FORMAT: &str = "text/plain; version=0.0.4";
const DISPATCH_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];
const RESERVED_PATHS: &[&str] = &["/health", "/_matrix", "/transactions", "/rooms"];

/// Prometheus-backed [`BridgeMetrics`] with its own registry.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    registry: Registry,
    received: IntCounterVec,
    failed: IntCounterVec,
    dispatch: HistogramVec,
}

impl MetricsCollector {
    /// Builds a collector without exposing it anywhere.
    ///
    /// # Errors
    /// Metric registration failures.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let received = IntCounterVec::new(
            Opts::new("events_received_total", "Inbound events handed to the router")
                .namespace(NAMESPACE),
            &[KIND_LABEL],
        )?;
        let failed = IntCounterVec::new(
            Opts::new("events_failed_total", "Inbound events whose handler failed")
                .namespace(NAMESPACE),
            &[KIND_LABEL],
        )?;
        let dispatch = HistogramVec::new(
            HistogramOpts::new("event_dispatch_duration_seconds", "Time spent in event handlers")
                .namespace(NAMESPACE)
                .buckets(DISPATCH_BUCKETS.to_vec()),
            &[KIND_LABEL],
        )?;

        registry.register(Box::new(received.clone())).context("events_received_total")?;
        registry.register(Box::new(failed.clone())).context("events_failed_total")?;
        registry
            .register(Box::new(dispatch.clone()))
            .context("event_dispatch_duration_seconds")?;

        Ok(Self { registry, received, failed, dispatch })
    }

    /// Builds a collector and serves it on `transport` at `settings.path`.
    ///
    /// # Errors
    /// [`MetricsError::Validation`] for a path the listener cannot or must not
    /// serve, or mount failures once the transport is running.
    pub fn init(
        transport: &impl Transport,
        settings: &MetricsConfig,
    ) -> Result<Arc<Self>, MetricsError> {
        let path = validate_path(&settings.path)?;
        let collector = Arc::new(Self::new()?);

        let exposed = Arc::clone(&collector);
        let routes = Router::new().route(
            path,
            get(move || {
                let collector = Arc::clone(&exposed);
                async move { collector.exposition() }
            }),
        );
        transport.mount(routes).context("Mounting metrics route")?;

        info!(path, "Metrics collector attached");
        Ok(collector)
    }

    /// Current values in the Prometheus text format.
    ///
    /// # Errors
    /// Encoding failures.
    pub fn render(&self) -> Result<String, MetricsError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    fn exposition(&self) -> Response {
        match self.render() {
            Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
            Err(e) => {
                warn!("Failed to render metrics: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            },
        }
    }
}

impl BridgeMetrics for MetricsCollector {
    fn event_received(&self, kind: EventKind) {
        self.received.with_label_values(&[kind.as_str()]).inc();
    }

    fn event_failed(&self, kind: EventKind) {
        self.failed.with_label_values(&[kind.as_str()]).inc();
    }

    fn observe_dispatch(&self, kind: EventKind, elapsed: Duration) {
        self.dispatch.with_label_values(&[kind.as_str()]).observe(elapsed.as_secs_f64());
    }
}

fn validate_path(path: &str) -> Result<&str, MetricsError> {
    let path = path.trim();
    let invalid = |message: &'static str| MetricsError::Validation {
        message: message.into(),
        context: Some(path.to_owned().into()),
    };

    if !path.starts_with('/') || path.len() < 2 {
        return Err(invalid("Metrics path must start with '/' and name a route"));
    }
    if path.contains(['{', '}', '*']) {
        return Err(invalid("Metrics path cannot contain route parameters"));
    }
    let reserved = |prefix: &&str| {
        path.strip_prefix(*prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    if RESERVED_PATHS.iter().any(reserved) {
        return Err(invalid("Metrics path collides with an appservice route"));
    }
    Ok(path)
}
