//! # Metrics
//!
//! Dispatch metrics for the event router.
//!
//! - [`BridgeMetrics`] is what the router records into.
//! - [`MetricsCollector`] is the Prometheus implementation, served on the
//!   appservice listener.
//! - [`MetricPeg`] holds the active collector for the process; it can be set
//!   once and reads fall back to [`NoopMetrics`].

mod collector;
mod error;
mod peg;

pub use collector::MetricsCollector;
pub use error::{MetricsError, MetricsErrorExt};
pub use peg::MetricPeg;

use std::fmt;
use std::time::Duration;

/// The two kinds of inbound events the router dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AliasQuery,
    RoomEvent,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AliasQuery => "alias_query",
            Self::RoomEvent => "room_event",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait BridgeMetrics: Send + Sync + fmt::Debug {
    fn event_received(&self, kind: EventKind);

    fn event_failed(&self, kind: EventKind);

    fn observe_dispatch(&self, kind: EventKind, elapsed: Duration);
}

/// Records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl BridgeMetrics for NoopMetrics {
    fn event_received(&self, _kind: EventKind) {}

    fn event_failed(&self, _kind: EventKind) {}

    fn observe_dispatch(&self, _kind: EventKind, _elapsed: Duration) {}
}
