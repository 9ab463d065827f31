//! Dispatch of transport events to the bridge logic.
//!
//! Every event runs in its own supervised task: failures and panics end up as
//! log lines and metric samples, never as a crashed service.

use crate::context::BridgeContext;
use mxd_appservice::{AliasQuery, RoomEvent, Subscription, Transport, TransportError};
use mxd_bridge::{BridgeError, EventProcessor, RoomHandler};
use mxd_metrics::{BridgeMetrics, EventKind};
use mxd_store::{Store, StoreError};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Per-event failure; logged and counted, never propagated.
#[mxd_derive::mxd_error]
pub enum DispatchError {
    #[error("Bridge handler failed{}: {source}", format_context(.context))]
    Bridge { source: BridgeError, context: Option<Cow<'static, str>> },

    #[error("Room entry lookup failed{}: {source}", format_context(.context))]
    Store { source: StoreError, context: Option<Cow<'static, str>> },

    #[error("Room creation failed{}: {source}", format_context(.context))]
    Transport { source: TransportError, context: Option<Cow<'static, str>> },

    #[error("Handler panicked{}: {message}", format_context(.context))]
    Panicked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// What a dispatched unit is about; decides the log field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Alias(String),
    Room(String),
}

impl Subject {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Alias(_) => EventKind::AliasQuery,
            Self::Room(_) => EventKind::RoomEvent,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alias(alias) => f.write_str(alias),
            Self::Room(room_id) => f.write_str(room_id),
        }
    }
}

/// Runs `unit` in its own task and reports its outcome.
///
/// Returns the error (already logged) so callers and tests can inspect it.
pub async fn supervise<F>(
    subject: Subject,
    metrics: Arc<dyn BridgeMetrics>,
    unit: F,
) -> Result<(), DispatchError>
where
    F: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    let kind = subject.kind();
    metrics.event_received(kind);
    let started = Instant::now();

    let outcome = match tokio::spawn(unit).await {
        Ok(result) => result,
        Err(join) if join.is_panic() => Err(DispatchError::Panicked {
            message: panic_message(join.into_panic()).into(),
            context: None,
        }),
        Err(join) => {
            Err(DispatchError::Panicked { message: join.to_string().into(), context: None })
        },
    };
    metrics.observe_dispatch(kind, started.elapsed());

    if let Err(ref err) = outcome {
        metrics.event_failed(kind);
        match &subject {
            Subject::Alias(alias) => error!(%alias, "Failed to handle alias query: {err}"),
            Subject::Room(room_id) => error!(%room_id, "Failed to handle room event: {err}"),
        }
    }
    outcome
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Resolves an alias query: ask the room handler, create the room, report back.
///
/// Any early return drops `query`, which answers the homeserver with "not found".
pub async fn dispatch_alias_query<R: RoomHandler>(
    rooms: Arc<R>,
    query: AliasQuery,
) -> Result<(), DispatchError> {
    let alias = query.alias().to_owned();
    let options = rooms.on_alias_query(&alias).await?;
    let room_id = query.create_room(options).await?;
    rooms.on_alias_queried(&alias, &room_id).await?;
    info!(%alias, %room_id, "Alias query answered");
    Ok(())
}

/// Looks up the room's bridge entries and hands the event to the processor.
pub async fn dispatch_room_event<S: Store, E: EventProcessor>(
    store: Arc<S>,
    events: Arc<E>,
    event: RoomEvent,
) -> Result<(), DispatchError> {
    let entries = store.entries_by_matrix_id(&event.room_id).await?;
    debug!(room_id = %event.room_id, entries = entries.len(), "Dispatching room event");
    events.on_event(event, entries).await?;
    Ok(())
}

/// The two live subscriptions on the transport's event sources.
#[derive(Debug)]
pub struct EventRouter {
    alias_queries: Subscription,
    room_events: Subscription,
}

impl EventRouter {
    /// Subscribes to both event sources of `transport`.
    ///
    /// # Errors
    /// [`TransportError::AlreadySubscribed`] when either source already has a consumer.
    pub fn install<T, S, R, E>(
        transport: &T,
        store: Arc<S>,
        rooms: Arc<R>,
        events: Arc<E>,
        context: Arc<BridgeContext>,
    ) -> Result<Self, TransportError>
    where
        T: Transport,
        S: Store,
        R: RoomHandler,
        E: EventProcessor,
    {
        let alias_context = Arc::clone(&context);
        let alias_queries = transport.room_alias_queries().subscribe(move |query: AliasQuery| {
            let subject = Subject::Alias(query.alias().to_owned());
            let unit = dispatch_alias_query(Arc::clone(&rooms), query);
            let metrics = alias_context.metrics();
            async move {
                let _ = supervise(subject, metrics, unit).await;
            }
        })?;

        let room_events = transport.room_events().subscribe(move |event: RoomEvent| {
            let subject = Subject::Room(event.room_id.clone());
            let unit = dispatch_room_event(Arc::clone(&store), Arc::clone(&events), event);
            let metrics = context.metrics();
            async move {
                let _ = supervise(subject, metrics, unit).await;
            }
        })?;

        debug!("Event router installed");
        Ok(Self { alias_queries, room_events })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.alias_queries.is_active() && self.room_events.is_active()
    }

    /// Stops routing; handlers already running finish on their own.
    pub fn cancel(self) {
        info!("Event router stopped");
        self.alias_queries.cancel();
        self.room_events.cancel();
    }
}
