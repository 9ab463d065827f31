//! Bridge-logic seams driven by the service: the room handler answers alias
//! queries, the event processor receives timeline events together with the
//! room entries they belong to.
//!
//! [`DetachedBridge`] is the logic shipped when no remote-network client is
//! linked in.

mod detached;
mod error;

pub use detached::{DetachedBridge, DetachedEvents, DetachedRooms};
pub use error::{BridgeError, BridgeErrorExt};

use mxd_appservice::RoomEvent;
use mxd_domain::room::{RoomCreationOptions, RoomEntry};
use std::future::Future;
use std::sync::Arc;

pub trait RoomHandler: Send + Sync + 'static {
    /// Decides whether `alias` is provided and how its room is created.
    fn on_alias_query(
        &self,
        alias: &str,
    ) -> impl Future<Output = Result<RoomCreationOptions, BridgeError>> + Send;

    /// Called once the room for `alias` exists.
    fn on_alias_queried(
        &self,
        alias: &str,
        room_id: &str,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Registers the third-party protocol lookups. Runs before the listener starts.
    ///
    /// # Errors
    /// [`BridgeError::ThirdParty`] when binding is refused.
    fn bind_thirdparty(&self) -> Result<(), BridgeError>;
}

pub trait EventProcessor: Send + Sync + 'static {
    fn on_event(
        &self,
        event: RoomEvent,
        entries: Vec<RoomEntry>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

pub trait BridgeLogic: Send + Sync + 'static {
    type Rooms: RoomHandler;
    type Events: EventProcessor;

    fn room_handler(&self) -> Arc<Self::Rooms>;

    fn event_processor(&self) -> Arc<Self::Events>;

    fn init(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Starts the bridge's own work; resolves once it is up.
    fn run(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;
}
