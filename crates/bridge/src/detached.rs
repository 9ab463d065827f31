use crate::error::{BridgeError, BridgeErrorExt};
use crate::{BridgeLogic, EventProcessor, RoomHandler};
use mxd_appservice::{RoomEvent, Transport};
use mxd_domain::config::BridgeConfig;
use mxd_domain::registration::PROTOCOL;
use mxd_domain::room::{RoomCreationOptions, RoomEntry};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bridge logic without a Discord client: it owns the bot user and accepts
/// traffic, but bridges nothing.
#[derive(Debug)]
pub struct DetachedBridge<T> {
    domain: String,
    transport: Arc<T>,
    rooms: Arc<DetachedRooms>,
    events: Arc<DetachedEvents>,
}

impl<T: Transport> DetachedBridge<T> {
    #[must_use]
    pub fn new(config: &BridgeConfig, transport: Arc<T>) -> Self {
        Self {
            domain: config.bridge.domain.clone(),
            transport,
            rooms: Arc::new(DetachedRooms::default()),
            events: Arc::new(DetachedEvents),
        }
    }
}

impl<T: Transport> BridgeLogic for DetachedBridge<T> {
    type Rooms = DetachedRooms;
    type Events = DetachedEvents;

    fn room_handler(&self) -> Arc<DetachedRooms> {
        Arc::clone(&self.rooms)
    }

    fn event_processor(&self) -> Arc<DetachedEvents> {
        Arc::clone(&self.events)
    }

    async fn init(&self) -> Result<(), BridgeError> {
        let registration = self.transport.registration();
        self.transport
            .ensure_registered(&registration.sender_localpart)
            .await
            .context("Registering the bridge bot")?;
        info!(user_id = %registration.bot_user_id(&self.domain), "Bridge bot ready");
        Ok(())
    }

    async fn run(&self) -> Result<(), BridgeError> {
        warn!(
            protocols = ?self.rooms.protocols(),
            "No Discord client linked; the bridge runs detached and provides no rooms"
        );
        Ok(())
    }
}

/// Declines every alias; records bound protocols.
#[derive(Debug, Default)]
pub struct DetachedRooms {
    protocols: RwLock<Vec<&'static str>>,
}

impl DetachedRooms {
    #[must_use]
    pub fn protocols(&self) -> Vec<&'static str> {
        self.protocols.read().clone()
    }
}

impl RoomHandler for DetachedRooms {
    async fn on_alias_query(&self, alias: &str) -> Result<RoomCreationOptions, BridgeError> {
        debug!(%alias, "Declining alias query");
        Err(BridgeError::Unbridged { message: alias.to_owned().into(), context: None })
    }

    async fn on_alias_queried(&self, alias: &str, room_id: &str) -> Result<(), BridgeError> {
        info!(%alias, %room_id, "Alias room created");
        Ok(())
    }

    fn bind_thirdparty(&self) -> Result<(), BridgeError> {
        let mut protocols = self.protocols.write();
        if !protocols.contains(&PROTOCOL) {
            protocols.push(PROTOCOL);
        }
        debug!(protocol = PROTOCOL, "Third-party protocol bound");
        Ok(())
    }
}

/// Logs timeline events with the number of room entries they map to.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedEvents;

impl EventProcessor for DetachedEvents {
    async fn on_event(&self, event: RoomEvent, entries: Vec<RoomEntry>) -> Result<(), BridgeError> {
        info!(
            room_id = %event.room_id,
            event_type = event.event_type().unwrap_or("unknown"),
            entries = entries.len(),
            "Room event received"
        );
        Ok(())
    }
}
