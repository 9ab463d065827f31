use crate::error::TransportError;
use futures::future::BoxFuture;
use mxd_domain::room::{RoomCreationOptions, alias_localpart};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Creates rooms on the homeserver on behalf of the bridge bot.
pub trait RoomCreator: Send + Sync + fmt::Debug {
    /// Returns the new room id.
    fn create_room(
        &self,
        options: RoomCreationOptions,
    ) -> BoxFuture<'_, Result<String, TransportError>>;
}

/// The homeserver asked whether the bridge provides `alias`.
///
/// Answering is done by consuming the query through [`AliasQuery::create_room`].
/// A query dropped unanswered is reported back as "not found".
#[derive(Debug)]
pub struct AliasQuery {
    alias: String,
    creator: Arc<dyn RoomCreator>,
    reply: oneshot::Sender<String>,
}

impl AliasQuery {
    /// Builds a query plus the receiver the listener waits on.
    #[must_use]
    pub fn new(
        alias: impl Into<String>,
        creator: Arc<dyn RoomCreator>,
    ) -> (Self, oneshot::Receiver<String>) {
        let (reply, answer) = oneshot::channel();
        (Self { alias: alias.into(), creator, reply }, answer)
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Creates the room for this alias and answers the homeserver.
    ///
    /// `room_alias_name` defaults to the alias localpart so the new room
    /// actually carries the queried alias.
    ///
    /// # Errors
    /// Room creation failures; the query then answers "not found".
    pub async fn create_room(
        self,
        mut options: RoomCreationOptions,
    ) -> Result<String, TransportError> {
        if options.room_alias_name.is_none() {
            options.room_alias_name = Some(alias_localpart(&self.alias).to_owned());
        }

        let room_id = self.creator.create_room(options).await?;
        // The listener may have gone away (shutdown); the room exists either way.
        let _ = self.reply.send(room_id.clone());
        Ok(room_id)
    }
}

/// A timeline event pushed by the homeserver in a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub room_id: String,
    pub event: Value,
}

impl RoomEvent {
    /// Extracts `room_id` from a raw event; `None` for events without one.
    #[must_use]
    pub fn from_raw(event: Value) -> Option<Self> {
        let room_id = event.get("room_id")?.as_str()?.to_owned();
        Some(Self { room_id, event })
    }

    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event.get("type").and_then(Value::as_str)
    }
}
