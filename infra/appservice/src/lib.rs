//! # Appservice
//!
//! The Matrix application-service side of the bridge: an `axum` listener the
//! homeserver pushes transactions and alias queries to, and a `reqwest` client
//! for calls back into the homeserver.
//!
//! Inbound traffic is exposed as two [`EventSource`]s, one for
//! [`AliasQuery`] and one for [`RoomEvent`], each with a single subscriber.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mxd_appservice::{Appservice, Transport};
//!
//! let appservice = Appservice::builder()
//!     .port(9005)
//!     .domain("example.org")
//!     .homeserver_url("https://matrix.example.org")
//!     .registration(registration)
//!     .build()?;
//!
//! let _events = appservice.room_events().subscribe(|event| async move {
//!     tracing::info!(room_id = %event.room_id, "event");
//! })?;
//! let address = appservice.begin().await?;
//! ```

mod client;
mod error;
mod events;
mod model;
mod routes;
mod server;
mod storage;

pub use client::HomeserverClient;
pub use error::{TransportError, TransportErrorExt};
pub use events::{EventEmitter, EventSource, Subscription};
pub use futures::future::BoxFuture;
pub use model::{AliasQuery, RoomCreator, RoomEvent};
pub use server::{Appservice, AppserviceBuilder};
pub use storage::{AppserviceStorage, MemoryStorage};

use axum::Router;
use mxd_domain::registration::Registration;
use std::future::Future;
use std::net::SocketAddr;

/// Inbound/outbound gateway between the homeserver and the bridge.
pub trait Transport: Send + Sync + 'static {
    /// Registration this transport authenticates with.
    fn registration(&self) -> &Registration;

    fn room_alias_queries(&self) -> &EventSource<AliasQuery>;

    fn room_events(&self) -> &EventSource<RoomEvent>;

    /// Adds routes to the listener. Only possible before [`Transport::begin`].
    ///
    /// # Errors
    /// [`TransportError::AlreadyStarted`] once the listener runs.
    fn mount(&self, routes: Router) -> Result<(), TransportError>;

    /// Binds and starts serving; resolves to the bound address.
    fn begin(&self) -> impl Future<Output = Result<SocketAddr, TransportError>> + Send;

    /// Registers `localpart` on the homeserver; an existing user counts as success.
    fn ensure_registered(
        &self,
        localpart: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stops accepting requests and drains in-flight ones.
    fn stop(&self);
}
