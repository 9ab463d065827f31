use axum::Router;
use mxd_appservice::{AliasQuery, EventSource, RoomEvent, Transport, TransportError};
use mxd_bridge::{BridgeError, BridgeLogic, DetachedBridge, RoomHandler};
use mxd_domain::config::BridgeConfig;
use mxd_domain::registration::Registration;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug)]
struct FakeTransport {
    alias_queries: EventSource<AliasQuery>,
    room_events: EventSource<RoomEvent>,
    registration: Registration,
    registered: Mutex<Vec<String>>,
    reject_with: Option<&'static str>,
}

impl FakeTransport {
    fn new(reject_with: Option<&'static str>) -> Self {
        Self {
            alias_queries: EventSource::new("alias"),
            room_events: EventSource::new("event"),
            registration: Registration::discord(
                "http://localhost:9005",
                "as".to_owned(),
                "hs".to_owned(),
            ),
            registered: Mutex::new(Vec::new()),
            reject_with,
        }
    }
}

impl Transport for FakeTransport {
    fn registration(&self) -> &Registration {
        &self.registration
    }

    fn room_alias_queries(&self) -> &EventSource<AliasQuery> {
        &self.alias_queries
    }

    fn room_events(&self) -> &EventSource<RoomEvent> {
        &self.room_events
    }

    fn mount(&self, _routes: Router) -> Result<(), TransportError> {
        Ok(())
    }

    async fn begin(&self) -> Result<SocketAddr, TransportError> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    async fn ensure_registered(&self, localpart: &str) -> Result<(), TransportError> {
        self.registered.lock().push(localpart.to_owned());
        match self.reject_with {
            None => Ok(()),
            Some(errcode) => Err(TransportError::Homeserver {
                status: 403,
                errcode: Cow::Borrowed(errcode),
                message: "rejected".into(),
                context: None,
            }),
        }
    }

    fn stop(&self) {}
}

#[tokio::test]
async fn init_registers_the_bot_user() {
    let transport = Arc::new(FakeTransport::new(None));
    let bridge = DetachedBridge::new(&BridgeConfig::default(), Arc::clone(&transport));

    bridge.init().await.expect("init");
    bridge.run().await.expect("run");
    assert_eq!(*transport.registered.lock(), vec!["_discord_bot".to_owned()]);
}

#[tokio::test]
async fn init_registers_the_sender_from_the_registration() {
    let mut transport = FakeTransport::new(None);
    transport.registration.sender_localpart = "_discord_relay".to_owned();
    let transport = Arc::new(transport);
    let bridge = DetachedBridge::new(&BridgeConfig::default(), Arc::clone(&transport));

    bridge.init().await.expect("init");
    assert_eq!(*transport.registered.lock(), vec!["_discord_relay".to_owned()]);
}

#[tokio::test]
async fn failed_registration_fails_init() {
    let transport = Arc::new(FakeTransport::new(Some("M_EXCLUSIVE")));
    let bridge = DetachedBridge::new(&BridgeConfig::default(), transport);

    let err = bridge.init().await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport { .. }));
    assert!(err.to_string().contains("M_EXCLUSIVE"));
}

#[tokio::test]
async fn handlers_are_shared() {
    let bridge = DetachedBridge::new(&BridgeConfig::default(), Arc::new(FakeTransport::new(None)));

    bridge.room_handler().bind_thirdparty().expect("bind");
    assert_eq!(bridge.room_handler().protocols(), vec!["discord"]);
    assert!(Arc::ptr_eq(&bridge.event_processor(), &bridge.event_processor()));
}
