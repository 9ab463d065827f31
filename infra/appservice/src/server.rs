use crate::client::HomeserverClient;
use crate::error::TransportError;
use crate::events::EventSource;
use crate::model::{AliasQuery, RoomEvent};
use crate::routes::{AppState, router};
use crate::storage::{AppserviceStorage, MemoryStorage};
use crate::Transport;
use axum::Router;
use axum_server::Handle;
use mxd_domain::registration::Registration;
use mxd_logger::{LogArgs, LogMultiplexer, SUPPRESSED_ERRCODE, SdkLevel, SdkLogSink};
use parking_lot::Mutex;
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const SDK_MODULE: &str = "Appservice";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Listener {
    handle: Handle<SocketAddr>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Fluent builder for [`Appservice`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct AppserviceBuilder {
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    domain: Option<String>,
    homeserver_url: Option<String>,
    registration: Option<Registration>,
    storage: Option<Arc<dyn AppserviceStorage>>,
    log: Option<Arc<dyn SdkLogSink>>,
}

impl AppserviceBuilder {
    pub const fn bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = Some(address);
        self
    }

    /// `0` picks a free port; see the address returned by [`Transport::begin`].
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn homeserver_url(mut self, url: impl Into<String>) -> Self {
        self.homeserver_url = Some(url.into());
        self
    }

    pub fn registration(mut self, registration: Registration) -> Self {
        self.registration = Some(registration);
        self
    }

    /// Backend for completed transaction ids; in-memory when unset.
    pub fn storage(mut self, storage: Arc<dyn AppserviceStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sink for the transport's own log lines.
    pub fn log_sink(mut self, log: Arc<dyn SdkLogSink>) -> Self {
        self.log = Some(log);
        self
    }

    /// Validates the settings; binds nothing.
    ///
    /// # Errors
    /// [`TransportError::Validation`] when the port, domain, homeserver URL or
    /// registration is missing.
    pub fn build(self) -> Result<Appservice, TransportError> {
        let port = self.port.ok_or_else(|| missing("port"))?;
        let domain = self.domain.filter(|d| !d.trim().is_empty()).ok_or_else(|| missing("domain"))?;
        let homeserver_url = self.homeserver_url.ok_or_else(|| missing("homeserver_url"))?;
        let registration = self.registration.ok_or_else(|| missing("registration"))?;

        let client = HomeserverClient::new(&homeserver_url, &registration.as_token, &domain)?;
        let address =
            SocketAddr::new(self.bind_address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)), port);

        Ok(Appservice {
            address,
            registration: Arc::new(registration),
            client: Arc::new(client),
            storage: self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            log: self.log.unwrap_or_else(|| Arc::new(LogMultiplexer::new())),
            alias_queries: EventSource::new("room.alias_query"),
            room_events: EventSource::new("room.event"),
            extra_routes: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }
}

/// The appservice listener plus its outbound homeserver client.
#[derive(Debug)]
pub struct Appservice {
    address: SocketAddr,
    registration: Arc<Registration>,
    client: Arc<HomeserverClient>,
    storage: Arc<dyn AppserviceStorage>,
    log: Arc<dyn SdkLogSink>,
    alias_queries: EventSource<AliasQuery>,
    room_events: EventSource<RoomEvent>,
    extra_routes: Mutex<Vec<Router>>,
    started: AtomicBool,
    listener: Mutex<Option<Listener>>,
}

impl Appservice {
    pub fn builder() -> AppserviceBuilder {
        AppserviceBuilder::default()
    }

    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    fn app(&self) -> Router {
        let state = AppState {
            hs_token: self.registration.hs_token.as_str().into(),
            creator: Arc::clone(&self.client) as _,
            storage: Arc::clone(&self.storage),
            log: Arc::clone(&self.log),
            alias_queries: self.alias_queries.emitter(),
            room_events: self.room_events.emitter(),
            started_at: Instant::now(),
        };

        self.extra_routes
            .lock()
            .drain(..)
            .fold(router(state), |app, extra| app.merge(extra))
            .layer(TraceLayer::new_for_http())
    }
}

impl Transport for Appservice {
    fn registration(&self) -> &Registration {
        &self.registration
    }

    fn room_alias_queries(&self) -> &EventSource<AliasQuery> {
        &self.alias_queries
    }

    fn room_events(&self) -> &EventSource<RoomEvent> {
        &self.room_events
    }

    fn mount(&self, routes: Router) -> Result<(), TransportError> {
        if self.started.load(Ordering::Acquire) {
            return Err(TransportError::AlreadyStarted {
                context: Some("Routes must be mounted before begin".into()),
            });
        }
        self.extra_routes.lock().push(routes);
        Ok(())
    }

    async fn begin(&self) -> Result<SocketAddr, TransportError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyStarted { context: None });
        }

        let app = self.app();
        let handle = Handle::<SocketAddr>::new();
        let server =
            axum_server::bind(self.address).handle(handle.clone()).serve(app.into_make_service());
        let task = tokio::spawn(server);

        let Some(bound) = handle.listening().await else {
            let message = match task.await {
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(())) => "listener exited before binding".to_owned(),
                Err(e) => e.to_string(),
            };
            self.started.store(false, Ordering::Release);
            return Err(TransportError::Bind {
                message: message.into(),
                context: Some(self.address.to_string().into()),
            });
        };

        self.log.log(SdkLevel::Info, SDK_MODULE, format!("Listening on {bound}").into());
        *self.listener.lock() = Some(Listener { handle, task });
        Ok(bound)
    }

    async fn ensure_registered(&self, localpart: &str) -> Result<(), TransportError> {
        match self.client.register(localpart).await {
            Ok(()) => {
                info!(user_id = %self.client.user_id(localpart), "Registered appservice user");
                Ok(())
            },
            Err(err) if err.errcode() == Some(SUPPRESSED_ERRCODE) => {
                self.log.log(SdkLevel::Error, SDK_MODULE, registration_failure(localpart, &err));
                Ok(())
            },
            Err(err) => {
                self.log.log(SdkLevel::Error, SDK_MODULE, registration_failure(localpart, &err));
                Err(err)
            },
        }
    }

    fn stop(&self) {
        if let Some(listener) = self.listener.lock().take() {
            info!(address = %self.address, "Stopping appservice listener");
            listener.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            drop(listener.task);
        } else {
            warn!("Appservice listener is not running");
        }
    }
}

fn registration_failure(localpart: &str, err: &TransportError) -> LogArgs {
    LogArgs::from(vec![json!(format!("Failed to register {localpart}:")), json!(err.to_string())])
}

fn missing(field: &'static str) -> TransportError {
    TransportError::Validation { message: format!("{field} is required").into(), context: None }
}
