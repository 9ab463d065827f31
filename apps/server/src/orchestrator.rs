use crate::context::BridgeContext;
use crate::lifecycle::{Lifecycle, Stage, StartupError, StartupErrorExt};
use crate::router::EventRouter;
use mxd_appservice::{Appservice, AppserviceStorage, Transport, TransportError};
use mxd_bridge::{BridgeError, BridgeLogic, DetachedBridge, RoomHandler};
use mxd_domain::config::{BridgeConfig, MetricsConfig};
use mxd_domain::registration::Registration;
use mxd_kernel::config::ValidatedConfig;
use mxd_logger::LogMultiplexer;
use mxd_metrics::{BridgeMetrics, MetricsCollector, MetricsError};
use mxd_store::{DiscordStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Factories for everything the orchestrator starts.
pub trait Components: Send + Sync {
    type Store: Store;
    type Transport: Transport;
    type Bridge: BridgeLogic;

    /// Store handle; must not perform I/O.
    fn store(&self, config: &BridgeConfig) -> Self::Store;

    /// # Errors
    /// Invalid transport settings.
    fn transport(
        &self,
        config: &ValidatedConfig,
        registration: Registration,
        store: Arc<Self::Store>,
        log: Arc<LogMultiplexer>,
    ) -> Result<Self::Transport, TransportError>;

    /// # Errors
    /// Collector construction or route mounting failures.
    fn metrics(
        &self,
        transport: &Self::Transport,
        settings: &MetricsConfig,
    ) -> Result<Arc<dyn BridgeMetrics>, MetricsError> {
        let collector: Arc<dyn BridgeMetrics> = MetricsCollector::init(transport, settings)?;
        Ok(collector)
    }

    /// # Errors
    /// Bridge logic that cannot be built from `config`.
    fn bridge(
        &self,
        config: &BridgeConfig,
        transport: Arc<Self::Transport>,
        store: Arc<Self::Store>,
    ) -> Result<Self::Bridge, BridgeError>;
}

/// SurrealDB store, axum appservice and the detached bridge.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscordComponents;

impl Components for DiscordComponents {
    type Store = DiscordStore;
    type Transport = Appservice;
    type Bridge = DetachedBridge<Appservice>;

    fn store(&self, config: &BridgeConfig) -> DiscordStore {
        DiscordStore::new(config.database.clone())
    }

    fn transport(
        &self,
        config: &ValidatedConfig,
        registration: Registration,
        store: Arc<DiscordStore>,
        log: Arc<LogMultiplexer>,
    ) -> Result<Appservice, TransportError> {
        let settings = &config.config.bridge;
        Appservice::builder()
            .bind_address(settings.bind_address)
            .port(config.port)
            .domain(settings.domain.as_str())
            .homeserver_url(settings.homeserver_url.as_str())
            .registration(registration)
            .storage(store as Arc<dyn AppserviceStorage>)
            .log_sink(log)
            .build()
    }

    fn bridge(
        &self,
        config: &BridgeConfig,
        transport: Arc<Appservice>,
        _store: Arc<DiscordStore>,
    ) -> Result<DetachedBridge<Appservice>, BridgeError> {
        Ok(DetachedBridge::new(config, transport))
    }
}

/// Drives startup through every [`Stage`] up to [`Stage::Running`].
#[derive(Debug)]
pub struct Orchestrator<C> {
    components: C,
    context: Arc<BridgeContext>,
    lifecycle: Lifecycle,
}

impl<C: Components> Orchestrator<C> {
    pub fn new(components: C, context: Arc<BridgeContext>) -> Self {
        Self { components, context, lifecycle: Lifecycle::new() }
    }

    /// Starts the bridge.
    ///
    /// Every failure is logged with the stage it happened in before it is returned.
    ///
    /// # Errors
    /// [`StartupError`]; all of them are fatal.
    pub async fn run(
        mut self,
        config: ValidatedConfig,
        registration: Registration,
    ) -> Result<Running<C>, StartupError> {
        match self.start(config, registration).await {
            Ok(parts) => {
                let Parts { transport, bridge, router, address } = parts;
                let lifecycle = self.lifecycle;
                Ok(Running { transport, _bridge: bridge, router, address, lifecycle })
            },
            Err(err) => {
                self.lifecycle.fail(&err);
                error!(stage = ?self.lifecycle.stage(), "Startup failed: {err}");
                Err(err)
            },
        }
    }

    async fn start(
        &mut self,
        config: ValidatedConfig,
        registration: Registration,
    ) -> Result<Parts<C>, StartupError> {
        self.lifecycle.advance(Stage::ConfigLoaded)?;
        let settings = config.config.clone();

        let store = Arc::new(self.components.store(&settings));

        self.lifecycle.advance(Stage::StoreInitializing)?;
        store.init().await?;
        self.lifecycle.advance(Stage::StoreReady)?;
        info!(url = %settings.database.url, "Store ready");

        let transport = Arc::new(
            self.components
                .transport(&config, registration, Arc::clone(&store), self.context.log())
                .context("Constructing transport")?,
        );
        self.lifecycle.advance(Stage::TransportConstructed)?;

        if settings.metrics.enable {
            self.attach_metrics(&transport, &settings.metrics);
        }

        // Subscriptions must exist before the listener accepts traffic.
        let bridge = self.components.bridge(&settings, Arc::clone(&transport), Arc::clone(&store))?;
        let rooms = bridge.room_handler();
        let router = EventRouter::install(
            &*transport,
            Arc::clone(&store),
            Arc::clone(&rooms),
            bridge.event_processor(),
            Arc::clone(&self.context),
        )
        .context("Installing event router")?;
        rooms.bind_thirdparty().context("Binding third-party protocols")?;

        let address = transport.begin().await.context("Starting listener")?;
        self.lifecycle.advance(Stage::TransportStarted)?;
        info!("Started listening on port {}", address.port());

        self.lifecycle.advance(Stage::BridgeInitializing)?;
        bridge.init().await.context("Initializing bridge")?;
        bridge.run().await.context("Running bridge")?;
        self.lifecycle.advance(Stage::Running)?;
        info!("Bridge running");

        Ok(Parts { transport, bridge, router, address })
    }

    /// Metrics are optional: failures here are reported and startup continues.
    fn attach_metrics(&self, transport: &C::Transport, settings: &MetricsConfig) {
        let attached = self
            .components
            .metrics(transport, settings)
            .and_then(|collector| self.context.metric_peg().set(collector));
        match attached {
            Ok(()) => info!(path = %settings.path, "Metrics enabled"),
            Err(e) => warn!("Continuing without metrics: {e}"),
        }
    }
}

struct Parts<C: Components> {
    transport: Arc<C::Transport>,
    bridge: C::Bridge,
    router: EventRouter,
    address: SocketAddr,
}

/// A started bridge.
#[must_use = "dropping Running cancels event routing"]
pub struct Running<C: Components> {
    transport: Arc<C::Transport>,
    /// Owned until shutdown so bridge-side state outlives routing.
    _bridge: C::Bridge,
    router: EventRouter,
    address: SocketAddr,
    lifecycle: Lifecycle,
}

impl<C: Components> std::fmt::Debug for Running<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running")
            .field("address", &self.address)
            .field("stage", &self.lifecycle.stage())
            .finish_non_exhaustive()
    }
}

impl<C: Components> Running<C> {
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    #[must_use]
    pub const fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn transport(&self) -> &C::Transport {
        &self.transport
    }

    #[must_use]
    pub fn is_routing(&self) -> bool {
        self.router.is_active()
    }

    /// Stops routing events, then stops the listener.
    pub fn shutdown(self) {
        self.router.cancel();
        self.transport.stop();
        info!("Bridge stopped");
    }
}
