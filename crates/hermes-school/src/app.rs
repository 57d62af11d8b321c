//! Service assembly.
//!
//! [`App::build`] wires the store, token service, middleware and units into
//! a dispatch table, then exposes it through the HTTP front and the bus.
//! Any unit or middleware inconsistency fails here, before a port is bound.

use std::sync::Arc;

use hermes_auth::{TokenConfig, TokenService};
use hermes_bus::{Bus, BusFront, BusHandle};
use hermes_config::HermesConfig;
use hermes_core::SharedContext;
use hermes_middleware::stages::standard_registry;
use hermes_router::DispatchTable;
use hermes_server::{HttpFront, Server, ShutdownSignal};

use crate::error::AppError;
use crate::store::{MemoryStore, RecordStore};
use crate::units::{self, USERS};

/// The assembled service.
pub struct App {
    config: HermesConfig,
    front: HttpFront,
    bus: Bus,
    store: Arc<dyn RecordStore>,
    tokens: Arc<TokenService>,
}

impl App {
    /// Builds the service over an in-memory store.
    pub async fn build(config: HermesConfig) -> Result<Self, AppError> {
        Self::with_store(config, Arc::new(default_store())).await
    }

    /// Builds the service over `store`.
    pub async fn with_store(config: HermesConfig, store: Arc<dyn RecordStore>) -> Result<Self, AppError> {
        config.validate()?;

        let tokens = Arc::new(TokenService::new(&TokenConfig::new(
            config.long_token_secret(),
            config.short_token_secret(),
        )));
        let context = SharedContext::new().with(Arc::clone(&tokens));

        let registry = standard_registry();
        let table = DispatchTable::build(units::all(&store, &tokens), &registry)?;
        let middleware = registry.instantiate(&context)?;
        tracing::info!(units = table.len(), middleware = registry.len(), "dispatch table ready");

        if let Some((username, email, password)) = config.bootstrap.superadmin() {
            let seeded = units::seed_superadmin(store.as_ref(), username, email, password)
                .await
                .map_err(AppError::Bootstrap)?;
            if seeded.is_some() {
                tracing::info!(%username, "superadmin seeded");
            }
        }

        Ok(Self {
            front: HttpFront::new(Arc::new(table), middleware),
            bus: Bus::new(config.bus.capacity),
            config,
            store,
            tokens,
        })
    }

    /// The HTTP front.
    #[must_use]
    pub fn front(&self) -> &HttpFront {
        &self.front
    }

    /// A handle to the internal bus.
    #[must_use]
    pub fn bus(&self) -> BusHandle {
        self.bus.handle()
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// The token service.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Starts the bus front when enabled.
    #[must_use]
    pub fn spawn_bus_front(&self) -> Option<BusFront> {
        self.config
            .bus
            .enabled
            .then(|| BusFront::spawn(self.bus.handle(), Arc::clone(self.front.table())))
    }

    /// Serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), AppError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Serves until `shutdown` fires, then stops the bus front.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), AppError> {
        let bus_front = self.spawn_bus_front();
        let server = Server::builder()
            .http_addr(self.config.server.http_addr.clone())
            .shutdown_timeout(self.config.server.shutdown_timeout())
            .request_timeout(self.config.server.request_timeout())
            .service_name(self.config.server.service_name.clone())
            .front(self.front.clone())
            .build();

        let result = server.run_with_shutdown(shutdown).await;
        if let Some(bus_front) = bus_front {
            bus_front.shutdown().await;
        }
        Ok(result?)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("front", &self.front)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// In-memory store with the user uniqueness constraints.
#[must_use]
pub fn default_store() -> MemoryStore {
    MemoryStore::new()
        .with_unique(USERS, "email")
        .with_unique(USERS, "username")
        .with_unique(USERS, "key")
}
