//! Gateway server implementation

use super::handler::{storage_router, StorageState};
use crate::config::StorageManagerConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{spawn_listener, BrokerHandle, ChannelBroker, LifecycleSynchronizer};
use crate::service::ArtifactService;
use crate::storage::{load_default_chart, ArtifactStore};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Gateway server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Running
    Running,
    /// Shutting down
    ShuttingDown,
}

/// Handles owned while the gateway runs
struct Running {
    broker: BrokerHandle,
    listener: JoinHandle<()>,
    server: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    local_addr: SocketAddr,
}

/// Storage Manager gateway: artifact store, lifecycle listener and HTTP API
pub struct Gateway {
    config: StorageManagerConfig,
    state: Arc<RwLock<GatewayState>>,
    store: Arc<ArtifactStore>,
    synchronizer: Arc<LifecycleSynchronizer>,
    running: Mutex<Option<Running>>,
}

impl Gateway {
    /// Create a new gateway with the given configuration.
    ///
    /// Fails if the default equity chart cannot be loaded or the storage
    /// root cannot be created.
    pub fn new(config: StorageManagerConfig) -> Result<Self> {
        config.validate()?;

        let default_chart = load_default_chart(&config.storage.default_chart).map_err(|e| {
            tracing::error!(
                path = %config.storage.default_chart.display(),
                error = %e,
                "Cannot load default equity chart"
            );
            e
        })?;

        let store = Arc::new(ArtifactStore::open(
            config.storage.folder.clone(),
            default_chart,
        )?);
        let synchronizer = Arc::new(LifecycleSynchronizer::new(store.clone()));

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(GatewayState::Stopped)),
            store,
            synchronizer,
            running: Mutex::new(None),
        })
    }

    /// Get current state
    pub async fn state(&self) -> GatewayState {
        *self.state.read().await
    }

    pub fn config(&self) -> &StorageManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Address the HTTP listener is bound to, while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Handle for publishing inventory messages, while running
    pub async fn broker(&self) -> Option<BrokerHandle> {
        self.running.lock().await.as_ref().map(|r| r.broker.clone())
    }

    /// Build the HTTP router publishing to `broker`
    pub fn router(&self, broker: BrokerHandle) -> Router {
        let state = StorageState {
            service: ArtifactService::new(self.store.clone()),
            broker,
        };
        storage_router(state).layer(TraceLayer::new_for_http())
    }

    /// Start the lifecycle listener and the HTTP server
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Stopped {
            return Err(Error::Internal("Gateway already running".to_string()));
        }
        *state = GatewayState::Starting;
        drop(state);

        tracing::info!(
            root = %self.store.root().display(),
            "Starting Storage Manager gateway"
        );

        let messaging = &self.config.messaging;
        let (broker, handle) = ChannelBroker::new(
            messaging.queue.clone(),
            messaging.capacity,
            messaging.redelivery_delay(),
        );

        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);
        let bound = match tokio::net::TcpListener::bind(&addr).await {
            Ok(tcp) => tcp.local_addr().map(|local| (tcp, local)),
            Err(e) => Err(e),
        };
        let (tcp, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                *self.state.write().await = GatewayState::Stopped;
                return Err(Error::Internal(format!("Cannot bind {}: {}", addr, e)));
            }
        };

        let listener = spawn_listener(self.synchronizer.clone(), broker);

        let app = self.router(handle.clone());
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let result = axum::serve(tcp, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });

        *self.running.lock().await = Some(Running {
            broker: handle,
            listener,
            server,
            shutdown,
            local_addr,
        });
        *self.state.write().await = GatewayState::Running;

        tracing::info!(%local_addr, queue = %messaging.queue, "Storage Manager gateway started");
        Ok(())
    }

    /// Stop the HTTP server, then drain the lifecycle listener
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Running {
            return Ok(());
        }
        *state = GatewayState::ShuttingDown;
        drop(state);

        tracing::info!("Stopping Storage Manager gateway");

        if let Some(running) = self.running.lock().await.take() {
            let _ = running.shutdown.send(());
            if let Err(e) = running.server.await {
                tracing::warn!(error = %e, "HTTP server task ended abnormally");
            }

            // The listener exits once every publishing handle is gone.
            drop(running.broker);
            if let Err(e) = running.listener.await {
                tracing::warn!(error = %e, "Listener task ended abnormally");
            }
        }

        *self.state.write().await = GatewayState::Stopped;
        tracing::info!("Storage Manager gateway stopped");
        Ok(())
    }
}

/// Builder for creating a gateway
pub struct GatewayBuilder {
    config: StorageManagerConfig,
}

impl GatewayBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: StorageManagerConfig::default(),
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: StorageManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the gateway host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.gateway.host = host.into();
        self
    }

    /// Set the gateway port
    pub fn port(mut self, port: u16) -> Self {
        self.config.gateway.port = port;
        self
    }

    /// Set the storage root
    pub fn storage_folder(mut self, folder: impl Into<std::path::PathBuf>) -> Self {
        self.config.storage.folder = folder.into();
        self
    }

    /// Set the default equity chart image
    pub fn default_chart(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.storage.default_chart = path.into();
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<Gateway> {
        Gateway::new(self.config)
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
