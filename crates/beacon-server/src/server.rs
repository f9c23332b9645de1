//! `BeaconServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::presence::scheduler::BroadcastScheduler;
use crate::service::PresenceService;
use crate::websocket::session::run_ws_session;

/// How long [`BeaconServer::drain`] waits for tasks by default.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Presence engine.
    pub service: Arc<PresenceService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Fired on shutdown; sessions close when it does.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Renders the `/metrics` body.
    pub metrics: PrometheusHandle,
}

/// The Beacon presence server.
pub struct BeaconServer {
    config: Arc<ServerConfig>,
    service: Arc<PresenceService>,
    metrics: PrometheusHandle,
    /// Stops the listener, the broadcaster, and every session.
    shutdown: CancellationToken,
    start_time: Instant,
}

impl BeaconServer {
    /// Create a new server around an existing presence service.
    pub fn new(config: ServerConfig, service: Arc<PresenceService>, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            service,
            metrics,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(&self.config.ws_path, get(ws_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let router = self.router();
        let token = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });

        info!(%local_addr, ws_path = %self.config.ws_path, "beacon server listening");
        Ok((local_addr, handle))
    }

    /// Start the broadcast loop; it stops on shutdown.
    pub fn spawn_broadcaster(&self) -> JoinHandle<()> {
        let scheduler = BroadcastScheduler::new(self.service.clone());
        tokio::spawn(scheduler.run(self.shutdown.clone()))
    }

    /// Get the presence service.
    pub fn service(&self) -> &Arc<PresenceService> {
        &self.service
    }

    /// Stop accepting connections, close every session, and stop the
    /// broadcaster. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Shut down, then wait up to `grace` for the serving and broadcast
    /// tasks to finish.
    ///
    /// Returns `false` if some task was still running when `grace` ran out.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) -> bool {
        self.shutdown();
        info!(
            task_count = tasks.len(),
            grace_secs = grace.as_secs(),
            connections = self.service.connections().connection_count(),
            "draining beacon server"
        );
        let finished = tokio::time::timeout(grace, futures::future::join_all(tasks))
            .await
            .is_ok();
        if !finished {
            warn!(?grace, "drain timed out, some tasks may still be running");
        }
        finished
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.service.connections().connection_count();
    let players = state.service.store().len();
    Json(health::health_check(state.start_time, connections, players))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// GET {ws_path}: WebSocket upgrade.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, state.service, state.config, state.shutdown))
}
