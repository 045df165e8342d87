//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the upgrade and status handlers
//! - Hand upgraded sockets to the delivery engine as sender or receiver
//! - Bind server to listener, plain or TLS
//! - Stop the server when the driver shuts down

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::delivery::{DeliveryEngine, Direction};
use crate::driver::{DriverError, Transport};
use crate::http::websocket::WsConnection;
use crate::net::tls::load_tls_config;
use crate::net::DuplexConnection;

/// How long `close` waits for the server task before aborting it.
pub const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DeliveryEngine>,
    pub max_message_size: usize,
}

/// WebSocket relay server.
///
/// The send route installs the consumer's outbound connection, the ack route
/// installs its inbound one. A new upgrade on either route replaces the
/// previous connection on that side.
pub struct RelayServer {
    router: Router,
    config: ListenerConfig,
}

impl RelayServer {
    pub fn new(config: ListenerConfig, engine: Arc<DeliveryEngine>) -> Self {
        let state = AppState {
            engine,
            max_message_size: config.max_message_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.send_route, get(send_handler))
            .route(&config.ack_route, get(ack_handler))
            .route(&config.status_route, get(status_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Bind and start serving in the background.
    pub async fn spawn(self) -> Result<ServerHandle, std::io::Error> {
        let addr: SocketAddr = self.config.bind_address.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address {}: {}", self.config.bind_address, e),
            )
        })?;

        match &self.config.tls {
            None => {
                let listener = TcpListener::bind(addr).await?;
                let local_addr = listener.local_addr()?;
                let (tx, rx) = oneshot::channel::<()>();
                let app = self.router;

                let task = tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            let _ = rx.await;
                        })
                        .await
                });

                tracing::info!(address = %local_addr, "Relay server listening");
                Ok(ServerHandle::new(local_addr, StopSignal::Plain(tx), task))
            }
            Some(tls) => {
                let rustls_config = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let app = self.router;

                let task = {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        axum_server::bind_rustls(addr, rustls_config)
                            .handle(handle)
                            .serve(app.into_make_service())
                            .await
                    })
                };

                let local_addr = handle.listening().await.ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        format!("TLS listener on {} failed to start", addr),
                    )
                })?;

                tracing::info!(address = %local_addr, "Relay server listening (TLS)");
                Ok(ServerHandle::new(local_addr, StopSignal::Tls(handle), task))
            }
        }
    }
}

async fn send_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade_into(state, upgrade, Direction::Sender)
}

async fn ack_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade_into(state, upgrade, Direction::Receiver)
}

fn upgrade_into(
    state: AppState,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    direction: Direction,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(
                direction = %direction,
                error = %rejection,
                "Error upgrading websocket connection"
            );
            return rejection.into_response();
        }
    };

    let engine = state.engine;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket: WebSocket| async move {
            let connection = WsConnection::new(socket);
            tracing::info!(
                direction = %direction,
                connection_id = %connection.id(),
                "Consumer connected"
            );
            let connection = Arc::new(connection);
            if direction == Direction::Sender {
                connection.drain_inbound();
            }
            let connection: Arc<dyn DuplexConnection> = connection;
            match direction {
                Direction::Sender => engine.set_sender(Some(connection)).await,
                Direction::Receiver => engine.set_receiver(Some(connection)).await,
            }
        })
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.status().await)
}

enum StopSignal {
    Plain(oneshot::Sender<()>),
    Tls(axum_server::Handle),
}

/// Handle to a running relay server.
///
/// Doubles as the driver's transport: closing it stops the listener.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Mutex<Option<StopSignal>>,
    task: Mutex<Option<JoinHandle<Result<(), std::io::Error>>>>,
}

impl ServerHandle {
    fn new(
        local_addr: SocketAddr,
        stop: StopSignal,
        task: JoinHandle<Result<(), std::io::Error>>,
    ) -> Self {
        Self {
            local_addr,
            stop: Mutex::new(Some(stop)),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Transport for ServerHandle {
    async fn close(&self) -> Result<(), DriverError> {
        match self.stop.lock().await.take() {
            Some(StopSignal::Plain(tx)) => {
                let _ = tx.send(());
            }
            Some(StopSignal::Tls(handle)) => handle.graceful_shutdown(Some(SERVER_STOP_TIMEOUT)),
            None => {}
        }

        let Some(mut task) = self.task.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SERVER_STOP_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!("Relay server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(DriverError::Transport(e.to_string())),
            Ok(Err(e)) => Err(DriverError::Transport(e.to_string())),
            Err(_) => {
                tracing::warn!("Relay server did not stop in time, aborting");
                task.abort();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}
