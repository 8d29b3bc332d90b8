//! Listener lifecycle.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::{State, WebSocketUpgrade},
        response::IntoResponse,
        routing::get,
    },
    tokio::{net::TcpListener, task::JoinHandle},
    tracing::{error, info},
};

use hb_protocol::messages;

use crate::{
    config::BrokerConfig,
    error::{Error, Result},
    session::handle_connection,
    state::BrokerState,
};

const WAIT_POLL_MS: u64 = 50;

/// A running broker. Dropping it does not stop the listener; call
/// [`Broker::close`].
pub struct Broker {
    state: Arc<BrokerState>,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl Broker {
    /// Bind the loopback listener and start serving.
    pub async fn start(config: BrokerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.bind, config.port)).await?;
        let addr = listener.local_addr()?;
        let state = BrokerState::new(config);
        let app = build_app(Arc::clone(&state));
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "broker listener failed");
            }
        });
        info!(%addr, "broker listening");
        Ok(Self {
            state,
            addr,
            server,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Resolve once an extension handshake arrives; reject after the
    /// configured connection timeout.
    pub async fn wait_for_connection(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.state.config.connection_timeout_ms);
        loop {
            if self.state.extension_connected().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ConnectionTimeout);
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)).await;
        }
    }

    /// Tear down every socket, cancel the keepalive, and abort all
    /// pending requests.
    pub async fn close(&self) {
        // Fail pending while the client sessions can still receive the
        // frames, then wind the sessions down.
        self.state.fail_all_pending(messages::BROKER_CLOSED).await;
        let _ = self.state.shutdown.send(true);
        if let Some(extension) = self.state.extension.write().await.take() {
            extension.keepalive.abort();
        }
        self.server.abort();
        info!("broker closed");
    }
}

fn build_app(state: Arc<BrokerState>) -> Router {
    // The extension and reference clients dial the root path; `/ws` is
    // accepted as well.
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    State(state): State<Arc<BrokerState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_connection(socket, state))
}
