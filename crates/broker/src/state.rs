//! Shared broker state: sessions, the pending-request map, and the
//! runtime tuning record.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    tokio::{
        sync::{Mutex, RwLock, mpsc, watch},
        task::JoinHandle,
    },
    tracing::{debug, warn},
};

use hb_protocol::{Response, Tuning, messages};

use crate::config::BrokerConfig;

// ── Sessions ─────────────────────────────────────────────────────────────────

/// Any connected automation client.
pub(crate) struct ClientSession {
    pub conn_id: String,
    sender: mpsc::UnboundedSender<String>,
}

impl ClientSession {
    pub fn new(conn_id: String, sender: mpsc::UnboundedSender<String>) -> Self {
        Self { conn_id, sender }
    }

    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

/// The single extension session. A new handshake supersedes the old one.
pub(crate) struct ExtensionSession {
    pub conn_id: String,
    pub extension_id: String,
    pub version: String,
    sender: mpsc::UnboundedSender<String>,
    pub keepalive: JoinHandle<()>,
}

impl ExtensionSession {
    pub fn new(
        conn_id: String,
        extension_id: String,
        version: String,
        sender: mpsc::UnboundedSender<String>,
        keepalive: JoinHandle<()>,
    ) -> Self {
        Self {
            conn_id,
            extension_id,
            version,
            sender,
            keepalive,
        }
    }

    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

// ── Pending requests ─────────────────────────────────────────────────────────

/// One relayed command awaiting the extension's reply.
pub(crate) struct PendingRequest {
    pub client_conn: String,
    pub client_id: String,
    pub action: String,
    /// The deadline timer; aborted when the reply arrives first.
    pub deadline: JoinHandle<()>,
}

// ── State ────────────────────────────────────────────────────────────────────

pub(crate) struct BrokerState {
    pub config: BrokerConfig,
    pub clients: RwLock<HashMap<String, ClientSession>>,
    pub extension: RwLock<Option<ExtensionSession>>,
    pub pending: Mutex<HashMap<String, PendingRequest>>,
    next_correlation: AtomicU64,
    pub tuning: RwLock<Tuning>,
    /// Signals session loops to wind down on `close()`.
    pub shutdown: watch::Sender<bool>,
}

impl BrokerState {
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let tuning = config.tuning.clone();
        Arc::new(Self {
            config,
            clients: RwLock::new(HashMap::new()),
            extension: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
            next_correlation: AtomicU64::new(0),
            tuning: RwLock::new(tuning),
            shutdown,
        })
    }

    /// Broker-minted correlation id, distinct from any client id.
    pub fn next_correlation_id(&self) -> String {
        format!("b{}", self.next_correlation.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub async fn register_client(&self, session: ClientSession) {
        self.clients
            .write()
            .await
            .insert(session.conn_id.clone(), session);
    }

    pub async fn remove_client(&self, conn_id: &str) {
        self.clients.write().await.remove(conn_id);
    }

    /// Send a response frame to one client; silently ignores a client that
    /// has gone away.
    pub async fn send_to_client(&self, conn_id: &str, response: &Response) {
        if let Ok(frame) = serde_json::to_string(response) {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(conn_id)
                && !client.send(&frame)
            {
                debug!(conn_id, "client send failed");
            }
        }
    }

    /// Broadcast an already-serialized event frame to every client
    /// session. Never the extension.
    pub async fn broadcast_event(&self, frame: &str) {
        let clients = self.clients.read().await;
        debug!(clients = clients.len(), "broadcasting event");
        for client in clients.values() {
            client.send(frame);
        }
    }

    /// Fail every pending request with `error` and clear the map.
    pub async fn fail_all_pending(&self, error: &str) {
        let drained: Vec<(String, PendingRequest)> =
            self.pending.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        warn!(count = drained.len(), error, "failing pending requests");
        for (_, record) in drained {
            record.deadline.abort();
            let response = Response::err(&record.client_id, error);
            self.send_to_client(&record.client_conn, &response).await;
        }
    }

    /// Install a new extension session, superseding any current one.
    /// Pending requests against the old session fail immediately.
    pub async fn install_extension(&self, session: ExtensionSession) {
        let previous = self.extension.write().await.replace(session);
        if let Some(old) = previous {
            warn!(
                old_conn = %old.conn_id,
                "new extension handshake supersedes existing session"
            );
            old.keepalive.abort();
            self.fail_all_pending(messages::EXTENSION_DISCONNECTED).await;
        }
    }

    /// Clear the extension if `conn_id` still owns it (a superseded
    /// session closing later must not evict its replacement).
    pub async fn clear_extension(&self, conn_id: &str) -> bool {
        let mut extension = self.extension.write().await;
        if extension.as_ref().is_some_and(|e| e.conn_id == conn_id) {
            if let Some(old) = extension.take() {
                old.keepalive.abort();
            }
            return true;
        }
        false
    }

    pub async fn extension_connected(&self) -> bool {
        self.extension.read().await.is_some()
    }
}
