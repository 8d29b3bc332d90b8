//! The outbound broker connection.
//!
//! Owns the WebSocket, reconnects with exponential backoff (1 s doubling
//! to a 60 s cap) and reports attempts in aggregate, answers keepalive
//! pings, forwards host events, and runs one task per incoming request so
//! slow tabs never block each other.

use std::{sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    serde_json::json,
    tokio::sync::mpsc,
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use hb_protocol::{
    COOKIE_POLL_INTERVAL_MS, ControlFrame, Incoming, PROTOCOL_VERSION, Response, actions,
    parse_incoming,
};

use crate::{dispatch::BridgeCore, host::HostEvent};

const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `ws://127.0.0.1:7331` by default.
    pub broker_url: String,
    /// The extension's stable id, sent in the handshake.
    pub extension_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker_url: format!("ws://127.0.0.1:{}", hb_protocol::DEFAULT_PORT),
            extension_id: "headless".into(),
        }
    }
}

pub struct PageBridge {
    core: Arc<BridgeCore>,
    config: BridgeConfig,
}

impl PageBridge {
    pub fn new(core: Arc<BridgeCore>, config: BridgeConfig) -> Self {
        Self { core, config }
    }

    pub fn core(&self) -> Arc<BridgeCore> {
        Arc::clone(&self.core)
    }

    /// Connect-and-serve until the task is aborted. Each successful
    /// session resets the backoff.
    pub async fn run(self: Arc<Self>) {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut failed_attempts: u64 = 0;
        loop {
            match connect_async(&self.config.broker_url).await {
                Ok((socket, _)) => {
                    if failed_attempts > 0 {
                        info!(
                            attempts = failed_attempts,
                            "reconnected to broker after retries"
                        );
                    } else {
                        info!(url = %self.config.broker_url, "connected to broker");
                    }
                    failed_attempts = 0;
                    backoff_ms = INITIAL_BACKOFF_MS;
                    self.session(socket).await;
                    info!("broker connection closed");
                },
                Err(e) => {
                    failed_attempts += 1;
                    // One aggregate line per backoff tier instead of one
                    // per attempt.
                    if failed_attempts == 1 || backoff_ms == MAX_BACKOFF_MS {
                        warn!(
                            attempts = failed_attempts,
                            next_retry_ms = backoff_ms,
                            error = %e,
                            "broker unreachable, backing off"
                        );
                    }
                },
            }
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
        }
    }

    /// One connected session: handshake, event pumps, request loop.
    async fn session(
        &self,
        socket: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let (mut ws_tx, mut ws_rx) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        let write_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        });

        // Identify as the extension session.
        let handshake = json!({
            "type": "handshake",
            "extensionId": self.config.extension_id,
            "version": PROTOCOL_VERSION,
        });
        let _ = out_tx.send(handshake.to_string());

        // Host events → protocol events.
        let event_task = {
            let out_tx = out_tx.clone();
            let mut events = self.core.host.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    let frame = match event {
                        HostEvent::UrlChanged { tab_id, url } => ControlFrame::event(
                            actions::EVENT_URL_CHANGED,
                            json!({ "tabId": tab_id, "url": url }),
                        ),
                        HostEvent::Response {
                            tab_id,
                            url,
                            status,
                            method,
                        } => ControlFrame::event(
                            actions::EVENT_RESPONSE,
                            json!({ "url": url, "status": status, "tabId": tab_id, "method": method }),
                        ),
                    };
                    if let Ok(text) = serde_json::to_string(&frame)
                        && out_tx.send(text).is_err()
                    {
                        break;
                    }
                }
            })
        };

        // Periodic cookie count. Full cookie payloads are never broadcast;
        // persistence is an external collaborator.
        let cookie_task = {
            let out_tx = out_tx.clone();
            let host = Arc::clone(&self.core.host);
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_millis(COOKIE_POLL_INTERVAL_MS));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let count = host.cookies().await.len();
                    let frame = ControlFrame::event(
                        actions::EVENT_COOKIES_CHANGED,
                        json!({ "count": count }),
                    );
                    if let Ok(text) = serde_json::to_string(&frame)
                        && out_tx.send(text).is_err()
                    {
                        break;
                    }
                }
            })
        };

        while let Some(message) = ws_rx.next().await {
            let text = match message {
                Ok(Message::Text(t)) => t.to_string(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "broker socket read error");
                    break;
                },
            };

            match parse_incoming(&text) {
                Ok(Incoming::Control(ControlFrame::Ping)) => {
                    let _ = out_tx.send(json!({ "type": "pong" }).to_string());
                },
                Ok(Incoming::Request(request)) => {
                    let core = Arc::clone(&self.core);
                    let out_tx = out_tx.clone();
                    tokio::spawn(async move {
                        let response = match core
                            .execute(&request.action, request.tab_id, &request.params)
                            .await
                        {
                            Ok(result) => Response::ok(&request.id, result),
                            Err(e) => Response::err(&request.id, e.to_string()),
                        };
                        if let Ok(text) = serde_json::to_string(&response) {
                            let _ = out_tx.send(text);
                        }
                    });
                },
                Ok(_) => {},
                Err(e) => {
                    // Malformed frames are dropped, never fatal.
                    debug!(error = %e, "ignoring malformed frame");
                },
            }
        }

        event_task.abort();
        cookie_task.abort();
        write_task.abort();
    }
}
