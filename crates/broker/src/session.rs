//! Per-connection session handling.
//!
//! A connection is classified by its first message: a `handshake` frame
//! makes it the extension session, anything else makes it a client
//! session. Malformed JSON never closes a socket.

use std::sync::Arc;

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    tokio::sync::{mpsc, watch},
    tracing::{debug, info, warn},
};

use hb_protocol::{ControlFrame, Incoming, PROTOCOL_VERSION, messages, parse_incoming};

use crate::{
    relay,
    state::{BrokerState, ClientSession, ExtensionSession},
};

pub(crate) async fn handle_connection(socket: WebSocket, state: Arc<BrokerState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    debug!(conn_id = %conn_id, "new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    // Write loop: forwards frames from the session channel to the socket.
    let write_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut shutdown = state.shutdown.subscribe();

    // ── Classification on the first message ──────────────────────────────

    let first = read_text(&mut ws_rx, &mut shutdown).await;
    let Some(first) = first else {
        write_task.abort();
        return;
    };

    match parse_incoming(&first) {
        Ok(Incoming::Control(ControlFrame::Handshake {
            extension_id,
            version,
        })) => {
            run_extension(
                &state,
                &conn_id,
                extension_id,
                version,
                out_tx,
                ws_rx,
                shutdown,
            )
            .await;
        },
        parsed => {
            state
                .register_client(ClientSession::new(conn_id.clone(), out_tx))
                .await;
            info!(conn_id = %conn_id, "client session opened");
            if let Ok(Incoming::Request(request)) = parsed {
                relay::relay_request(&state, &conn_id, request).await;
            }
            run_client(&state, &conn_id, ws_rx, shutdown).await;
            state.remove_client(&conn_id).await;
            info!(conn_id = %conn_id, "client session closed");
        },
    }

    // Every sender is gone by now; let the write loop drain what is
    // queued (pending-failure frames included) before the socket drops.
    let _ = write_task.await;
}

/// Read the next text frame, bailing on close, error, or shutdown.
async fn read_text(
    ws_rx: &mut futures::stream::SplitStream<WebSocket>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<String> {
    loop {
        tokio::select! {
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "socket read error");
                    return None;
                },
            },
            _ = shutdown.changed() => return None,
        }
    }
}

// ── Extension session ────────────────────────────────────────────────────────

async fn run_extension(
    state: &Arc<BrokerState>,
    conn_id: &str,
    extension_id: String,
    version: String,
    out_tx: mpsc::UnboundedSender<String>,
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    mut shutdown: watch::Receiver<bool>,
) {
    if version != PROTOCOL_VERSION {
        // Mismatches are logged, never refused.
        warn!(
            extension_version = %version,
            broker_version = PROTOCOL_VERSION,
            "extension protocol version mismatch"
        );
    }
    info!(conn_id = %conn_id, extension_id = %extension_id, version = %version, "extension session opened");

    // Keepalive: ping the extension every interval. Clients are not pinged.
    let keepalive = {
        let out_tx = out_tx.clone();
        let interval_ms = state.config.keepalive_interval_ms;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(10)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if out_tx.send(r#"{"type":"ping"}"#.to_string()).is_err() {
                    break;
                }
            }
        })
    };

    state
        .install_extension(ExtensionSession::new(
            conn_id.to_string(),
            extension_id,
            version,
            out_tx,
            keepalive,
        ))
        .await;

    // Responses and events are serialized here in arrival order.
    while let Some(text) = read_text(&mut ws_rx, &mut shutdown).await {
        match parse_incoming(&text) {
            Ok(Incoming::Response(response)) => {
                relay::complete_request(state, response).await;
            },
            Ok(Incoming::Control(ControlFrame::Event(_))) => {
                // Broadcast verbatim to every client, never back to the
                // extension.
                state.broadcast_event(&text).await;
            },
            Ok(Incoming::Control(ControlFrame::Pong)) => {
                debug!(conn_id = %conn_id, "keepalive pong");
            },
            Ok(_) => {},
            Err(e) => {
                debug!(error = %e, "ignoring malformed extension frame");
            },
        }
    }

    if state.clear_extension(conn_id).await {
        state.fail_all_pending(messages::EXTENSION_DISCONNECTED).await;
        info!(conn_id = %conn_id, "extension session closed");
    } else {
        debug!(conn_id = %conn_id, "superseded extension socket closed");
    }
}

// ── Client session ───────────────────────────────────────────────────────────

async fn run_client(
    state: &Arc<BrokerState>,
    conn_id: &str,
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    mut shutdown: watch::Receiver<bool>,
) {
    while let Some(text) = read_text(&mut ws_rx, &mut shutdown).await {
        match parse_incoming(&text) {
            Ok(Incoming::Request(request)) => {
                relay::relay_request(state, conn_id, request).await;
            },
            Ok(_) => {},
            Err(e) => {
                // Robustness over strictness: drop and keep the socket.
                debug!(conn_id = %conn_id, error = %e, "ignoring malformed client frame");
            },
        }
    }
}
