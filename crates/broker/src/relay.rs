//! Request relaying: correlation, deadlines, tuning injection, and the
//! stale-extension decoration.

use std::{sync::Arc, time::Duration};

use {
    serde_json::Value,
    tracing::{debug, warn},
};

use hb_protocol::{
    AvoidRules, FRAMEWORK_CONFIG_FIELD, Request, Response, TIMEOUT_GRACE_MS, Tuning, actions,
    effective_timeout_ms, messages, overlay_defaults,
};

use crate::state::{BrokerState, PendingRequest};

/// Relay one client request to the extension, or answer it locally when
/// the broker owns the answer.
pub(crate) async fn relay_request(state: &Arc<BrokerState>, client_conn: &str, mut request: Request) {
    // The broker owns the tuning record. Reads are answered here; writes
    // are applied here and still forwarded so the engine can react (e.g.
    // restart its handle sweeper).
    match request.action.as_str() {
        actions::FRAMEWORK_GET_CONFIG => {
            let tuning = state.tuning.read().await;
            let response = match serde_json::to_value(&*tuning) {
                Ok(snapshot) => Response::ok(&request.id, snapshot),
                Err(e) => Response::err(&request.id, e.to_string()),
            };
            state.send_to_client(client_conn, &response).await;
            return;
        },
        actions::FRAMEWORK_SET_CONFIG => {
            let patch = request
                .params
                .get("config")
                .filter(|v| v.is_object())
                .unwrap_or(&request.params)
                .clone();
            let mut tuning = state.tuning.write().await;
            if let Err(e) = tuning.apply_patch(&patch) {
                let response =
                    Response::err(&request.id, format!("{}: {e}", messages::INVALID_PARAMS));
                drop(tuning);
                state.send_to_client(client_conn, &response).await;
                return;
            }
            let snapshot = serde_json::to_value(&*tuning).ok();
            drop(tuning);
            if !state.extension_connected().await {
                // No engine to notify; acknowledge with the merged record.
                let response =
                    Response::ok(&request.id, snapshot.unwrap_or(Value::Null));
                state.send_to_client(client_conn, &response).await;
                return;
            }
        },
        _ => {},
    }

    if !state.extension_connected().await {
        let response = Response::err(&request.id, messages::EXTENSION_NOT_CONNECTED);
        state.send_to_client(client_conn, &response).await;
        return;
    }

    // Inject the current tuning into the command payload.
    {
        let tuning = state.tuning.read().await;
        inject_tuning(&tuning, &mut request);
    }

    // Re-mint the correlation id; the client's own id comes back on the
    // response.
    let client_id = request.id.clone();
    let broker_id = state.next_correlation_id();
    request.id = broker_id.clone();

    // Arm the deadline: nominal timeout plus a grace so engine-level
    // timeouts can resolve first with their own message.
    let deadline_ms = effective_timeout_ms(&request.params) + TIMEOUT_GRACE_MS;
    let deadline = {
        let state = Arc::clone(state);
        let broker_id = broker_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(deadline_ms)).await;
            if let Some(record) = state.pending.lock().await.remove(&broker_id) {
                warn!(
                    action = %record.action,
                    deadline_ms,
                    "command deadline fired"
                );
                let response = Response::err(&record.client_id, messages::COMMAND_TIMEOUT);
                state.send_to_client(&record.client_conn, &response).await;
            }
        })
    };

    state.pending.lock().await.insert(broker_id.clone(), PendingRequest {
        client_conn: client_conn.to_string(),
        client_id,
        action: request.action.clone(),
        deadline,
    });

    let sent = {
        let extension = state.extension.read().await;
        match (extension.as_ref(), serde_json::to_string(&request)) {
            (Some(ext), Ok(frame)) => ext.send(&frame),
            _ => false,
        }
    };
    if !sent
        && let Some(record) = state.pending.lock().await.remove(&broker_id)
    {
        record.deadline.abort();
        let response = Response::err(&record.client_id, messages::EXTENSION_DISCONNECTED);
        state.send_to_client(client_conn, &response).await;
    }
}

/// Deliver an extension response to its waiting client. Late or unknown
/// replies are dropped silently.
pub(crate) async fn complete_request(state: &Arc<BrokerState>, response: Response) {
    let Some(record) = state.pending.lock().await.remove(&response.id) else {
        debug!(id = %response.id, "dropping late or unknown reply");
        return;
    };
    record.deadline.abort();
    let mut response = response.with_id(&record.client_id);
    if let Some(error) = response.error.take() {
        response.error = Some(decorate_error(&error));
    }
    state.send_to_client(&record.client_conn, &response).await;
}

/// Attach the runtime tuning to `dom.*`/`human.*` commands; for human
/// commands also union the avoid rules and overlay behaviour defaults.
pub(crate) fn inject_tuning(tuning: &Tuning, request: &mut Request) {
    if !actions::wants_tuning(&request.action) {
        return;
    }
    if !request.params.is_object() {
        request.params = Value::Object(serde_json::Map::new());
    }
    let Ok(tuning_value) = serde_json::to_value(tuning) else {
        return;
    };
    request.params[FRAMEWORK_CONFIG_FIELD] = tuning_value;

    if !actions::is_human(&request.action) {
        return;
    }

    // Global ∪ per-request avoid rules, union never replacement.
    let mut avoid: AvoidRules = request
        .params
        .get("avoid")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    avoid.union(&tuning.avoid);
    if let Ok(avoid_value) = serde_json::to_value(&avoid) {
        request.params["avoid"] = avoid_value;
    }

    // Behaviour defaults under `config`, request values winning.
    if let Some(defaults) = tuning.behaviour_defaults(&request.action) {
        let mut config = request
            .params
            .get("config")
            .cloned()
            .unwrap_or(Value::Null);
        overlay_defaults(&mut config, &defaults);
        request.params["config"] = config;
    }
}

/// Messages that suggest the loaded extension predates this broker get
/// restart guidance appended.
pub(crate) fn decorate_error(error: &str) -> String {
    let stale = error.contains(messages::UNKNOWN_ACTION) || error.contains("unknown action");
    if stale {
        format!("{error}{}", messages::STALE_EXTENSION_HINT)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn injects_framework_config_for_dom_and_human_only() {
        let tuning = Tuning::default();
        let mut dom = Request::new("1", "dom.querySelector", json!({"selector": "a"}));
        inject_tuning(&tuning, &mut dom);
        assert!(dom.params.get(FRAMEWORK_CONFIG_FIELD).is_some());
        // Non-human dom actions get no avoid/config overlay.
        assert!(dom.params.get("avoid").is_none());

        let mut tab = Request::new("2", "tabs.list", json!({}));
        inject_tuning(&tuning, &mut tab);
        assert!(tab.params.get(FRAMEWORK_CONFIG_FIELD).is_none());
    }

    #[test]
    fn human_actions_get_avoid_union_and_config_overlay() {
        let mut tuning = Tuning::default();
        tuning.avoid.classes.push("tracker".into());
        let mut request = Request::new(
            "3",
            "human.click",
            json!({
                "selector": "#go",
                "avoid": {"classes": ["sponsored"]},
                "config": {"thinkDelayMin": 7}
            }),
        );
        inject_tuning(&tuning, &mut request);

        let classes = request.params["avoid"]["classes"].as_array().unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0], "sponsored");
        assert_eq!(classes[1], "tracker");

        // Request config wins; defaults fill the gaps.
        assert_eq!(request.params["config"]["thinkDelayMin"], 7);
        assert_eq!(request.params["config"]["thinkDelayMax"], 400);
    }

    #[test]
    fn missing_params_become_an_object_before_injection() {
        let tuning = Tuning::default();
        let mut request = Request::new("4", "human.scroll", Value::Null);
        inject_tuning(&tuning, &mut request);
        assert!(request.params.is_object());
        assert!(request.params[FRAMEWORK_CONFIG_FIELD]["scroll"].is_object());
        assert_eq!(request.params["config"]["amountMin"], 300);
    }

    #[test]
    fn stale_errors_get_restart_guidance() {
        let decorated = decorate_error("Unknown action: dom.hover");
        assert!(decorated.contains("restart the browser"));
        assert_eq!(decorate_error("Element not found"), "Element not found");
    }
}
