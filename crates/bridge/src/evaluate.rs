//! Page-world evaluation: the CSP fallback ladder.
//!
//! The function body stays an uninterpreted string; only the script host —
//! the browser — ever executes it. This module decides *where* it may run:
//!
//! 1. Inline `<script>` injection with an attribute result channel — needs
//!    `unsafe-inline` or no `script-src` at all.
//! 2. Scripting API in the main world — needs `unsafe-eval`.
//! 3. The isolated world — always executes, but has no page globals.

use std::time::Duration;

use {
    serde_json::{Value, json},
    tracing::debug,
};

use {
    hb_page::{ElementInit, NodeId, ScriptValue, World},
    hb_protocol::actions,
};

use crate::{
    dispatch::BridgeCore,
    error::{Error, Result},
};

/// Cap on the inline rung's mutation-observer pickup.
const INLINE_PICKUP_TIMEOUT_MS: u64 = 5_000;
/// Marker attribute for element-scoped evaluation.
const EVAL_MARKER_ATTR: &str = "data-hb-eval";
/// Attribute the inline wrapper writes its serialized result to.
const RESULT_ATTR: &str = "data-hb-result";

pub(crate) async fn run(
    core: &BridgeCore,
    tab: i64,
    action: &str,
    params: &Value,
) -> Result<Value> {
    let body = params
        .get("fn")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams("missing `fn`".into()))?
        .to_string();
    let args: Vec<Value> = params
        .get("args")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match action {
        actions::DOM_EVALUATE => {
            let outcome = ladder(core, tab, &body, &args, None).await?;
            Ok(plain_value(outcome))
        },
        actions::DOM_ELEMENT_EVALUATE => {
            // The engine's resolution rules apply: handle beats selector,
            // missing element is a typed error.
            let engine = core.engine_for(tab).await?;
            let node = engine.resolve_node(params).await.map_err(Error::Engine)?;
            let outcome = ladder(core, tab, &body, &args, Some(node)).await?;
            Ok(plain_value(outcome))
        },
        actions::DOM_EVALUATE_HANDLE => {
            let outcome = ladder(core, tab, &body, &args, None).await?;
            match outcome {
                ScriptValue::Element(node) => {
                    let engine = core.engine_for(tab).await?;
                    let handle = engine.register_element(node).await;
                    Ok(json!({ "type": "element", "handleId": handle }))
                },
                ScriptValue::Json(value) => Ok(json!({ "type": "value", "value": value })),
            }
        },
        other => Err(Error::UnknownAction(other.to_string())),
    }
}

fn plain_value(outcome: ScriptValue) -> Value {
    match outcome {
        ScriptValue::Json(value) => value,
        ScriptValue::Element(_) => Value::Null,
    }
}

/// Try each rung in order; fall through on failure.
async fn ladder(
    core: &BridgeCore,
    tab: i64,
    body: &str,
    args: &[Value],
    element: Option<NodeId>,
) -> Result<ScriptValue> {
    let page = core.host.page(tab).await?;
    let scripts = core.host.scripts();
    let csp = { page.lock().await.csp };
    let mut timed_out = false;

    // Rung 1: inline <script> with an attribute result channel.
    if csp.permits_inline() {
        let attempt = tokio::time::timeout(
            Duration::from_millis(INLINE_PICKUP_TIMEOUT_MS),
            async {
                let mut page = page.lock().await;
                let carrier = page.add(
                    ElementInit::tag("span").attr("style", "display:none"),
                );
                let result = call(&scripts, &mut page, World::Main, body, element, args);
                if let Ok(ScriptValue::Json(value)) = &result {
                    // The wrapper serializes into the carrier attribute;
                    // the isolated world picks it up and removes the node.
                    page.set_attribute(carrier, RESULT_ATTR, value.to_string());
                }
                page.detach(carrier);
                result
            },
        )
        .await;
        match attempt {
            Ok(Ok(outcome)) => return Ok(outcome),
            Ok(Err(e)) => debug!(error = %e, "inline injection rung failed"),
            Err(_) => {
                debug!("inline injection rung timed out");
                timed_out = true;
            },
        }
    }

    // Rung 2: scripting API in the main world.
    if csp.permits_eval() {
        let mut page = page.lock().await;
        match call(&scripts, &mut page, World::Main, body, element, args) {
            Ok(outcome) => return Ok(outcome),
            Err(e) => debug!(error = %e, "main-world scripting rung failed"),
        }
    }

    // Rung 3: the isolated world. No page globals here.
    {
        let mut page = page.lock().await;
        match call(&scripts, &mut page, World::Isolated, body, element, args) {
            Ok(outcome) => return Ok(outcome),
            Err(e) => debug!(error = %e, "isolated-world rung failed"),
        }
    }

    if timed_out {
        Err(Error::EvaluateTimedOut)
    } else {
        Err(Error::EvaluateFailedAllWorlds)
    }
}

/// One rung's actual call, with element marking when scoped.
fn call(
    scripts: &std::sync::Arc<dyn hb_page::ScriptHost>,
    page: &mut hb_page::Page,
    world: World,
    body: &str,
    element: Option<NodeId>,
    args: &[Value],
) -> hb_page::Result<ScriptValue> {
    match element {
        Some(node) => {
            // Mark, run with the marked element as first argument, unmark.
            let marker = format!("m{}", page.epoch);
            page.set_attribute(node, EVAL_MARKER_ATTR, marker);
            let result = scripts.call_with_element(page, world, body, node, args);
            page.remove_attribute(node, EVAL_MARKER_ATTR);
            result
        },
        None => scripts.call(page, world, body, args),
    }
}
