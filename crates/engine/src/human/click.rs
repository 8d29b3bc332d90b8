//! The human-click pipeline.
//!
//! Ordered steps; each can abort with a refusal: resolve → avoid → traps →
//! scroll into comfortable view → cursor approach → think → re-validate →
//! dispatch through hit-testing. Whatever actually sits under the cursor
//! receives the events, so overlays get clicked exactly as they would in a
//! human session.

use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use {
    hb_page::{EventKind, PageEvent},
    hb_protocol::{ClickTuning, RefusalReason},
};

use crate::{
    avoid,
    engine::Engine,
    error::Result,
    human::{self, refusal, scroll, sleep_range},
    path::{self, PathStep},
    traps,
};

pub(crate) async fn run(engine: &Engine, params: &Value) -> Result<Value> {
    run_inner(engine, params, "clicked").await
}

/// The same pipeline with a caller-chosen refusal verb, so `human.type`
/// can report its focusing click as `{typed:false, ...}`.
pub(crate) async fn run_inner(engine: &Engine, params: &Value, verb: &str) -> Result<Value> {
    let tuning = human::effective_tuning(engine, params).await;
    let config: ClickTuning = human::merged_config(&tuning.click, params);
    let click_count = params
        .get("clickCount")
        .and_then(Value::as_u64)
        .unwrap_or(1);

    // Resolve and vet the target.
    let node = {
        let page = engine.page.lock().await;
        let mut handles = engine.handles.lock().await;
        let node = crate::resolve::target(&page, &mut handles, params)?;
        drop(handles);

        let mut rules = avoid::collect_rules(params);
        rules.union(&tuning.avoid);
        if avoid::matches(&page, node, &rules) {
            return Ok(refusal(verb, RefusalReason::Avoided, None));
        }
        if let Some(reason) = traps::detect(&page, node) {
            debug!(reason = reason.as_str(), "click refused by trap check");
            return Ok(refusal(verb, reason, None));
        }
        node
    };

    // Bring the element into the comfortable band.
    if !scroll::ensure_comfortable_view(engine, node).await? {
        return Ok(refusal(verb, RefusalReason::OffScreen, None));
    }

    // Plan the approach while holding no locks across the replay.
    let (steps, step_delays, think_ms, pre_rect) = {
        let page = engine.page.lock().await;
        let rect = page.bounding_rect(node);
        if rect.is_zero() {
            return Ok(refusal(verb, RefusalReason::ElementDisappeared, None));
        }
        let from = *engine.cursor.lock().await;
        let mut rng = rand::rng();
        let target_xy = path::target_point(rect, &mut rng);
        let steps = path::plan_approach(from, target_xy, &mut rng);
        let step_delays: Vec<u64> = steps.iter().map(|_| rng.random_range(6..=14)).collect();
        let think_ms = if config.think_delay_max > config.think_delay_min {
            rng.random_range(config.think_delay_min..=config.think_delay_max)
        } else {
            config.think_delay_min
        };
        (steps, step_delays, think_ms, rect)
    };

    replay_path(engine, &steps, &step_delays).await;

    // Think.
    tokio::time::sleep(std::time::Duration::from_millis(think_ms)).await;

    // Re-validate after the wait.
    {
        let page = engine.page.lock().await;
        let rect = page.bounding_rect(node);
        if rect.is_zero() {
            return Ok(refusal(verb, RefusalReason::ElementDisappeared, None));
        }
        let (dx, dy) = (rect.x - pre_rect.x, rect.y - pre_rect.y);
        if dx.abs() > config.max_shift_px || dy.abs() > config.max_shift_px {
            return Ok(refusal(
                verb,
                RefusalReason::ElementShifted,
                Some(json!({"dx": dx, "dy": dy})),
            ));
        }
    }

    // Dispatch on whatever is actually under the cursor.
    let (cx, cy) = *engine.cursor.lock().await;
    let mut page = engine.page.lock().await;
    let Some(hit) = page.element_from_point(cx, cy) else {
        // Nothing under the cursor: the click is physically impossible.
        // Abort silently, no confirmation.
        debug!(x = cx, y = cy, "nothing under cursor, click dropped");
        return Ok(Value::Null);
    };

    page.dispatch(PageEvent::mouse(EventKind::MouseDown, hit, cx, cy));
    // The original target receives focus on the first mousedown.
    page.focus(node);
    page.dispatch(PageEvent::mouse(EventKind::MouseUp, hit, cx, cy));
    page.dispatch(PageEvent::mouse(EventKind::Click, hit, cx, cy));

    if click_count == 2 {
        page.dispatch(PageEvent::mouse(EventKind::DblClick, hit, cx, cy));
    }
    if click_count == 3 {
        let is_text = page.element(node).map(|el| el.is_text_input()).unwrap_or(false);
        if is_text {
            let len = page.element(node)?.value.chars().count();
            page.set_selection_range(node, 0, len)?;
        }
    }

    Ok(json!({ "clicked": true, "x": cx, "y": cy }))
}

/// Replay a planned path: every step dispatches a `mousemove` on whatever
/// is under that point (or the body), updates the cursor, and feeds the
/// debug overlay.
pub(crate) async fn replay_path(engine: &Engine, steps: &[PathStep], delays: &[u64]) {
    for (i, step) in steps.iter().enumerate() {
        {
            let mut page = engine.page.lock().await;
            let target = page.element_from_point(step.x, step.y).unwrap_or(page.body());
            page.dispatch(PageEvent::mouse(EventKind::MouseMove, target, step.x, step.y));
            *engine.cursor.lock().await = (step.x, step.y);
            engine.overlay.lock().await.record(step.x, step.y);
        }
        let delay = delays.get(i).copied().unwrap_or(10);
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        if step.double_frame {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
}

/// `dom.mouseMoveTo`: the approach without the click.
pub(crate) async fn mouse_move_to(engine: &Engine, params: &Value) -> Result<Value> {
    let to = if let (Some(x), Some(y)) = (
        params.get("x").and_then(Value::as_f64),
        params.get("y").and_then(Value::as_f64),
    ) {
        (x, y)
    } else {
        let page = engine.page.lock().await;
        let mut handles = engine.handles.lock().await;
        let node = crate::resolve::target(&page, &mut handles, params)?;
        drop(handles);
        page.bounding_rect(node).center()
    };

    let (steps, delays) = {
        let from = *engine.cursor.lock().await;
        let mut rng = rand::rng();
        let steps = path::plan_approach(from, to, &mut rng);
        let delays: Vec<u64> = steps.iter().map(|_| rng.random_range(6..=14)).collect();
        (steps, delays)
    };
    replay_path(engine, &steps, &delays).await;
    let (x, y) = *engine.cursor.lock().await;
    Ok(json!({ "moved": true, "x": x, "y": y }))
}

/// A quiet sleep between triple-click presses.
pub(crate) async fn inter_click_pause() {
    sleep_range(60, 140).await;
}
