//! Human scrolling: flick sequences, back-scrolls, and the
//! comfortable-view routine the click pipeline leans on.

use rand::Rng;
use serde_json::{Value, json};

use {
    hb_page::{NodeId, Page},
    hb_protocol::ScrollTuning,
};

use crate::{
    engine::Engine,
    error::Result,
    human::{self, sleep_range},
};

/// Viewport band the element's top must land in to count as comfortable.
const BAND_TOP: f64 = 0.15;
const BAND_BOTTOM: f64 = 0.85;
/// Fallback flick attempts before giving up on reaching the band.
const MAX_VIEW_FLICKS: usize = 20;

fn top_in_band(page: &Page, node: NodeId) -> bool {
    let rect = page.bounding_rect(node);
    if rect.is_zero() {
        return false;
    }
    let viewport = page.viewport_height;
    let top_fraction = rect.y / viewport;
    if (BAND_TOP..=BAND_BOTTOM).contains(&top_fraction) {
        return true;
    }
    // Fully visible with the window pinned at a scroll limit: no amount
    // of scrolling brings it closer to centre, so it counts as reachable.
    let fully_visible = rect.y >= 0.0 && rect.bottom() <= viewport;
    if fully_visible {
        if top_fraction < BAND_TOP && page.scroll_y <= 0.0 {
            return true;
        }
        if top_fraction > BAND_BOTTOM && page.scroll_y >= page.max_scroll_y() {
            return true;
        }
    }
    false
}

/// Bring the element's top into the 15–85% viewport band.
///
/// First a smooth centre scroll with a settle wait; if that is not enough,
/// up to [`MAX_VIEW_FLICKS`] human-scroll flicks. `false` means the element
/// never entered the band.
pub(crate) async fn ensure_comfortable_view(engine: &Engine, node: NodeId) -> Result<bool> {
    {
        let mut page = engine.page.lock().await;
        if top_in_band(&page, node) {
            return Ok(true);
        }
        page.scroll_into_view_center(node);
    }
    sleep_range(400, 700).await;

    for _ in 0..MAX_VIEW_FLICKS {
        let amount = {
            let page = engine.page.lock().await;
            if top_in_band(&page, node) {
                return Ok(true);
            }
            let rect = page.bounding_rect(node);
            let direction = if rect.is_zero() || rect.y > page.viewport_height * BAND_BOTTOM {
                1.0
            } else {
                -1.0
            };
            let magnitude = {
                let mut rng = rand::rng();
                rng.random_range(150.0..=350.0)
            };
            direction * magnitude
        };
        {
            let mut page = engine.page.lock().await;
            page.scroll_window_by(0.0, amount);
        }
        sleep_range(150, 400).await;
    }

    let page = engine.page.lock().await;
    Ok(top_in_band(&page, node))
}

// ── human.scroll ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Flick {
    amount: f64,
    pause_ms: u64,
    /// A small counter-scroll after this flick: (amount, pre-pause ms).
    back: Option<(f64, u64)>,
}

enum ScrollTarget {
    Window,
    Element(NodeId),
}

pub(crate) async fn run(engine: &Engine, params: &Value) -> Result<Value> {
    let tuning = human::effective_tuning(engine, params).await;
    let config: ScrollTuning = human::merged_config(&tuning.scroll, params);

    let direction = match params.get("direction").and_then(Value::as_str) {
        Some("up") => -1.0,
        _ => 1.0,
    };

    // Pick the scroll target: a scrollable handle/selector match, else the
    // window.
    let target = {
        let page = engine.page.lock().await;
        let mut handles = engine.handles.lock().await;
        match crate::resolve::target(&page, &mut handles, params) {
            Ok(node) if is_scrollable(&page, node) => ScrollTarget::Element(node),
            _ => ScrollTarget::Window,
        }
    };

    // Plan the whole gesture up front.
    let (total, flicks) = {
        let mut rng = rand::rng();
        let total = params
            .get("amount")
            .and_then(Value::as_f64)
            .filter(|a| *a > 0.0)
            .unwrap_or_else(|| {
                rng.random_range(config.amount_min as f64..=config.amount_max as f64)
            });
        let flick_size = params.get("flickSize").and_then(Value::as_f64);
        let mut flicks = Vec::new();
        let mut remaining = total;
        while remaining > 0.0 {
            let size = flick_size
                .unwrap_or_else(|| rng.random_range(150.0..=350.0))
                .min(remaining);
            let back = if rng.random_bool(config.back_scroll_chance.clamp(0.0, 1.0)) {
                Some((
                    rng.random_range(config.back_scroll_min as f64..=config.back_scroll_max as f64),
                    rng.random_range(200..=300u64),
                ))
            } else {
                None
            };
            flicks.push(Flick {
                amount: size,
                pause_ms: rng.random_range(150..=400),
                back,
            });
            remaining -= size;
        }
        (total, flicks)
    };

    for flick in &flicks {
        apply_scroll(engine, &target, direction * flick.amount).await?;
        tokio::time::sleep(std::time::Duration::from_millis(flick.pause_ms)).await;
        if let Some((back_amount, pre_pause)) = flick.back {
            tokio::time::sleep(std::time::Duration::from_millis(pre_pause)).await;
            apply_scroll(engine, &target, -direction * back_amount).await?;
        }
    }

    // Settle.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    Ok(json!({ "scrolled": true, "amount": total }))
}

async fn apply_scroll(engine: &Engine, target: &ScrollTarget, delta: f64) -> Result<()> {
    let mut page = engine.page.lock().await;
    match target {
        ScrollTarget::Window => page.scroll_window_by(0.0, delta),
        ScrollTarget::Element(node) => {
            page.scroll_element_by(*node, delta)?;
        },
    }
    Ok(())
}

fn is_scrollable(page: &Page, node: NodeId) -> bool {
    page.element(node)
        .map(|el| el.style.clips_overflow() && el.scroll_height > el.client_height() + 20.0)
        .unwrap_or(false)
}

// ── dom.scroll ───────────────────────────────────────────────────────────────

/// The exact, non-human variant. `before == after` tells callers they hit
/// the end of the content.
pub(crate) async fn plain(engine: &Engine, params: &Value) -> Result<Value> {
    let amount = params.get("amount").and_then(Value::as_f64).unwrap_or(300.0);
    let direction = match params.get("direction").and_then(Value::as_str) {
        Some("up") => -1.0,
        _ => 1.0,
    };

    let mut page = engine.page.lock().await;
    let mut handles = engine.handles.lock().await;
    let target = match crate::resolve::target(&page, &mut handles, params) {
        Ok(node) if is_scrollable(&page, node) => ScrollTarget::Element(node),
        _ => ScrollTarget::Window,
    };
    drop(handles);

    let (before, after, label) = match target {
        ScrollTarget::Window => {
            let before = page.scroll_y;
            page.scroll_window_by(0.0, direction * amount);
            (before, page.scroll_y, "window")
        },
        ScrollTarget::Element(node) => {
            let (before, after) = page.scroll_element_by(node, direction * amount)?;
            (before, after, "element")
        },
    };

    Ok(json!({
        "scrolled": before != after,
        "before": before,
        "after": after,
        "target": label,
    }))
}
