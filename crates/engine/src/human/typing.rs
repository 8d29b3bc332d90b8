//! The human-type pipeline.
//!
//! Focuses the target with the full click pipeline when needed, then
//! replays the tokenized text with per-token pacing: base delay ± variance
//! with a 50 ms floor, plus occasional longer thinking pauses.

use rand::Rng;
use serde_json::{Value, json};

use hb_protocol::{RefusalReason, TypeTuning};

use crate::{
    avoid,
    engine::Engine,
    error::{Error, Result},
    human::{self, click, refusal},
    keyboard::{self, Press},
    keys,
    resolve,
};

pub(crate) async fn run(engine: &Engine, params: &Value) -> Result<Value> {
    let text = params
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams("missing `text`".into()))?
        .to_string();
    let tuning = human::effective_tuning(engine, params).await;
    let config: TypeTuning = human::merged_config(&tuning.type_, params);

    if resolve::has_explicit_target(params) {
        let node = {
            let page = engine.page.lock().await;
            let mut handles = engine.handles.lock().await;
            let node = resolve::target(&page, &mut handles, params)?;
            drop(handles);

            let mut rules = avoid::collect_rules(params);
            rules.union(&tuning.avoid);
            if avoid::matches(&page, node, &rules) {
                return Ok(refusal("typed", RefusalReason::Avoided, None));
            }
            node
        };

        let already_focused = { engine.page.lock().await.focused() == Some(node) };
        if !already_focused {
            let outcome = click::run_inner(engine, params, "typed").await?;
            if outcome.is_null() {
                // The focusing click was physically impossible.
                return Ok(Value::Null);
            }
            if outcome.get("typed").is_some() {
                // A refusal, already phrased for typing.
                return Ok(outcome);
            }
        }
    } else if engine.page.lock().await.focused().is_none() {
        return Err(Error::ElementNotFound);
    }

    let tokens = keys::tokenize(&text);
    let delays: Vec<u64> = {
        let mut rng = rand::rng();
        tokens
            .iter()
            .map(|_| {
                let base = if config.base_delay_max > config.base_delay_min {
                    rng.random_range(config.base_delay_min..=config.base_delay_max)
                } else {
                    config.base_delay_min
                } as i64;
                let spread = if config.variance > 0 {
                    rng.random_range(-(config.variance as i64)..=config.variance as i64)
                } else {
                    0
                };
                let mut delay = (base + spread).max(50) as u64;
                if rng.random_bool(config.pause_chance.clamp(0.0, 1.0)) {
                    delay += rng.random_range(config.pause_min..=config.pause_max.max(config.pause_min));
                }
                delay
            })
            .collect()
    };

    for (token, delay) in tokens.iter().zip(delays.iter()) {
        keyboard::press(engine, token, Press::Full).await?;
        tokio::time::sleep(std::time::Duration::from_millis(*delay)).await;
    }

    Ok(json!({ "typed": true, "tokens": tokens.len() }))
}

/// `dom.type`: the same token machinery without approach, focus stealing,
/// or pacing.
pub(crate) async fn plain(engine: &Engine, params: &Value) -> Result<Value> {
    let text = params
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams("missing `text`".into()))?
        .to_string();

    if resolve::has_explicit_target(params) {
        let mut page = engine.page.lock().await;
        let mut handles = engine.handles.lock().await;
        let node = resolve::target(&page, &mut handles, params)?;
        drop(handles);
        page.focus(node);
    } else if engine.page.lock().await.focused().is_none() {
        return Err(Error::ElementNotFound);
    }

    let tokens = keys::tokenize(&text);
    for token in &tokens {
        keyboard::press(engine, token, Press::Full).await?;
    }
    Ok(json!({ "typed": true, "tokens": tokens.len() }))
}
