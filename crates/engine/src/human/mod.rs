//! Human-behaviour pipelines.
//!
//! Each pipeline is an explicit async state machine: all randomness is
//! drawn while planning, and every sleep is a suspension point where
//! navigation or a deadline can cancel the work. Refusals are ordinary
//! results with `reason` set, never errors.

pub(crate) mod clear;
pub(crate) mod click;
pub(crate) mod scroll;
pub(crate) mod typing;

use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use hb_protocol::{FRAMEWORK_CONFIG_FIELD, RefusalReason, Tuning, merge_value};

use crate::engine::Engine;

/// Build a refusal result: `{<verb>: false, reason, detail?}`.
pub(crate) fn refusal(verb: &str, reason: RefusalReason, detail: Option<Value>) -> Value {
    let mut out = json!({ verb: false, "reason": reason });
    if let Some(detail) = detail {
        out["detail"] = detail;
    }
    out
}

/// Sleep a uniformly random duration from `[min_ms, max_ms]`.
pub(crate) async fn sleep_range(min_ms: u64, max_ms: u64) {
    let ms = {
        let mut rng = rand::rng();
        if max_ms > min_ms {
            rng.random_range(min_ms..=max_ms)
        } else {
            min_ms
        }
    };
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

/// The tuning record in effect for this command: the broker-injected copy
/// when present, the engine's own record otherwise.
pub(crate) async fn effective_tuning(engine: &Engine, params: &Value) -> Tuning {
    if let Some(injected) = params.get(FRAMEWORK_CONFIG_FIELD)
        && let Ok(tuning) = serde_json::from_value::<Tuning>(injected.clone())
    {
        return tuning;
    }
    engine.tuning.lock().await.clone()
}

/// Overlay the request's `config` onto a behaviour group, request winning.
pub(crate) fn merged_config<T>(base: &T, params: &Value) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(overrides) = params.get("config").filter(|v| v.is_object()) else {
        return base.clone();
    };
    let Ok(mut merged) = serde_json::to_value(base) else {
        return base.clone();
    };
    merge_value(&mut merged, overrides);
    serde_json::from_value(merged).unwrap_or_else(|_| base.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_protocol::ClickTuning;

    #[test]
    fn merged_config_prefers_request_values() {
        let base = ClickTuning::default();
        let params = json!({"config": {"thinkDelayMin": 1, "thinkDelayMax": 2}});
        let merged: ClickTuning = merged_config(&base, &params);
        assert_eq!(merged.think_delay_min, 1);
        assert_eq!(merged.think_delay_max, 2);
        assert_eq!(merged.max_shift_px, base.max_shift_px);
    }

    #[test]
    fn refusal_shape() {
        let value = refusal("clicked", RefusalReason::OpacityZero, None);
        assert_eq!(value["clicked"], false);
        assert_eq!(value["reason"], "opacity-zero");
        assert!(value.get("detail").is_none());
    }
}
