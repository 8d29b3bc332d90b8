//! The runtime tuning record.
//!
//! The broker owns one [`Tuning`] value (sourced from configuration,
//! mutable via `framework.setConfig`) and injects a copy into every
//! `dom.*`/`human.*` command. Engine code only ever reads the injected
//! copy, never live broker state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Groups ───────────────────────────────────────────────────────────────────

/// Element-handle lifetime management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandleTuning {
    pub ttl_ms: u64,
    pub cleanup_interval_ms: u64,
}

impl Default for HandleTuning {
    fn default() -> Self {
        Self {
            ttl_ms: 15 * 60 * 1000,
            cleanup_interval_ms: 60_000,
        }
    }
}

/// Visual debugging aids. None of these affect event semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugTuning {
    /// Cursor dot and bezier trail overlay.
    pub cursor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devtools: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_log: Option<bool>,
}

impl Default for DebugTuning {
    fn default() -> Self {
        Self {
            cursor: true,
            devtools: None,
            session_log: None,
        }
    }
}

/// Human-click pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClickTuning {
    pub think_delay_min: u64,
    pub think_delay_max: u64,
    /// Post-think position drift beyond which the click is refused.
    pub max_shift_px: f64,
}

impl Default for ClickTuning {
    fn default() -> Self {
        Self {
            think_delay_min: 150,
            think_delay_max: 400,
            max_shift_px: 50.0,
        }
    }
}

/// Human-type pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeTuning {
    pub base_delay_min: u64,
    pub base_delay_max: u64,
    pub variance: u64,
    /// Probability of an extra thinking pause between tokens.
    pub pause_chance: f64,
    pub pause_min: u64,
    pub pause_max: u64,
}

impl Default for TypeTuning {
    fn default() -> Self {
        Self {
            base_delay_min: 60,
            base_delay_max: 150,
            variance: 25,
            pause_chance: 0.12,
            pause_min: 300,
            pause_max: 900,
        }
    }
}

/// Human-scroll pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollTuning {
    pub amount_min: i64,
    pub amount_max: i64,
    /// Probability of a small counter-scroll after a flick.
    pub back_scroll_chance: f64,
    pub back_scroll_min: i64,
    pub back_scroll_max: i64,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            amount_min: 300,
            amount_max: 800,
            back_scroll_chance: 0.15,
            back_scroll_min: 15,
            back_scroll_max: 60,
        }
    }
}

/// Declarative filter of elements that human interaction must refuse.
/// Global rules merge with per-request rules by union, never replacement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidRules {
    pub selectors: Vec<String>,
    pub classes: Vec<String>,
    pub ids: Vec<String>,
    pub attributes: Vec<String>,
}

impl AvoidRules {
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attributes.is_empty()
    }

    /// Union `other` into `self`, preserving order and dropping duplicates.
    pub fn union(&mut self, other: &AvoidRules) {
        fn extend(into: &mut Vec<String>, from: &[String]) {
            for item in from {
                if !into.iter().any(|existing| existing == item) {
                    into.push(item.clone());
                }
            }
        }
        extend(&mut self.selectors, &other.selectors);
        extend(&mut self.classes, &other.classes);
        extend(&mut self.ids, &other.ids);
        extend(&mut self.attributes, &other.attributes);
    }
}

// ── The record ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub handles: HandleTuning,
    pub debug: DebugTuning,
    pub click: ClickTuning,
    #[serde(rename = "type")]
    pub type_: TypeTuning,
    pub scroll: ScrollTuning,
    pub avoid: AvoidRules,
}

impl Tuning {
    /// Apply a `framework.setConfig` patch: objects merge recursively,
    /// scalars and arrays replace. Unknown keys are preserved through the
    /// round-trip only insofar as they map onto known groups.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<(), serde_json::Error> {
        let mut current = serde_json::to_value(&*self)?;
        merge_value(&mut current, patch);
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// The per-behaviour defaults overlaid into `params.config` for a
    /// human action, keyed by the action suffix.
    pub fn behaviour_defaults(&self, action: &str) -> Option<Value> {
        let group = match action {
            crate::actions::HUMAN_CLICK | crate::actions::HUMAN_CLEAR_INPUT => {
                serde_json::to_value(&self.click)
            },
            crate::actions::HUMAN_TYPE => serde_json::to_value(&self.type_),
            crate::actions::HUMAN_SCROLL => serde_json::to_value(&self.scroll),
            _ => return None,
        };
        group.ok()
    }
}

// ── JSON merge helpers ───────────────────────────────────────────────────────

/// Deep-merge `patch` into `target`: objects recurse, everything else
/// replaces.
pub fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_value(existing, patch_val),
                    None => {
                        target_map.insert(key.clone(), patch_val.clone());
                    },
                }
            }
        },
        (target, patch) => *target = patch.clone(),
    }
}

/// Fill in `defaults` underneath `target`: keys already present in
/// `target` win, recursively. Used to overlay tuning defaults into a
/// request's `config` without clobbering caller choices.
pub fn overlay_defaults(target: &mut Value, defaults: &Value) {
    match (target, defaults) {
        (Value::Object(target_map), Value::Object(default_map)) => {
            for (key, default_val) in default_map {
                match target_map.get_mut(key) {
                    Some(existing) => overlay_defaults(existing, default_val),
                    None => {
                        target_map.insert(key.clone(), default_val.clone());
                    },
                }
            }
        },
        (target @ Value::Null, defaults) => *target = defaults.clone(),
        _ => {},
    }
}
