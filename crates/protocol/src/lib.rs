//! Broker WebSocket protocol definitions.
//!
//! All communication is JSON text frames over a single loopback WebSocket.
//! Three message families share the wire:
//!
//! - `Request`  — client → broker → extension command (`{id, tabId?, action, params}`)
//! - `Response` — extension → broker → client result (`{id, result}` / `{id, error}`)
//! - `ControlFrame` — `type`-tagged frames: `ping`/`pong` keepalive, the
//!   extension `handshake`, and unsolicited `event` broadcasts
//!
//! Requests carry no `type` tag, so incoming frames are classified
//! structurally with [`parse_incoming`].

mod envelope;
mod tuning;

pub mod actions;

pub use {
    envelope::{ControlFrame, EventData, Incoming, Request, Response, parse_incoming},
    tuning::{
        AvoidRules, ClickTuning, DebugTuning, HandleTuning, ScrollTuning, Tuning, TypeTuning,
        merge_value, overlay_defaults,
    },
};

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// Protocol version carried in the extension handshake. Mismatches are
/// logged by the broker but never refused.
pub const PROTOCOL_VERSION: &str = "1.4";
/// Default broker listen port.
pub const DEFAULT_PORT: u16 = 7331;
/// Default per-command deadline when the request does not override it.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
/// Lower clamp for `params.timeout`.
pub const MIN_COMMAND_TIMEOUT_MS: u64 = 100;
/// Upper clamp for `params.timeout`.
pub const MAX_COMMAND_TIMEOUT_MS: u64 = 60_000;
/// Grace added on top of the nominal deadline so engine-side timeouts can
/// resolve first with their own message.
pub const TIMEOUT_GRACE_MS: u64 = 2_000;
/// Interval between broker → extension keepalive pings.
pub const KEEPALIVE_INTERVAL_MS: u64 = 20_000;
/// Interval between `cookiesChanged` polls on the extension side.
pub const COOKIE_POLL_INTERVAL_MS: u64 = 2_000;
/// Reserved params field the broker uses to attach runtime tuning.
pub const FRAMEWORK_CONFIG_FIELD: &str = "__frameworkConfig";

// ── Error messages ───────────────────────────────────────────────────────────

/// Canonical error strings returned in `{id, error}` frames. The taxonomy is
/// part of the contract: clients match on these to decide retry behaviour.
pub mod messages {
    pub const EXTENSION_NOT_CONNECTED: &str = "Extension not connected";
    pub const EXTENSION_DISCONNECTED: &str = "Extension disconnected";
    pub const CONNECTION_TIMEOUT: &str = "Timed out waiting for extension connection";
    pub const COMMAND_TIMEOUT: &str = "Command timed out";
    pub const UNKNOWN_ACTION: &str = "Unknown action";
    pub const INVALID_PARAMS: &str = "Invalid params";
    pub const NO_TABS: &str = "No tabs available";
    pub const ELEMENT_NOT_FOUND: &str = "Element not found";
    pub const HANDLE_NOT_FOUND: &str = "Handle not found";
    pub const HANDLE_GONE: &str = "Handle is stale (element was garbage collected)";
    pub const EVALUATE_TIMED_OUT: &str = "Evaluate timed out";
    pub const EVALUATE_FAILED_ALL_WORLDS: &str = "Evaluate failed in all execution worlds";
    pub const BROKER_CLOSED: &str = "Broker closed";

    /// Appended to errors that suggest the loaded extension predates the
    /// running broker.
    pub const STALE_EXTENSION_HINT: &str =
        " (the extension may be stale; restart the browser to reload it)";
}

// ── Human-pipeline refusals ──────────────────────────────────────────────────

/// Why a human interaction declined to act. Refusals travel as normal
/// results (`{clicked:false, reason}`), never as error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefusalReason {
    Avoided,
    SvgElement,
    AriaHidden,
    #[serde(rename = "no-offsetParent")]
    NoOffsetParent,
    HoneypotClass,
    OpacityZero,
    VisibilityHidden,
    SubPixel,
    NoBoundingBox,
    OffScreen,
    ElementDisappeared,
    ElementShifted,
}

impl RefusalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avoided => "avoided",
            Self::SvgElement => "svg-element",
            Self::AriaHidden => "aria-hidden",
            Self::NoOffsetParent => "no-offsetParent",
            Self::HoneypotClass => "honeypot-class",
            Self::OpacityZero => "opacity-zero",
            Self::VisibilityHidden => "visibility-hidden",
            Self::SubPixel => "sub-pixel",
            Self::NoBoundingBox => "no-bounding-box",
            Self::OffScreen => "off-screen",
            Self::ElementDisappeared => "element-disappeared",
            Self::ElementShifted => "element-shifted",
        }
    }
}

// ── Timeout clamping ─────────────────────────────────────────────────────────

/// Resolve the nominal deadline for a command from its params.
///
/// A positive finite `params.timeout` is clamped to
/// `[MIN_COMMAND_TIMEOUT_MS, MAX_COMMAND_TIMEOUT_MS]`; anything else falls
/// back to [`DEFAULT_COMMAND_TIMEOUT_MS`].
pub fn effective_timeout_ms(params: &serde_json::Value) -> u64 {
    match params.get("timeout").and_then(serde_json::Value::as_f64) {
        Some(t) if t.is_finite() && t > 0.0 => {
            (t as u64).clamp(MIN_COMMAND_TIMEOUT_MS, MAX_COMMAND_TIMEOUT_MS)
        },
        _ => DEFAULT_COMMAND_TIMEOUT_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_defaults_when_absent_or_invalid() {
        assert_eq!(effective_timeout_ms(&json!({})), 30_000);
        assert_eq!(effective_timeout_ms(&json!({"timeout": 0})), 30_000);
        assert_eq!(effective_timeout_ms(&json!({"timeout": -5})), 30_000);
        assert_eq!(effective_timeout_ms(&json!({"timeout": "soon"})), 30_000);
    }

    #[test]
    fn timeout_clamps_to_bounds() {
        assert_eq!(effective_timeout_ms(&json!({"timeout": 1})), 100);
        assert_eq!(effective_timeout_ms(&json!({"timeout": 5_000})), 5_000);
        assert_eq!(effective_timeout_ms(&json!({"timeout": 600_000})), 60_000);
    }

    #[test]
    fn refusal_reasons_serialize_kebab_case() {
        let v = serde_json::to_value(RefusalReason::NoOffsetParent).unwrap();
        assert_eq!(v, json!("no-offsetParent"));
        let v = serde_json::to_value(RefusalReason::HoneypotClass).unwrap();
        assert_eq!(v, json!("honeypot-class"));
        let back: RefusalReason = serde_json::from_value(json!("opacity-zero")).unwrap();
        assert_eq!(back, RefusalReason::OpacityZero);
    }
}
