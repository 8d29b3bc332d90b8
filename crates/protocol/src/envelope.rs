//! Wire envelope: the three frame shapes and structural classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Request ──────────────────────────────────────────────────────────────────

/// A command frame. `id` is any unique string minted by the sender; the
/// broker re-mints its own correlation id before relaying and restores the
/// original on the way back. `tabId` absent means the active tab of the
/// focused window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "tabId", skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, action: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            tab_id: None,
            action: action.into(),
            params,
        }
    }

    pub fn with_tab(mut self, tab_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A result frame. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// Re-address this response with the id the original sender used.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

// ── Control frames ───────────────────────────────────────────────────────────

/// Payload of an unsolicited `{type:"event"}` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// `type`-tagged frames: keepalive, handshake, and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlFrame {
    Ping,
    Pong,
    /// First frame of the extension session. Any connection whose first
    /// message is not a handshake is a client session.
    Handshake {
        #[serde(rename = "extensionId")]
        extension_id: String,
        version: String,
    },
    Event(EventData),
}

impl ControlFrame {
    pub fn event(event: impl Into<String>, data: Value) -> Self {
        Self::Event(EventData {
            event: event.into(),
            data,
        })
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Any frame read off a socket.
#[derive(Debug, Clone)]
pub enum Incoming {
    Control(ControlFrame),
    Request(Request),
    Response(Response),
}

/// Classify a raw text frame.
///
/// Frames with a `type` field are control frames; frames with an `action`
/// are requests; anything else with an `id` is a response. Requests are
/// checked before responses because responses have no required field
/// besides `id`.
pub fn parse_incoming(text: &str) -> Result<Incoming, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("type").is_some() {
        return serde_json::from_value(value).map(Incoming::Control);
    }
    if value.get("action").is_some() {
        return serde_json::from_value(value).map(Incoming::Request);
    }
    serde_json::from_value(value).map(Incoming::Response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request() {
        let frame = r#"{"id":"hb_1","action":"tabs.list","params":{}}"#;
        match parse_incoming(frame).unwrap() {
            Incoming::Request(req) => {
                assert_eq!(req.id, "hb_1");
                assert_eq!(req.action, "tabs.list");
                assert!(req.tab_id.is_none());
            },
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_response_by_absence_of_action() {
        let ok = r#"{"id":"hb_2","result":{"tabs":[]}}"#;
        let err = r#"{"id":"hb_3","error":"Element not found"}"#;
        assert!(matches!(
            parse_incoming(ok).unwrap(),
            Incoming::Response(Response { result: Some(_), .. })
        ));
        match parse_incoming(err).unwrap() {
            Incoming::Response(resp) => {
                assert_eq!(resp.error.as_deref(), Some("Element not found"));
            },
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_control_frames() {
        assert!(matches!(
            parse_incoming(r#"{"type":"ping"}"#).unwrap(),
            Incoming::Control(ControlFrame::Ping)
        ));
        assert!(matches!(
            parse_incoming(r#"{"type":"pong"}"#).unwrap(),
            Incoming::Control(ControlFrame::Pong)
        ));
        match parse_incoming(r#"{"type":"handshake","extensionId":"abc","version":"1.4"}"#).unwrap()
        {
            Incoming::Control(ControlFrame::Handshake {
                extension_id,
                version,
            }) => {
                assert_eq!(extension_id, "abc");
                assert_eq!(version, "1.4");
            },
            other => panic!("expected handshake, got {other:?}"),
        }
    }

    #[test]
    fn event_round_trips() {
        let frame = ControlFrame::event("urlChanged", json!({"tabId": 3, "url": "https://a/"}));
        let text = serde_json::to_string(&frame).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "urlChanged");
        assert_eq!(value["data"]["tabId"], 3);
        match parse_incoming(&text).unwrap() {
            Incoming::Control(ControlFrame::Event(ev)) => assert_eq!(ev.event, "urlChanged"),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn tab_id_round_trips() {
        let req = Request::new("r1", "dom.click", json!({"selector": "#go"})).with_tab(17);
        let text = serde_json::to_string(&req).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["tabId"], 17);
    }
}
