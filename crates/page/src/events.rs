//! Synthesized-event records.
//!
//! Every event the interaction engine dispatches is appended to the page's
//! log with its real target and coordinates. Tests assert on exact
//! sequences; nothing here is observable to page scripts beyond the log.

use crate::page::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MouseMove,
    MouseDown,
    MouseUp,
    Click,
    DblClick,
    KeyDown,
    KeyPress,
    KeyUp,
    Input,
    Change,
    Focus,
    Blur,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MouseMove => "mousemove",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::DblClick => "dblclick",
            Self::KeyDown => "keydown",
            Self::KeyPress => "keypress",
            Self::KeyUp => "keyup",
            Self::Input => "input",
            Self::Change => "change",
            Self::Focus => "focus",
            Self::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub kind: EventKind,
    pub target: NodeId,
    /// Viewport coordinates for mouse events; zero otherwise.
    pub x: f64,
    pub y: f64,
    pub key: Option<String>,
    pub code: Option<String>,
    pub key_code: u32,
    pub char_code: u32,
    pub modifiers: Modifiers,
}

impl PageEvent {
    pub fn mouse(kind: EventKind, target: NodeId, x: f64, y: f64) -> Self {
        Self {
            kind,
            target,
            x,
            y,
            key: None,
            code: None,
            key_code: 0,
            char_code: 0,
            modifiers: Modifiers::default(),
        }
    }

    pub fn key(
        kind: EventKind,
        target: NodeId,
        key: impl Into<String>,
        code: impl Into<String>,
        key_code: u32,
        char_code: u32,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            kind,
            target,
            x: 0.0,
            y: 0.0,
            key: Some(key.into()),
            code: Some(code.into()),
            key_code,
            char_code,
            modifiers,
        }
    }

    pub fn simple(kind: EventKind, target: NodeId) -> Self {
        Self::mouse(kind, target, 0.0, 0.0)
    }
}
