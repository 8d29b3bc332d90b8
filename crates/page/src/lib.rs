//! In-memory page model.
//!
//! One [`Page`] is one tab's main frame as the content script sees it from
//! the isolated world: an element arena with resolved styles and boxes, a
//! selector engine, focus and form state, window/element scrolling, a log
//! of every synthesized event, and the page's effective script CSP. The
//! interaction engine executes against this model; the real browser sits
//! behind the [`script::ScriptHost`] seam.

pub mod csp;
pub mod error;
pub mod events;
pub mod fixture;
pub mod geometry;
pub mod page;
pub mod script;
pub mod selector;
pub mod style;

pub use {
    csp::CspPolicy,
    error::{Error, Result},
    events::{EventKind, Modifiers, PageEvent},
    geometry::{Rect, distance},
    page::{Element, ElementInit, NodeId, Page},
    script::{FixtureScripts, NoScripts, ScriptHost, ScriptValue, World},
    style::{Display, Overflow, PointerEvents, Position, Style, Visibility},
};
