//! The page-bridge: the long-lived extension-side runtime.
//!
//! Owns the outbound WebSocket to the broker, dispatches every command to
//! one of three paths (host-native APIs, the per-tab interaction engine,
//! or the CSP evaluation ladder), persists the cursor across navigations,
//! and forwards browser events upstream.

mod connection;
mod dispatch;
mod error;
mod evaluate;
pub mod host;
pub mod screenshot;
mod tabs;

pub use {
    connection::{BridgeConfig, PageBridge},
    dispatch::BridgeCore,
    error::{Error, Result},
    host::{Cookie, FrameInfo, HeadlessBrowser, HostBrowser, HostEvent, TabInfo, TabStatus},
};
