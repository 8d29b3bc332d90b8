//! The loopback WebSocket relay.
//!
//! One listener, any number of client sessions, at most one extension
//! session (classified by its first frame). Client requests are re-minted
//! with broker correlation ids, armed with clamped deadlines, enriched
//! with the runtime tuning record, and relayed to the extension; extension
//! events fan out to every client. The broker never forwards an event to
//! the extension.

mod config;
mod error;
mod relay;
mod server;
mod session;
mod state;

pub use {
    config::BrokerConfig,
    error::{Error, Result},
    server::Broker,
};
