//! Per-tab interaction engine.
//!
//! One [`Engine`] is one content-script instance: it owns the element
//! handle registry (with its TTL sweeper), the cursor/modifier/overlay
//! state, and executes every DOM and human-behaviour action against the
//! tab's page. A navigation replaces the instance wholesale, which is also
//! what empties the registry.

mod avoid;
mod engine;
mod error;
mod handles;
mod human;
mod keyboard;
mod keys;
mod overlay;
mod path;
mod queries;
mod resolve;
mod traps;

pub use {
    engine::Engine,
    error::{Error, Result},
    handles::HandleRegistry,
    keys::{Token, tokenize},
};
