//! The script-host seam.
//!
//! Clients pass a function body as an uninterpreted string; the only
//! component that can execute it is the browser. This trait is where the
//! browser would sit. The broker and bridge never parse the string — they
//! decide *where* it may run (which world, under which CSP) and hand it
//! over.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::{Error, Result},
    page::{NodeId, Page},
};

/// Execution world for a page function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum World {
    /// The page's own context: full access to page globals.
    Main,
    /// The extension's private context: DOM access only.
    Isolated,
}

/// What a page function produced.
#[derive(Debug, Clone)]
pub enum ScriptValue {
    Json(Value),
    /// A DOM element, to be routed into the handle registry.
    Element(NodeId),
}

/// Executes client-supplied function bodies against a page.
pub trait ScriptHost: Send + Sync {
    /// Whether the function body needs page JavaScript globals — if so the
    /// isolated-world fallback cannot run it.
    fn needs_page_globals(&self, body: &str) -> bool;

    fn call(&self, page: &mut Page, world: World, body: &str, args: &[Value])
    -> Result<ScriptValue>;

    /// Variant receiving a marked element as the function's first argument.
    fn call_with_element(
        &self,
        page: &mut Page,
        world: World,
        body: &str,
        element: NodeId,
        args: &[Value],
    ) -> Result<ScriptValue> {
        let _ = (page, world, element, args);
        Err(Error::ScriptFailed(format!(
            "element function not supported: {body}"
        )))
    }
}

/// A host with no functions installed. Every call fails, which is what a
/// deployment without a main-world bridge observes.
#[derive(Debug, Default)]
pub struct NoScripts;

impl ScriptHost for NoScripts {
    fn needs_page_globals(&self, _body: &str) -> bool {
        false
    }

    fn call(
        &self,
        _page: &mut Page,
        _world: World,
        body: &str,
        _args: &[Value],
    ) -> Result<ScriptValue> {
        Err(Error::ScriptFailed(format!("no script host: {body}")))
    }
}

type PlainFn = Box<dyn Fn(&mut Page, &[Value]) -> Result<ScriptValue> + Send + Sync>;
type ElementFn = Box<dyn Fn(&mut Page, NodeId, &[Value]) -> Result<ScriptValue> + Send + Sync>;

/// A canned-function host for tests and fixtures: function bodies are
/// looked up verbatim, never interpreted.
#[derive(Default)]
pub struct FixtureScripts {
    plain: HashMap<String, (bool, PlainFn)>,
    element: HashMap<String, (bool, ElementFn)>,
}

impl FixtureScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, body: impl Into<String>, needs_globals: bool, f: F)
    where
        F: Fn(&mut Page, &[Value]) -> Result<ScriptValue> + Send + Sync + 'static,
    {
        self.plain.insert(body.into(), (needs_globals, Box::new(f)));
    }

    pub fn register_element<F>(&mut self, body: impl Into<String>, needs_globals: bool, f: F)
    where
        F: Fn(&mut Page, NodeId, &[Value]) -> Result<ScriptValue> + Send + Sync + 'static,
    {
        self.element
            .insert(body.into(), (needs_globals, Box::new(f)));
    }

    /// The usual page-introspection functions clients send.
    pub fn with_standard_functions() -> Self {
        let mut scripts = Self::new();
        scripts.register("() => document.title", true, |page, _| {
            Ok(ScriptValue::Json(Value::String(page.title.clone())))
        });
        scripts.register("() => location.href", true, |page, _| {
            Ok(ScriptValue::Json(Value::String(page.url.clone())))
        });
        scripts.register("() => document.documentElement.outerHTML", false, |page, _| {
            Ok(ScriptValue::Json(Value::String(page.outer_html(page.root()))))
        });
        scripts.register("() => document.querySelector('h1')", false, |page, _| {
            page.query_selector("h1")?
                .map(ScriptValue::Element)
                .ok_or_else(|| Error::ScriptFailed("no h1 in document".into()))
        });
        scripts
    }
}

impl ScriptHost for FixtureScripts {
    fn needs_page_globals(&self, body: &str) -> bool {
        self.plain
            .get(body)
            .map(|(needs, _)| *needs)
            .or_else(|| self.element.get(body).map(|(needs, _)| *needs))
            .unwrap_or(false)
    }

    fn call(
        &self,
        page: &mut Page,
        world: World,
        body: &str,
        args: &[Value],
    ) -> Result<ScriptValue> {
        let (needs_globals, f) = self
            .plain
            .get(body)
            .ok_or_else(|| Error::ScriptFailed(format!("unknown page function: {body}")))?;
        if *needs_globals && world == World::Isolated {
            return Err(Error::NeedsPageGlobals);
        }
        f(page, args)
    }

    fn call_with_element(
        &self,
        page: &mut Page,
        world: World,
        body: &str,
        element: NodeId,
        args: &[Value],
    ) -> Result<ScriptValue> {
        let (needs_globals, f) = self
            .element
            .get(body)
            .ok_or_else(|| Error::ScriptFailed(format!("unknown element function: {body}")))?;
        if *needs_globals && world == World::Isolated {
            return Err(Error::NeedsPageGlobals);
        }
        f(page, element, args)
    }
}
