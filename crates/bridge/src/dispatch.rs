//! Command dispatch: the three execution paths.
//!
//! 1. Browser-native actions go straight to the host APIs.
//! 2. Tab-scoped DOM/human actions go to the per-tab engine (the content
//!    script), injected on demand and replaced after navigations.
//! 3. Page-world evaluation goes through the CSP ladder.

use std::{collections::HashMap, sync::Arc};

use {
    serde_json::{Value, json},
    tokio::sync::Mutex,
    tracing::debug,
};

use {hb_engine::Engine, hb_protocol::actions};

use crate::{
    error::{Error, Result},
    evaluate,
    host::HostBrowser,
    tabs,
};

pub struct BridgeCore {
    pub(crate) host: Arc<dyn HostBrowser>,
    /// One engine per tab: the injected content-script instance.
    engines: Mutex<HashMap<i64, Arc<Engine>>>,
    /// Last reported cursor position per tab, served to the next
    /// content-script instance after a navigation.
    cursors: Mutex<HashMap<i64, (f64, f64)>>,
}

impl BridgeCore {
    pub fn new(host: Arc<dyn HostBrowser>) -> Arc<Self> {
        Arc::new(Self {
            host,
            engines: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
        })
    }

    /// Execute one command against its path. Human refusals are results;
    /// errors become `{id, error}` frames at the connection layer.
    pub async fn execute(
        &self,
        action: &str,
        tab_id: Option<i64>,
        params: &Value,
    ) -> Result<Value> {
        if actions::is_browser_native(action) {
            return tabs::handle(self.host.as_ref(), action, tab_id, params).await;
        }
        if actions::is_evaluation(action) {
            let tab = tabs::require_tab(self.host.as_ref(), tab_id).await?;
            return evaluate::run(self, tab, action, params).await;
        }
        match action {
            actions::FRAMEWORK_RELOAD => {
                // Drop every content-script instance; the next command
                // re-injects.
                let mut engines = self.engines.lock().await;
                for engine in engines.values() {
                    engine.shutdown().await;
                }
                engines.clear();
                Ok(json!({ "reloaded": true }))
            },
            actions::CURSOR_GET_POSITION => {
                let tab = tabs::require_tab(self.host.as_ref(), tab_id).await?;
                let cursors = self.cursors.lock().await;
                let (x, y) = cursors.get(&tab).copied().unwrap_or((0.0, 0.0));
                Ok(json!({ "x": x, "y": y }))
            },
            actions::CURSOR_REPORT_POSITION => {
                let tab = tabs::require_tab(self.host.as_ref(), tab_id).await?;
                let x = params.get("x").and_then(Value::as_f64).unwrap_or(0.0);
                let y = params.get("y").and_then(Value::as_f64).unwrap_or(0.0);
                self.cursors.lock().await.insert(tab, (x, y));
                if let Some(engine) = self.engines.lock().await.get(&tab) {
                    engine.set_cursor(x, y).await;
                }
                Ok(json!({ "ok": true }))
            },
            _ => {
                // Tab-scoped: content script in the main frame.
                let tab = tabs::require_tab(self.host.as_ref(), tab_id).await?;
                let engine = self.engine_for(tab).await?;
                let result = engine.handle(action, params).await;
                // If the instance went stale under us (navigation landed
                // between injection and execution), inject once and retry.
                let current_epoch = {
                    let page = self.host.page(tab).await?;
                    let epoch = page.lock().await.epoch;
                    epoch
                };
                let result = if engine.epoch() != current_epoch {
                    debug!(tab, "content script stale, re-injecting and retrying once");
                    let engine = self.engine_for(tab).await?;
                    engine.handle(action, params).await
                } else {
                    result
                };
                // Cache the cursor so it survives the next navigation.
                if let Ok(engine) = self.engine_for(tab).await {
                    let (x, y) = engine.cursor().await;
                    self.cursors.lock().await.insert(tab, (x, y));
                }
                result.map_err(Error::Engine)
            },
        }
    }

    /// The tab's engine, injecting a fresh content-script instance when
    /// none exists or the page has navigated since the last one.
    pub(crate) async fn engine_for(&self, tab: i64) -> Result<Arc<Engine>> {
        let page = self.host.page(tab).await?;
        let epoch = { page.lock().await.epoch };

        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(&tab)
            && engine.epoch() == epoch
        {
            return Ok(Arc::clone(engine));
        }

        if let Some(stale) = engines.remove(&tab) {
            stale.shutdown().await;
        }
        let engine = Engine::new(page).await;
        // Resume the cursor where the previous instance left it.
        if let Some((x, y)) = self.cursors.lock().await.get(&tab).copied() {
            engine.set_cursor(x, y).await;
        }
        engines.insert(tab, Arc::clone(&engine));
        debug!(tab, epoch, "content script injected");
        Ok(engine)
    }
}
