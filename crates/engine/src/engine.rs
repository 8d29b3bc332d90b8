//! Per-tab engine: owns the handle registry, cursor, modifier and overlay
//! state for one content-script instance, and dispatches every
//! `dom.*`/`human.*`/`framework.*` action. Actions on one tab run strictly
//! one at a time.

use std::{sync::Arc, time::Duration};

use {
    serde_json::{Value, json},
    tokio::{sync::Mutex, task::JoinHandle, time::Instant},
    tracing::debug,
};

use {
    hb_page::{Modifiers, Page},
    hb_protocol::{Tuning, actions},
};

use crate::{
    error::{Error, Result},
    handles::HandleRegistry,
    human, keyboard,
    keyboard::Press,
    overlay::OverlayState,
    queries,
};

/// Poll interval backing `waitForSelector`'s mutation observation.
const WAIT_POLL_MS: u64 = 100;
/// Default `waitForSelector` timeout when the request has none.
const WAIT_DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub struct Engine {
    pub(crate) page: Arc<Mutex<Page>>,
    pub(crate) handles: Arc<Mutex<HandleRegistry>>,
    pub(crate) cursor: Mutex<(f64, f64)>,
    pub(crate) modifiers: Mutex<Modifiers>,
    pub(crate) overlay: Mutex<OverlayState>,
    pub(crate) tuning: Mutex<Tuning>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Serializes actions: one mouse path / typing stream per tab.
    op_lock: Mutex<()>,
    /// The page epoch this instance was injected for. A navigation bumps
    /// the page's epoch, telling the bridge this instance is stale.
    epoch: u64,
}

impl Engine {
    /// A fresh content-script instance for the page's current document.
    /// Starts with an empty registry and the sweeper running.
    pub async fn new(page: Arc<Mutex<Page>>) -> Arc<Self> {
        let epoch = page.lock().await.epoch;
        let tuning = Tuning::default();
        let handles = Arc::new(Mutex::new(HandleRegistry::new()));
        let engine = Arc::new(Self {
            page: Arc::clone(&page),
            handles: Arc::clone(&handles),
            cursor: Mutex::new((0.0, 0.0)),
            modifiers: Mutex::new(Modifiers::default()),
            overlay: Mutex::new(OverlayState::default()),
            sweeper: Mutex::new(None),
            op_lock: Mutex::new(()),
            epoch,
            tuning: Mutex::new(tuning.clone()),
        });
        let task = spawn_sweeper(
            page,
            handles,
            tuning.handles.ttl_ms,
            tuning.handles.cleanup_interval_ms,
        );
        *engine.sweeper.lock().await = Some(task);
        engine
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn cursor(&self) -> (f64, f64) {
        *self.cursor.lock().await
    }

    pub async fn set_cursor(&self, x: f64, y: f64) {
        *self.cursor.lock().await = (x, y);
    }

    /// Stop the sweeper. Called when the bridge discards a stale instance.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().await.take() {
            task.abort();
        }
    }

    /// Register an element produced outside the query paths (page-world
    /// evaluation routes element results back through here).
    pub async fn register_element(&self, node: hb_page::NodeId) -> String {
        self.handles.lock().await.store(node)
    }

    /// Resolve a `handleId`/`selector` params pair to a node, with the
    /// usual precedence and error taxonomy. Used by the bridge for
    /// element-scoped evaluation.
    pub async fn resolve_node(&self, params: &Value) -> Result<hb_page::NodeId> {
        let page = self.page.lock().await;
        let mut handles = self.handles.lock().await;
        crate::resolve::target(&page, &mut handles, params)
    }

    /// Execute one action. Errors become `{id, error}` frames upstream;
    /// human refusals are ordinary results.
    pub async fn handle(&self, action: &str, params: &Value) -> Result<Value> {
        let _serialized = self.op_lock.lock().await;
        debug!(action, "engine action");
        match action {
            actions::DOM_QUERY_SELECTOR => self.with_page(params, queries::query_selector).await,
            actions::DOM_QUERY_SELECTOR_ALL => {
                self.with_page(params, queries::query_selector_all).await
            },
            actions::DOM_QUERY_SELECTOR_WITHIN => {
                self.with_page(params, queries::query_selector_within).await
            },
            actions::DOM_QUERY_SELECTOR_ALL_WITHIN => {
                self.with_page(params, queries::query_selector_all_within)
                    .await
            },
            actions::DOM_WAIT_FOR_SELECTOR => self.wait_for_selector(params).await,
            actions::DOM_BOUNDING_BOX => self.with_page(params, queries::bounding_box).await,
            actions::DOM_GET_ATTRIBUTE => self.with_page(params, queries::get_attribute).await,
            actions::DOM_GET_PROPERTY => self.with_page(params, queries::get_property).await,
            actions::DOM_GET_HTML => {
                let page = self.page.lock().await;
                queries::get_html(&page)
            },
            actions::DOM_ELEMENT_HTML => self.with_page(params, queries::element_html).await,
            actions::DOM_QUERY_ALL_INFO => self.with_page(params, queries::query_all_info).await,
            actions::DOM_BATCH_QUERY => {
                let page = self.page.lock().await;
                queries::batch_query(&page, params)
            },
            actions::DOM_FIND_SCROLLABLE => {
                let page = self.page.lock().await;
                let mut handles = self.handles.lock().await;
                queries::find_scrollable(&page, &mut handles)
            },
            actions::DOM_DISCOVER_ELEMENTS => {
                let page = self.page.lock().await;
                let mut handles = self.handles.lock().await;
                queries::discover_elements(&page, &mut handles)
            },

            // dom.click IS the human pipeline; the bare synthetic form is
            // never the observable contract.
            actions::DOM_CLICK | actions::HUMAN_CLICK => human::click::run(self, params).await,
            actions::DOM_MOUSE_MOVE_TO => human::click::mouse_move_to(self, params).await,
            actions::DOM_FOCUS => self.focus_action(params).await,
            actions::DOM_TYPE => human::typing::plain(self, params).await,
            actions::DOM_KEY_PRESS => keyboard::key_action(self, params, Press::Full).await,
            actions::DOM_KEY_DOWN => keyboard::key_action(self, params, Press::Down).await,
            actions::DOM_KEY_UP => keyboard::key_action(self, params, Press::Up).await,
            actions::DOM_SCROLL => human::scroll::plain(self, params).await,
            actions::DOM_SET_VALUE => keyboard::set_value(self, params).await,
            actions::DOM_SET_DEBUG => self.set_debug(params).await,

            actions::HUMAN_TYPE => human::typing::run(self, params).await,
            actions::HUMAN_SCROLL => human::scroll::run(self, params).await,
            actions::HUMAN_CLEAR_INPUT => human::clear::run(self, params).await,

            actions::FRAMEWORK_SET_CONFIG => self.set_config(params).await,
            actions::FRAMEWORK_GET_CONFIG => self.get_config().await,

            actions::CURSOR_GET_POSITION => {
                let (x, y) = self.cursor().await;
                Ok(json!({ "x": x, "y": y }))
            },
            actions::CURSOR_REPORT_POSITION => {
                let x = params.get("x").and_then(Value::as_f64).unwrap_or(0.0);
                let y = params.get("y").and_then(Value::as_f64).unwrap_or(0.0);
                self.set_cursor(x, y).await;
                Ok(json!({ "ok": true }))
            },

            other => Err(Error::UnknownAction(other.to_string())),
        }
    }

    async fn with_page<F>(&self, params: &Value, f: F) -> Result<Value>
    where
        F: FnOnce(&Page, &mut HandleRegistry, &Value) -> Result<Value>,
    {
        let page = self.page.lock().await;
        let mut handles = self.handles.lock().await;
        f(&page, &mut handles, params)
    }

    async fn focus_action(&self, params: &Value) -> Result<Value> {
        let mut page = self.page.lock().await;
        let mut handles = self.handles.lock().await;
        let node = crate::resolve::target(&page, &mut handles, params)?;
        drop(handles);
        page.focus(node);
        Ok(json!({ "focused": true }))
    }

    async fn set_debug(&self, params: &Value) -> Result<Value> {
        let cursor = params
            .get("cursor")
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::InvalidParams("missing `cursor`".into()))?;
        self.overlay.lock().await.set_enabled(cursor);
        let mut tuning = self.tuning.lock().await;
        tuning.debug.cursor = cursor;
        Ok(json!({ "debug": { "cursor": cursor } }))
    }

    /// Polls via mutation notification with a user-supplied timeout; on
    /// expiry returns the null sentinel, never an error.
    async fn wait_for_selector(&self, params: &Value) -> Result<Value> {
        let selector = params
            .get("selector")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidParams("missing `selector`".into()))?
            .to_string();
        let timeout_ms = params
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(WAIT_DEFAULT_TIMEOUT_MS);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            let notify = {
                let page = self.page.lock().await;
                match page.query_selector(&selector)? {
                    Some(node) => {
                        let mut handles = self.handles.lock().await;
                        return Ok(queries::element_summary(&page, &mut handles, node));
                    },
                    None => page.mutation_notify(),
                }
            };
            tokio::select! {
                _ = notify.notified() => {},
                _ = tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)) => {},
                _ = tokio::time::sleep_until(deadline) => return Ok(Value::Null),
            }
        }
    }

    async fn set_config(&self, params: &Value) -> Result<Value> {
        let patch = params
            .get("config")
            .filter(|v| v.is_object())
            .unwrap_or(params);
        let mut tuning = self.tuning.lock().await;
        let handles_before = tuning.handles.clone();
        tuning
            .apply_patch(patch)
            .map_err(|e| Error::InvalidParams(e.to_string()))?;
        let snapshot =
            serde_json::to_value(&*tuning).map_err(|e| Error::InvalidParams(e.to_string()))?;
        let handle_tuning = tuning.handles.clone();
        let sweeper_stale = handle_tuning != handles_before;
        drop(tuning);

        // New TTL or interval only applies to a fresh sweeper.
        if sweeper_stale {
            let mut sweeper = self.sweeper.lock().await;
            if let Some(task) = sweeper.take() {
                task.abort();
            }
            *sweeper = Some(spawn_sweeper(
                Arc::clone(&self.page),
                Arc::clone(&self.handles),
                handle_tuning.ttl_ms,
                handle_tuning.cleanup_interval_ms,
            ));
            debug!(
                ttl_ms = handle_tuning.ttl_ms,
                interval_ms = handle_tuning.cleanup_interval_ms,
                "handle sweeper restarted"
            );
        }
        Ok(snapshot)
    }

    async fn get_config(&self) -> Result<Value> {
        let tuning = self.tuning.lock().await;
        serde_json::to_value(&*tuning).map_err(|e| Error::InvalidParams(e.to_string()))
    }
}

fn spawn_sweeper(
    page: Arc<Mutex<Page>>,
    handles: Arc<Mutex<HandleRegistry>>,
    ttl_ms: u64,
    interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(interval_ms.max(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let page = page.lock().await;
            let mut handles = handles.lock().await;
            let evicted = handles.sweep(&page, ttl_ms);
            if evicted > 0 {
                debug!(evicted, remaining = handles.len(), "handle sweep");
            }
        }
    })
}
