//! Browser-native actions: tabs, cookies, frames.

use std::time::Duration;

use serde_json::{Value, json};

use hb_protocol::actions;

use crate::{
    error::{Error, Result},
    host::{Cookie, HostBrowser, TabStatus},
    screenshot,
};

/// Cap on waiting for a tab to report `complete`.
const NAVIGATION_TIMEOUT_MS: u64 = 30_000;
const NAVIGATION_POLL_MS: u64 = 50;

pub(crate) async fn handle(
    host: &dyn HostBrowser,
    action: &str,
    tab_id: Option<i64>,
    params: &Value,
) -> Result<Value> {
    match action {
        actions::TABS_LIST => {
            let tabs = host.tabs().await;
            Ok(serde_json::to_value(tabs).unwrap_or(Value::Null))
        },
        actions::TABS_CREATE => {
            let url = str_param(params, "url")?;
            let tab = host.create_tab(url).await?;
            Ok(serde_json::to_value(tab).unwrap_or(Value::Null))
        },
        actions::TABS_NAVIGATE => {
            let url = str_param(params, "url")?;
            let tab = require_tab(host, tab_id).await?;
            host.navigate(tab, url).await?;
            wait_for_complete(host, tab).await?;
            Ok(json!({ "navigated": true, "tabId": tab, "url": url }))
        },
        actions::TABS_RELOAD => {
            let tab = require_tab(host, tab_id).await?;
            host.reload(tab).await?;
            wait_for_complete(host, tab).await?;
            Ok(json!({ "reloaded": true, "tabId": tab }))
        },
        actions::TABS_CLOSE => {
            let tab = require_tab(host, tab_id).await?;
            host.close_tab(tab).await?;
            Ok(json!({ "closed": true, "tabId": tab }))
        },
        actions::TABS_ACTIVATE => {
            let tab = require_tab(host, tab_id).await?;
            host.activate_tab(tab).await?;
            Ok(json!({ "activated": true, "tabId": tab }))
        },
        actions::TABS_WAIT_FOR_NAVIGATION => {
            let tab = require_tab(host, tab_id).await?;
            wait_for_complete(host, tab).await?;
            let url = host
                .tabs()
                .await
                .into_iter()
                .find(|t| t.id == tab)
                .map(|t| t.url)
                .unwrap_or_default();
            Ok(json!({ "complete": true, "tabId": tab, "url": url }))
        },
        actions::TABS_SET_VIEWPORT => {
            let tab = require_tab(host, tab_id).await?;
            let width = num_param(params, "width")?;
            let height = num_param(params, "height")?;
            host.set_viewport(tab, width, height).await?;
            Ok(json!({ "width": width, "height": height }))
        },
        actions::TABS_SCREENSHOT => {
            let tab = require_tab(host, tab_id).await?;
            let full_page = params
                .get("fullPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let data_url = if full_page {
                screenshot::full_page(host, tab).await?
            } else {
                screenshot::viewport(host, tab).await?
            };
            Ok(json!({ "dataUrl": data_url }))
        },

        actions::COOKIES_GET_ALL => {
            let cookies = host.cookies().await;
            Ok(serde_json::to_value(cookies).unwrap_or(Value::Null))
        },
        actions::COOKIES_SET => {
            let cookie: Cookie = serde_json::from_value(
                params.get("cookie").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| Error::InvalidParams(format!("cookie: {e}")))?;
            host.set_cookie(cookie).await?;
            Ok(json!({ "set": true }))
        },

        actions::FRAMES_LIST => {
            let tab = require_tab(host, tab_id).await?;
            let frames = host.frames(tab).await?;
            Ok(serde_json::to_value(frames).unwrap_or(Value::Null))
        },

        other => Err(Error::UnknownAction(other.to_string())),
    }
}

/// The target tab: explicit id, or the active tab of the focused window.
pub(crate) async fn require_tab(host: &dyn HostBrowser, tab_id: Option<i64>) -> Result<i64> {
    if let Some(id) = tab_id {
        return Ok(id);
    }
    host.active_tab().await.ok_or(Error::NoTabs)
}

async fn wait_for_complete(host: &dyn HostBrowser, tab_id: i64) -> Result<()> {
    let deadline =
        tokio::time::Instant::now() + Duration::from_millis(NAVIGATION_TIMEOUT_MS);
    loop {
        match host.tab_status(tab_id).await? {
            TabStatus::Complete => return Ok(()),
            TabStatus::Loading => {},
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::NavigationTimeout(format!("tab {tab_id}")));
        }
        tokio::time::sleep(Duration::from_millis(NAVIGATION_POLL_MS)).await;
    }
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams(format!("missing `{name}`")))
}

fn num_param(params: &Value, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::InvalidParams(format!("missing `{name}`")))
}
