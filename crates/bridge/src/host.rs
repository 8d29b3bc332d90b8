//! The host-browser seam.
//!
//! Everything the bridge asks of the browser itself — tabs, cookies,
//! captures, frame enumeration — goes through [`HostBrowser`]. Production
//! binds this to the extension APIs; tests and fixtures use
//! [`HeadlessBrowser`], an in-memory host with one [`Page`] per tab.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use {
    async_trait::async_trait,
    image::{Rgba, RgbaImage},
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, broadcast},
};

use hb_page::{Page, ScriptHost, fixture};

use crate::error::{Error, Result};

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub active: bool,
    #[serde(rename = "windowId")]
    pub window_id: i64,
    pub index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
}

fn default_cookie_path() -> String {
    "/".into()
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameInfo {
    #[serde(rename = "frameId")]
    pub frame_id: i64,
    pub url: String,
    #[serde(rename = "parentFrameId")]
    pub parent_frame_id: i64,
}

/// Browser-originated happenings the bridge turns into protocol events.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Full navigation or SPA history mutation.
    UrlChanged { tab_id: i64, url: String },
    /// An HTTP response observed in some tab.
    Response {
        tab_id: i64,
        url: String,
        status: u16,
        method: String,
    },
}

// ── The trait ────────────────────────────────────────────────────────────────

#[async_trait]
pub trait HostBrowser: Send + Sync {
    async fn tabs(&self) -> Vec<TabInfo>;
    async fn active_tab(&self) -> Option<i64>;
    async fn create_tab(&self, url: &str) -> Result<TabInfo>;
    async fn close_tab(&self, tab_id: i64) -> Result<()>;
    async fn activate_tab(&self, tab_id: i64) -> Result<()>;
    /// Begin a navigation; completion is observed via [`Self::tab_status`].
    async fn navigate(&self, tab_id: i64, url: &str) -> Result<()>;
    async fn reload(&self, tab_id: i64) -> Result<()>;
    async fn tab_status(&self, tab_id: i64) -> Result<TabStatus>;
    async fn set_viewport(&self, tab_id: i64, width: f64, height: f64) -> Result<()>;

    /// The tab's main-frame page (frame 0 only; iframes would collide in
    /// the handle registry).
    async fn page(&self, tab_id: i64) -> Result<Arc<Mutex<Page>>>;

    async fn cookies(&self) -> Vec<Cookie>;
    async fn set_cookie(&self, cookie: Cookie) -> Result<()>;
    async fn frames(&self, tab_id: i64) -> Result<Vec<FrameInfo>>;

    /// Capture the currently visible viewport at device-pixel resolution.
    async fn capture_visible(&self, tab_id: i64) -> Result<RgbaImage>;

    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
    fn scripts(&self) -> Arc<dyn ScriptHost>;
}

// ── Headless implementation ──────────────────────────────────────────────────

struct HeadlessTab {
    url: String,
    active: bool,
    status: TabStatus,
    page: Arc<Mutex<Page>>,
}

type PageFactory = Box<dyn Fn(&str, &mut Page) + Send + Sync>;

/// In-memory host: a tab store, a cookie jar, and a page per tab.
pub struct HeadlessBrowser {
    tabs: Mutex<BTreeMap<i64, HeadlessTab>>,
    next_tab_id: AtomicI64,
    cookies: Mutex<Vec<Cookie>>,
    events: broadcast::Sender<HostEvent>,
    scripts: Arc<dyn ScriptHost>,
    /// Builds document content after `begin_document` for a URL.
    factory: PageFactory,
    viewport: Mutex<(f64, f64)>,
    device_pixel_ratio: f64,
}

impl HeadlessBrowser {
    pub fn new() -> Arc<Self> {
        Self::with_factory(Box::new(|url, page| {
            if url.contains("fixtures") {
                fixture::build_test_page(page);
                // Navigation keeps the real URL it was given.
                page.url = url.to_string();
            }
        }))
    }

    pub fn with_factory(factory: PageFactory) -> Arc<Self> {
        Self::with_parts(
            factory,
            Arc::new(hb_page::FixtureScripts::with_standard_functions()),
        )
    }

    pub fn with_parts(factory: PageFactory, scripts: Arc<dyn ScriptHost>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            tabs: Mutex::new(BTreeMap::new()),
            next_tab_id: AtomicI64::new(1),
            cookies: Mutex::new(Vec::new()),
            events,
            scripts,
            factory,
            viewport: Mutex::new((1280.0, 720.0)),
            device_pixel_ratio: 1.0,
        })
    }

    /// Push a synthetic HTTP response observation, as the webRequest hook
    /// would.
    pub fn observe_response(&self, tab_id: i64, url: &str, status: u16, method: &str) {
        let _ = self.events.send(HostEvent::Response {
            tab_id,
            url: url.to_string(),
            status,
            method: method.to_string(),
        });
    }

    pub async fn put_cookie(&self, cookie: Cookie) {
        self.cookies.lock().await.push(cookie);
    }

    /// An SPA history mutation: the URL changes without replacing the
    /// document, so the content script survives but `urlChanged` fires.
    pub async fn history_push(&self, tab_id: i64, url: &str) -> Result<()> {
        let page = {
            let mut tabs = self.tabs.lock().await;
            let tab = tabs.get_mut(&tab_id).ok_or(Error::TabNotFound(tab_id))?;
            tab.url = url.to_string();
            Arc::clone(&tab.page)
        };
        page.lock().await.url = url.to_string();
        self.emit_url_changed(tab_id, url);
        Ok(())
    }

    fn emit_url_changed(&self, tab_id: i64, url: &str) {
        let _ = self.events.send(HostEvent::UrlChanged {
            tab_id,
            url: url.to_string(),
        });
    }
}

#[async_trait]
impl HostBrowser for HeadlessBrowser {
    async fn tabs(&self) -> Vec<TabInfo> {
        let tabs = self.tabs.lock().await;
        let mut out = Vec::with_capacity(tabs.len());
        for (index, (id, tab)) in tabs.iter().enumerate() {
            let title = tab.page.lock().await.title.clone();
            out.push(TabInfo {
                id: *id,
                url: tab.url.clone(),
                title,
                active: tab.active,
                window_id: 1,
                index: index as i64,
            });
        }
        out
    }

    async fn active_tab(&self) -> Option<i64> {
        self.tabs
            .lock()
            .await
            .iter()
            .find(|(_, tab)| tab.active)
            .map(|(id, _)| *id)
    }

    async fn create_tab(&self, url: &str) -> Result<TabInfo> {
        let id = self.next_tab_id.fetch_add(1, Ordering::Relaxed);
        let (width, height) = *self.viewport.lock().await;
        let mut page = Page::new(width, height);
        page.device_pixel_ratio = self.device_pixel_ratio;
        page.begin_document(url);
        (self.factory)(url, &mut page);
        let title = page.title.clone();

        let mut tabs = self.tabs.lock().await;
        for tab in tabs.values_mut() {
            tab.active = false;
        }
        let index = tabs.len() as i64;
        tabs.insert(id, HeadlessTab {
            url: url.to_string(),
            active: true,
            status: TabStatus::Complete,
            page: Arc::new(Mutex::new(page)),
        });
        drop(tabs);

        self.emit_url_changed(id, url);
        self.observe_response(id, url, 200, "GET");
        Ok(TabInfo {
            id,
            url: url.to_string(),
            title,
            active: true,
            window_id: 1,
            index,
        })
    }

    async fn close_tab(&self, tab_id: i64) -> Result<()> {
        let mut tabs = self.tabs.lock().await;
        tabs.remove(&tab_id).ok_or(Error::TabNotFound(tab_id))?;
        if !tabs.values().any(|t| t.active)
            && let Some(first) = tabs.values_mut().next()
        {
            first.active = true;
        }
        Ok(())
    }

    async fn activate_tab(&self, tab_id: i64) -> Result<()> {
        let mut tabs = self.tabs.lock().await;
        if !tabs.contains_key(&tab_id) {
            return Err(Error::TabNotFound(tab_id));
        }
        for (id, tab) in tabs.iter_mut() {
            tab.active = *id == tab_id;
        }
        Ok(())
    }

    async fn navigate(&self, tab_id: i64, url: &str) -> Result<()> {
        let page = {
            let mut tabs = self.tabs.lock().await;
            let tab = tabs.get_mut(&tab_id).ok_or(Error::TabNotFound(tab_id))?;
            tab.url = url.to_string();
            tab.status = TabStatus::Complete;
            Arc::clone(&tab.page)
        };
        {
            let mut page = page.lock().await;
            page.begin_document(url);
            (self.factory)(url, &mut page);
        }
        self.emit_url_changed(tab_id, url);
        self.observe_response(tab_id, url, 200, "GET");
        Ok(())
    }

    async fn reload(&self, tab_id: i64) -> Result<()> {
        let url = {
            let tabs = self.tabs.lock().await;
            tabs.get(&tab_id)
                .ok_or(Error::TabNotFound(tab_id))?
                .url
                .clone()
        };
        self.navigate(tab_id, &url).await
    }

    async fn tab_status(&self, tab_id: i64) -> Result<TabStatus> {
        let tabs = self.tabs.lock().await;
        tabs.get(&tab_id)
            .map(|t| t.status)
            .ok_or(Error::TabNotFound(tab_id))
    }

    async fn set_viewport(&self, tab_id: i64, width: f64, height: f64) -> Result<()> {
        *self.viewport.lock().await = (width, height);
        let tabs = self.tabs.lock().await;
        let tab = tabs.get(&tab_id).ok_or(Error::TabNotFound(tab_id))?;
        let mut page = tab.page.lock().await;
        page.viewport_width = width;
        page.viewport_height = height;
        Ok(())
    }

    async fn page(&self, tab_id: i64) -> Result<Arc<Mutex<Page>>> {
        let tabs = self.tabs.lock().await;
        tabs.get(&tab_id)
            .map(|t| Arc::clone(&t.page))
            .ok_or(Error::TabNotFound(tab_id))
    }

    async fn cookies(&self) -> Vec<Cookie> {
        self.cookies.lock().await.clone()
    }

    async fn set_cookie(&self, cookie: Cookie) -> Result<()> {
        let mut cookies = self.cookies.lock().await;
        cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
        cookies.push(cookie);
        Ok(())
    }

    async fn frames(&self, tab_id: i64) -> Result<Vec<FrameInfo>> {
        let tabs = self.tabs.lock().await;
        let tab = tabs.get(&tab_id).ok_or(Error::TabNotFound(tab_id))?;
        Ok(vec![FrameInfo {
            frame_id: 0,
            url: tab.url.clone(),
            parent_frame_id: -1,
        }])
    }

    async fn capture_visible(&self, tab_id: i64) -> Result<RgbaImage> {
        let page = self.page(tab_id).await?;
        let page = page.lock().await;
        let width = (page.viewport_width * page.device_pixel_ratio) as u32;
        let height = (page.viewport_height * page.device_pixel_ratio) as u32;
        // Encode the scroll offset into the pixels so stitched output is
        // verifiable slice by slice.
        let band = ((page.scroll_y / 10.0) as u8).wrapping_mul(7);
        Ok(RgbaImage::from_pixel(
            width.max(1),
            height.max(1),
            Rgba([band, 255 - band, 128, 255]),
        ))
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    fn scripts(&self) -> Arc<dyn ScriptHost> {
        Arc::clone(&self.scripts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_navigate_and_list_tabs() {
        let host = HeadlessBrowser::new();
        let tab = host.create_tab("http://127.0.0.1:3456/fixtures.html").await.unwrap();
        assert_eq!(tab.id, 1);
        assert!(tab.active);
        assert_eq!(tab.title, fixture::TEST_PAGE_TITLE);

        host.navigate(tab.id, "https://example.test/plain").await.unwrap();
        let tabs = host.tabs().await;
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].url, "https://example.test/plain");
        // Non-fixture navigation produces an empty document.
        assert_eq!(tabs[0].title, "");
    }

    #[tokio::test]
    async fn navigation_bumps_page_epoch() {
        let host = HeadlessBrowser::new();
        let tab = host.create_tab("http://127.0.0.1:3456/fixtures.html").await.unwrap();
        let page = host.page(tab.id).await.unwrap();
        let before = page.lock().await.epoch;
        host.reload(tab.id).await.unwrap();
        assert!(page.lock().await.epoch > before);
    }

    #[tokio::test]
    async fn events_fan_out_to_subscribers() {
        let host = HeadlessBrowser::new();
        let mut rx = host.subscribe();
        host.create_tab("https://a.test/").await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, HostEvent::UrlChanged { tab_id: 1, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, HostEvent::Response { status: 200, .. }));
    }

    #[tokio::test]
    async fn set_cookie_replaces_same_name_and_domain() {
        let host = HeadlessBrowser::new();
        host.set_cookie(Cookie {
            name: "sid".into(),
            value: "one".into(),
            domain: "a.test".into(),
            path: "/".into(),
            expiration_date: None,
        })
        .await
        .unwrap();
        host.set_cookie(Cookie {
            name: "sid".into(),
            value: "two".into(),
            domain: "a.test".into(),
            path: "/".into(),
            expiration_date: None,
        })
        .await
        .unwrap();
        let cookies = host.cookies().await;
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "two");
    }

    #[tokio::test]
    async fn history_push_changes_url_without_a_new_document() {
        let host = HeadlessBrowser::new();
        let tab = host
            .create_tab("http://127.0.0.1:3456/fixtures.html")
            .await
            .unwrap();
        let page = host.page(tab.id).await.unwrap();
        let epoch = page.lock().await.epoch;
        let mut rx = host.subscribe();

        host.history_push(tab.id, "http://127.0.0.1:3456/fixtures.html#step-2")
            .await
            .unwrap();

        // Same document instance, new URL, one urlChanged.
        assert_eq!(page.lock().await.epoch, epoch);
        assert!(page.lock().await.url.ends_with("#step-2"));
        let event = rx.recv().await.unwrap();
        match event {
            HostEvent::UrlChanged { url, .. } => assert!(url.ends_with("#step-2")),
            other => panic!("expected urlChanged, got {other:?}"),
        }
    }
}
