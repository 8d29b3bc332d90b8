//! The element-handle registry.
//!
//! Handles are short opaque ids (`el_<n>`, monotonic per content-script
//! instance) mapping to elements in this tab's isolated world. The host
//! runtime offers no weak DOM references, so entries hold plain node ids
//! and are invalidated through `is_connected` checks and a periodic sweep.
//! Handles are never transmitted to, or meaningful in, any other tab.

use std::collections::HashMap;

use tokio::time::Instant;

use hb_page::{NodeId, Page};

use crate::error::{Error, Result};

struct Entry {
    node: NodeId,
    last_accessed: Instant,
}

#[derive(Default)]
pub struct HandleRegistry {
    entries: HashMap<String, Entry>,
    next: u64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element and mint its handle.
    pub fn store(&mut self, node: NodeId) -> String {
        self.next += 1;
        let id = format!("el_{}", self.next);
        self.entries.insert(id.clone(), Entry {
            node,
            last_accessed: Instant::now(),
        });
        id
    }

    /// Resolve a handle to its element.
    ///
    /// A handle that was never registered (or already swept) fails with
    /// `HandleNotFound`; one whose element left the document fails with
    /// `HandleGone`. Never a silent miss, never a different element.
    pub fn resolve(&mut self, page: &Page, id: &str) -> Result<NodeId> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::HandleNotFound(id.to_string()))?;
        if !page.is_connected(entry.node) {
            return Err(Error::HandleGone(id.to_string()));
        }
        entry.last_accessed = Instant::now();
        Ok(entry.node)
    }

    /// Drop entries idle past `ttl_ms` or whose element is disconnected.
    /// Returns how many were evicted.
    pub fn sweep(&mut self, page: &Page, ttl_ms: u64) -> usize {
        let now = Instant::now();
        let ttl = std::time::Duration::from_millis(ttl_ms);
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| page.is_connected(entry.node) && now - entry.last_accessed < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_page::ElementInit;

    #[tokio::test]
    async fn handles_are_monotonic_and_unique() {
        let mut page = Page::new(800.0, 600.0);
        let a = page.add(ElementInit::tag("div"));
        let b = page.add(ElementInit::tag("div"));
        let mut registry = HandleRegistry::new();
        let ha = registry.store(a);
        let hb = registry.store(b);
        assert_eq!(ha, "el_1");
        assert_eq!(hb, "el_2");
        assert_eq!(registry.resolve(&page, &ha).unwrap(), a);
        assert_eq!(registry.resolve(&page, &hb).unwrap(), b);
    }

    #[tokio::test]
    async fn unknown_and_gone_handles_are_typed_errors() {
        let mut page = Page::new(800.0, 600.0);
        let el = page.add(ElementInit::tag("div"));
        let mut registry = HandleRegistry::new();
        let handle = registry.store(el);

        assert!(matches!(
            registry.resolve(&page, "el_99"),
            Err(Error::HandleNotFound(_))
        ));

        page.detach(el);
        assert!(matches!(
            registry.resolve(&page, &handle),
            Err(Error::HandleGone(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_idle_and_disconnected() {
        let mut page = Page::new(800.0, 600.0);
        let stale = page.add(ElementInit::tag("div"));
        let fresh = page.add(ElementInit::tag("div"));
        let detached = page.add(ElementInit::tag("div"));
        let mut registry = HandleRegistry::new();
        let h_stale = registry.store(stale);
        let h_fresh = registry.store(fresh);
        let _h_detached = registry.store(detached);
        page.detach(detached);

        tokio::time::advance(std::time::Duration::from_millis(10_000)).await;
        // Touch one handle so only the other ages out.
        registry.resolve(&page, &h_fresh).unwrap();
        tokio::time::advance(std::time::Duration::from_millis(55_000)).await;

        let evicted = registry.sweep(&page, 60_000);
        assert_eq!(evicted, 2);
        assert!(matches!(
            registry.resolve(&page, &h_stale),
            Err(Error::HandleNotFound(_))
        ));
        assert_eq!(registry.resolve(&page, &h_fresh).unwrap(), fresh);
    }
}
