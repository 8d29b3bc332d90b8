//! The element arena and the operations the interaction engine performs
//! against it.
//!
//! One `Page` models one tab's main frame as seen from the extension's
//! isolated world: tree, resolved styles, boxes, scroll state, focus, form
//! values, and a log of every synthesized event. Mutations wake
//! `waitForSelector`-style observers through a shared [`Notify`].

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::Notify;

use crate::{
    csp::CspPolicy,
    error::{Error, Result},
    events::{EventKind, PageEvent},
    geometry::Rect,
    selector::{Combinator, Complex, Compound, SelectorList},
    style::{Display, PointerEvents, Position, Style, Visibility},
};

/// Index into the page's element arena.
pub type NodeId = usize;

// ── Elements ─────────────────────────────────────────────────────────────────

/// Construction parameters for [`Page::insert`]. Everything defaults to an
/// ordinary, visible, empty block element with no box.
#[derive(Debug, Clone, Default)]
pub struct ElementInit {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    /// Document-coordinate box.
    pub rect: Rect,
    pub style: Style,
    pub z_index: i32,
    /// Scrollable content height; defaults to the box height.
    pub scroll_height: Option<f64>,
}

impl ElementInit {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn z_index(mut self, z: i32) -> Self {
        self.z_index = z;
        self
    }

    pub fn scroll_height(mut self, height: f64) -> Self {
        self.scroll_height = Some(height);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    /// Direct text content (children contribute their own).
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub connected: bool,
    pub style: Style,
    /// Document-coordinate box.
    pub rect: Rect,
    pub z_index: i32,
    pub scroll_top: f64,
    pub scroll_height: f64,
    /// Form state for inputs/textareas.
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
    /// Selected option index for `<select>`.
    pub selected_index: usize,
}

impl Element {
    fn from_init(init: ElementInit, parent: Option<NodeId>) -> Self {
        let scroll_height = init.scroll_height.unwrap_or(init.rect.height);
        Self {
            tag: init.tag.to_ascii_lowercase(),
            id: init.id,
            classes: init.classes,
            attrs: init.attrs.into_iter().collect(),
            text: init.text,
            parent,
            children: Vec::new(),
            connected: true,
            style: init.style,
            rect: init.rect,
            z_index: init.z_index,
            scroll_top: 0.0,
            scroll_height,
            value: String::new(),
            selection_start: 0,
            selection_end: 0,
            selected_index: 0,
        }
    }

    pub fn is_text_input(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.attrs.get("type").map(String::as_str),
                Some("checkbox") | Some("radio") | Some("button") | Some("submit")
            ),
            _ => false,
        }
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    /// Height of the visible scroll port.
    pub fn client_height(&self) -> f64 {
        self.rect.height
    }
}

// ── Page ─────────────────────────────────────────────────────────────────────

pub struct Page {
    arena: Vec<Element>,
    root: NodeId,
    body: NodeId,
    pub title: String,
    pub url: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub device_pixel_ratio: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    document_height: f64,
    focused: Option<NodeId>,
    events: Vec<PageEvent>,
    /// Bumped on every navigation; content-script state keyed on it.
    pub epoch: u64,
    pub csp: CspPolicy,
    notify: Arc<Notify>,
}

impl Page {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        let mut page = Self {
            arena: Vec::new(),
            root: 0,
            body: 0,
            title: String::new(),
            url: "about:blank".into(),
            viewport_width,
            viewport_height,
            device_pixel_ratio: 1.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            document_height: viewport_height,
            focused: None,
            events: Vec::new(),
            epoch: 0,
            csp: CspPolicy::permissive(),
            notify: Arc::new(Notify::new()),
        };
        page.install_document();
        page
    }

    fn install_document(&mut self) {
        self.arena.clear();
        let html = Element::from_init(
            ElementInit::tag("html").rect(0.0, 0.0, self.viewport_width, self.viewport_height),
            None,
        );
        self.arena.push(html);
        self.root = 0;
        let body = Element::from_init(
            ElementInit::tag("body").rect(0.0, 0.0, self.viewport_width, self.viewport_height),
            Some(self.root),
        );
        self.arena.push(body);
        self.body = 1;
        self.arena[self.root].children.push(self.body);
    }

    /// Replace the document, as a navigation does: new epoch, empty tree,
    /// reset scroll/focus/log. The host repopulates afterwards.
    pub fn begin_document(&mut self, url: impl Into<String>) {
        self.epoch += 1;
        self.url = url.into();
        self.title.clear();
        self.scroll_x = 0.0;
        self.scroll_y = 0.0;
        self.document_height = self.viewport_height;
        self.focused = None;
        self.events.clear();
        self.csp = CspPolicy::permissive();
        self.install_document();
        self.mutated();
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn mutation_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    fn mutated(&self) {
        self.notify.notify_waiters();
    }

    pub fn set_document_height(&mut self, height: f64) {
        self.document_height = height.max(self.viewport_height);
    }

    pub fn document_height(&self) -> f64 {
        self.document_height
    }

    // ── Tree construction ────────────────────────────────────────────────

    pub fn insert(&mut self, parent: NodeId, init: ElementInit) -> NodeId {
        let node = self.arena.len();
        let mut element = Element::from_init(init, Some(parent));
        element.connected = self.arena[parent].connected;
        self.arena.push(element);
        self.arena[parent].children.push(node);
        self.mutated();
        node
    }

    /// Insert under `<body>`.
    pub fn add(&mut self, init: ElementInit) -> NodeId {
        self.insert(self.body, init)
    }

    /// Detach a subtree. Detached elements keep their data but are no
    /// longer connected, matchable, or hit-testable.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.arena[node].parent {
            self.arena[parent].children.retain(|&c| c != node);
        }
        self.arena[node].parent = None;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.arena[current].connected = false;
            stack.extend(self.arena[current].children.iter().copied());
        }
        if self.focused == Some(node) {
            self.focused = None;
        }
        self.mutated();
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn element(&self, node: NodeId) -> Result<&Element> {
        self.arena.get(node).ok_or(Error::NoSuchNode(node))
    }

    pub fn element_mut(&mut self, node: NodeId) -> Result<&mut Element> {
        self.arena.get_mut(node).ok_or(Error::NoSuchNode(node))
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.arena.get(node).is_some_and(|el| el.connected)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node).and_then(|el| el.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.arena
            .get(node)
            .map(|el| el.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let el = self.arena.get(node)?;
        match name {
            "id" => el.id.clone(),
            "class" => {
                if el.classes.is_empty() {
                    None
                } else {
                    Some(el.classes.join(" "))
                }
            },
            _ => el.attrs.get(name).cloned(),
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.arena.get_mut(node) {
            el.attrs.insert(name.to_string(), value.into());
            self.mutated();
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.arena.get_mut(node) {
            el.attrs.remove(name);
            self.mutated();
        }
    }

    /// Full text of a subtree, whitespace-collapsed.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(el) = self.arena.get(current) {
                if !el.text.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(&el.text);
                }
                stack.extend(el.children.iter().rev().copied());
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    // ── Geometry ─────────────────────────────────────────────────────────

    /// Whether the element or an ancestor has `display:none`.
    pub fn display_hidden(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(el) = self.arena.get(id) else {
                return true;
            };
            if el.style.display == Display::None {
                return true;
            }
            current = el.parent;
        }
        false
    }

    /// `getBoundingClientRect` equivalent: viewport coordinates, zeroed
    /// for detached or display:none elements.
    pub fn bounding_rect(&self, node: NodeId) -> Rect {
        let Some(el) = self.arena.get(node) else {
            return Rect::default();
        };
        if !el.connected || self.display_hidden(node) {
            return Rect::default();
        }
        if el.style.position == Position::Fixed {
            el.rect
        } else {
            el.rect.translated(-self.scroll_x, -self.scroll_y)
        }
    }

    /// `offsetParent` equivalent: absent when the element is detached,
    /// inside a `display:none` subtree, or `position:fixed`.
    pub fn offset_parent(&self, node: NodeId) -> Option<NodeId> {
        let el = self.arena.get(node)?;
        if !el.connected || self.display_hidden(node) || el.style.position == Position::Fixed {
            return None;
        }
        el.parent
    }

    /// Whether `node` sits inside an `<svg>` subtree (itself included).
    pub fn in_svg_subtree(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(el) = self.arena.get(id) else {
                return false;
            };
            if el.tag == "svg" {
                return true;
            }
            current = el.parent;
        }
        false
    }

    /// Topmost element under a viewport point, honoring z-order,
    /// visibility, and pointer-events.
    pub fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let mut best: Option<(i32, NodeId)> = None;
        for (node, el) in self.arena.iter().enumerate() {
            if !el.connected
                || self.display_hidden(node)
                || el.style.visibility == Visibility::Hidden
                || el.style.pointer_events == PointerEvents::None
            {
                continue;
            }
            let rect = self.bounding_rect(node);
            if rect.is_zero() || !rect.contains(x, y) {
                continue;
            }
            match best {
                Some((z, id)) if (el.z_index, node) <= (z, id) => {},
                _ => best = Some((el.z_index, node)),
            }
        }
        best.map(|(_, node)| node)
    }

    // ── Scrolling ────────────────────────────────────────────────────────

    pub fn max_scroll_y(&self) -> f64 {
        (self.document_height - self.viewport_height).max(0.0)
    }

    /// Scroll the window by a delta, clamped to the document.
    pub fn scroll_window_by(&mut self, dx: f64, dy: f64) {
        self.scroll_x = (self.scroll_x + dx).max(0.0);
        self.scroll_y = (self.scroll_y + dy).clamp(0.0, self.max_scroll_y());
    }

    /// Scroll a scrollable element by a delta, clamped to its content.
    pub fn scroll_element_by(&mut self, node: NodeId, dy: f64) -> Result<(f64, f64)> {
        let el = self.element_mut(node)?;
        let before = el.scroll_top;
        let max = (el.scroll_height - el.rect.height).max(0.0);
        el.scroll_top = (el.scroll_top + dy).clamp(0.0, max);
        Ok((before, el.scroll_top))
    }

    /// `scrollIntoView({block:"center"})` equivalent on the window.
    pub fn scroll_into_view_center(&mut self, node: NodeId) {
        let Some(el) = self.arena.get(node) else {
            return;
        };
        let target_center = el.rect.y + el.rect.height / 2.0;
        let desired = target_center - self.viewport_height / 2.0;
        self.scroll_y = desired.clamp(0.0, self.max_scroll_y());
    }

    // ── Focus and form state ─────────────────────────────────────────────

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn focus(&mut self, node: NodeId) {
        if self.focused == Some(node) {
            return;
        }
        if let Some(previous) = self.focused {
            self.events.push(PageEvent::simple(EventKind::Blur, previous));
        }
        self.focused = Some(node);
        self.events.push(PageEvent::simple(EventKind::Focus, node));
    }

    /// Set an input's value the way the platform's native setter does, so
    /// framework-bound inputs observe the following `input` event.
    pub fn set_value_native(&mut self, node: NodeId, value: impl Into<String>) -> Result<()> {
        let el = self.element_mut(node)?;
        el.value = value.into();
        let len = el.value.chars().count();
        el.selection_start = len;
        el.selection_end = len;
        self.mutated();
        Ok(())
    }

    pub fn set_selection_range(&mut self, node: NodeId, start: usize, end: usize) -> Result<()> {
        let el = self.element_mut(node)?;
        let len = el.value.chars().count();
        el.selection_start = start.min(len);
        el.selection_end = end.min(len);
        Ok(())
    }

    /// Option nodes of a `<select>`, in document order.
    pub fn select_options(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&c| self.arena[c].tag == "option")
            .collect()
    }

    /// Value of the currently selected option.
    pub fn select_value(&self, node: NodeId) -> Option<String> {
        let options = self.select_options(node);
        let el = self.arena.get(node)?;
        let option = options.get(el.selected_index).copied()?;
        Some(
            self.attribute(option, "value")
                .unwrap_or_else(|| self.text_content(option)),
        )
    }

    // ── Events ───────────────────────────────────────────────────────────

    pub fn dispatch(&mut self, event: PageEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[PageEvent] {
        &self.events
    }

    pub fn events_for(&self, node: NodeId) -> Vec<&PageEvent> {
        self.events.iter().filter(|e| e.target == node).collect()
    }

    pub fn count_events(&self, kind: EventKind, node: NodeId) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == kind && e.target == node)
            .count()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // ── Selector matching ────────────────────────────────────────────────

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.iter_connected().find(|&n| self.matches_list(n, &list)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .iter_connected()
            .filter(|&n| self.matches_list(n, &list))
            .collect())
    }

    /// Scoped variants: match only within `scope`'s subtree (exclusive).
    pub fn query_selector_within(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .find(|&n| self.matches_list(n, &list)))
    }

    pub fn query_selector_all_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|&n| self.matches_list(n, &list))
            .collect())
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        let list = SelectorList::parse(selector)?;
        Ok(self.matches_list(node, &list))
    }

    fn iter_connected(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.arena.len()).filter(|&n| self.arena[n].connected)
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).to_vec();
        while let Some(current) = stack.pop() {
            if self.arena[current].connected {
                out.push(current);
                stack.extend(self.children(current).iter().copied());
            }
        }
        out.sort_unstable();
        out
    }

    fn matches_list(&self, node: NodeId, list: &SelectorList) -> bool {
        list.complexes.iter().any(|c| self.matches_complex(node, c))
    }

    fn matches_complex(&self, node: NodeId, complex: &Complex) -> bool {
        let parts = &complex.parts;
        if !self.matches_compound(node, &parts[parts.len() - 1].1) {
            return false;
        }
        self.matches_left(node, parts, parts.len() - 1)
    }

    /// Match `parts[..index]` against ancestors of `node`, where
    /// `parts[index].0` is the combinator joining `parts[index - 1]` to the
    /// already-matched element.
    fn matches_left(&self, node: NodeId, parts: &[(Combinator, Compound)], index: usize) -> bool {
        if index == 0 {
            return true;
        }
        let combinator = parts[index].0;
        let target = &parts[index - 1].1;
        match combinator {
            Combinator::Child => match self.parent(node) {
                Some(parent) => {
                    self.matches_compound(parent, target)
                        && self.matches_left(parent, parts, index - 1)
                },
                None => false,
            },
            Combinator::Descendant => {
                let mut current = self.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_compound(ancestor, target)
                        && self.matches_left(ancestor, parts, index - 1)
                    {
                        return true;
                    }
                    current = self.parent(ancestor);
                }
                false
            },
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let Some(el) = self.arena.get(node) else {
            return false;
        };
        if let Some(tag) = &compound.tag
            && el.tag != *tag
        {
            return false;
        }
        if let Some(id) = &compound.id
            && el.id.as_deref() != Some(id.as_str())
        {
            return false;
        }
        for class in &compound.classes {
            if !el.classes.iter().any(|c| c == class) {
                return false;
            }
        }
        for (name, expected) in &compound.attrs {
            match (self.attribute(node, name), expected) {
                (Some(actual), Some(expected)) if actual == *expected => {},
                (Some(_), None) => {},
                _ => return false,
            }
        }
        true
    }

    // ── Serialization ────────────────────────────────────────────────────

    /// Serialize a subtree back to markup.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(el) = self.arena.get(node) {
            out.push_str(&el.text);
            for &child in &el.children {
                self.write_html(child, &mut out);
            }
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(el) = self.arena.get(node) else {
            return;
        };
        out.push('<');
        out.push_str(&el.tag);
        if let Some(id) = &el.id {
            out.push_str(&format!(" id=\"{id}\""));
        }
        if !el.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", el.classes.join(" ")));
        }
        for (name, value) in &el.attrs {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        out.push_str(&el.text);
        for &child in &el.children {
            self.write_html(child, out);
        }
        out.push_str(&format!("</{}>", el.tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_page() -> Page {
        Page::new(1280.0, 720.0)
    }

    #[test]
    fn insert_and_query_by_id_class_tag() {
        let mut page = test_page();
        let form = page.add(ElementInit::tag("form").id("login"));
        let input = page.insert(
            form,
            ElementInit::tag("input")
                .class("field")
                .attr("type", "text")
                .rect(10.0, 10.0, 200.0, 30.0),
        );
        assert_eq!(page.query_selector("#login").unwrap(), Some(form));
        assert_eq!(page.query_selector("input.field").unwrap(), Some(input));
        assert_eq!(
            page.query_selector("form > input[type=text]").unwrap(),
            Some(input)
        );
        assert_eq!(page.query_selector("form > div").unwrap(), None);
        assert!(page.query_selector("not a selector!!").is_err());
    }

    #[test]
    fn descendant_combinator_crosses_levels() {
        let mut page = test_page();
        let section = page.add(ElementInit::tag("section").id("outer"));
        let wrapper = page.insert(section, ElementInit::tag("div"));
        let link = page.insert(wrapper, ElementInit::tag("a").attr("href", "/x"));
        assert_eq!(page.query_selector("#outer a[href]").unwrap(), Some(link));
        assert_eq!(page.query_selector("#outer > a").unwrap(), None);
    }

    #[test]
    fn detach_disconnects_subtree() {
        let mut page = test_page();
        let div = page.add(ElementInit::tag("div").id("gone"));
        let child = page.insert(div, ElementInit::tag("span"));
        page.detach(div);
        assert!(!page.is_connected(div));
        assert!(!page.is_connected(child));
        assert_eq!(page.query_selector("#gone").unwrap(), None);
    }

    #[test]
    fn bounding_rect_follows_scroll_and_hides_display_none() {
        let mut page = test_page();
        let el = page.add(ElementInit::tag("div").rect(0.0, 1000.0, 100.0, 50.0));
        page.set_document_height(3000.0);
        page.scroll_window_by(0.0, 400.0);
        let rect = page.bounding_rect(el);
        assert_eq!(rect.y, 600.0);

        let hidden = page.add(ElementInit::tag("div").rect(0.0, 0.0, 10.0, 10.0).style(Style {
            display: Display::None,
            ..Style::default()
        }));
        assert!(page.bounding_rect(hidden).is_zero());
    }

    #[test]
    fn fixed_elements_ignore_scroll() {
        let mut page = test_page();
        let fixed = page.add(
            ElementInit::tag("div")
                .rect(0.0, 0.0, 1280.0, 720.0)
                .style(Style {
                    position: Position::Fixed,
                    ..Style::default()
                }),
        );
        page.set_document_height(5000.0);
        page.scroll_window_by(0.0, 2000.0);
        assert_eq!(page.bounding_rect(fixed).y, 0.0);
    }

    #[test]
    fn element_from_point_prefers_higher_z_and_later_nodes() {
        let mut page = test_page();
        let below = page.add(ElementInit::tag("button").rect(10.0, 10.0, 100.0, 40.0));
        let above = page.add(
            ElementInit::tag("div")
                .rect(0.0, 0.0, 1280.0, 720.0)
                .z_index(10),
        );
        assert_eq!(page.element_from_point(20.0, 20.0), Some(above));
        page.detach(above);
        assert_eq!(page.element_from_point(20.0, 20.0), Some(below));
    }

    #[test]
    fn element_from_point_skips_hidden_and_pointer_events_none() {
        let mut page = test_page();
        let target = page.add(ElementInit::tag("button").rect(0.0, 0.0, 50.0, 50.0));
        let shield = page.add(
            ElementInit::tag("div")
                .rect(0.0, 0.0, 1280.0, 720.0)
                .z_index(5)
                .style(Style {
                    pointer_events: PointerEvents::None,
                    ..Style::default()
                }),
        );
        assert_eq!(page.element_from_point(10.0, 10.0), Some(target));
        let _ = shield;
    }

    #[test]
    fn scroll_clamps_to_document() {
        let mut page = test_page();
        page.set_document_height(2000.0);
        page.scroll_window_by(0.0, 10_000.0);
        assert_eq!(page.scroll_y, 1280.0);
        page.scroll_window_by(0.0, -99_999.0);
        assert_eq!(page.scroll_y, 0.0);
    }

    #[test]
    fn scroll_into_view_centers_element() {
        let mut page = test_page();
        let el = page.add(ElementInit::tag("div").rect(0.0, 1500.0, 100.0, 100.0));
        page.set_document_height(4000.0);
        page.scroll_into_view_center(el);
        let rect = page.bounding_rect(el);
        let center = rect.y + rect.height / 2.0;
        assert!((center - 360.0).abs() < 1.0, "center was {center}");
    }

    #[test]
    fn focus_emits_focus_and_blur() {
        let mut page = test_page();
        let first = page.add(ElementInit::tag("input"));
        let second = page.add(ElementInit::tag("input"));
        page.focus(first);
        page.focus(second);
        assert_eq!(page.count_events(EventKind::Focus, first), 1);
        assert_eq!(page.count_events(EventKind::Blur, first), 1);
        assert_eq!(page.count_events(EventKind::Focus, second), 1);
        assert_eq!(page.focused(), Some(second));
    }

    #[test]
    fn select_value_tracks_selected_index() {
        let mut page = test_page();
        let select = page.add(ElementInit::tag("select").id("dd"));
        page.insert(select, ElementInit::tag("option").attr("value", "one").text("One"));
        page.insert(select, ElementInit::tag("option").attr("value", "two").text("Two"));
        assert_eq!(page.select_value(select).as_deref(), Some("one"));
        page.element_mut(select).unwrap().selected_index = 1;
        assert_eq!(page.select_value(select).as_deref(), Some("two"));
    }

    #[test]
    fn navigation_bumps_epoch_and_clears_tree() {
        let mut page = test_page();
        page.add(ElementInit::tag("div").id("old"));
        let epoch = page.epoch;
        page.begin_document("https://example.test/next");
        assert_eq!(page.epoch, epoch + 1);
        assert_eq!(page.url, "https://example.test/next");
        assert_eq!(page.query_selector("#old").unwrap(), None);
    }

    #[test]
    fn outer_html_round_trips_tag_and_id() {
        let mut page = test_page();
        let el = page.add(
            ElementInit::tag("button")
                .id("go")
                .class("primary")
                .attr("aria-label", "Go")
                .text("Go!"),
        );
        let html = page.outer_html(el);
        assert!(html.starts_with("<button id=\"go\" class=\"primary\""));
        assert!(html.contains("aria-label=\"Go\""));
        assert!(html.ends_with("Go!</button>"));
    }

    #[tokio::test]
    async fn mutation_notify_wakes_waiters() {
        let mut page = test_page();
        let notify = page.mutation_notify();
        let waiter = tokio::spawn(async move { notify.notified().await });
        // Let the waiter park before mutating; notify_waiters only wakes
        // tasks already waiting.
        tokio::task::yield_now().await;
        page.add(ElementInit::tag("div"));
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter never woke")
            .unwrap();
    }
}
