//! The shared test page.
//!
//! A single document exercising every interaction path: ordinary
//! controls, the full set of trap elements, an overlay covering a button,
//! a scrollable feed, and enough document height to need three viewports.

use crate::{
    page::{ElementInit, NodeId, Page},
    style::{Display, Position, Style, Visibility},
};

pub const TEST_PAGE_TITLE: &str = "Human Browser Test Page";
pub const TEST_PAGE_URL: &str = "http://127.0.0.1:3456/fixtures.html";

/// Interesting nodes of the fixtures document.
#[derive(Debug, Clone)]
pub struct FixtureIds {
    pub title: NodeId,
    pub text_input: NodeId,
    pub dropdown: NodeId,
    pub submit: NodeId,
    pub home_link: NodeId,
    pub feed: NodeId,
    pub covered: NodeId,
    pub overlay: NodeId,
    pub trap_opacity: NodeId,
    pub trap_visibility: NodeId,
    pub trap_aria: NodeId,
    pub trap_class: NodeId,
    pub trap_tiny: NodeId,
    pub trap_zero: NodeId,
    pub trap_display: NodeId,
    pub trap_svg: NodeId,
    pub trap_offscreen: NodeId,
}

/// Build the fixtures document into `page` and return the node map.
pub fn build_test_page(page: &mut Page) -> FixtureIds {
    page.title = TEST_PAGE_TITLE.into();
    page.url = TEST_PAGE_URL.into();
    page.set_document_height(page.viewport_height * 3.0);

    let title = page.add(
        ElementInit::tag("h1")
            .id("title")
            .text(TEST_PAGE_TITLE)
            .rect(20.0, 20.0, 500.0, 40.0),
    );

    let form = page.add(ElementInit::tag("form").id("main-form").rect(
        20.0,
        80.0,
        420.0,
        240.0,
    ));
    let text_input = page.insert(
        form,
        ElementInit::tag("input")
            .id("text-input")
            .attr("type", "text")
            .attr("placeholder", "Say something")
            .rect(30.0, 90.0, 300.0, 32.0),
    );
    let dropdown = page.insert(
        form,
        ElementInit::tag("select")
            .id("dropdown")
            .rect(30.0, 140.0, 200.0, 32.0),
    );
    page.insert(
        dropdown,
        ElementInit::tag("option").attr("value", "first").text("First"),
    );
    page.insert(
        dropdown,
        ElementInit::tag("option").attr("value", "second").text("Second"),
    );
    page.insert(
        dropdown,
        ElementInit::tag("option").attr("value", "third").text("Third"),
    );
    let submit = page.insert(
        form,
        ElementInit::tag("button")
            .id("submit")
            .attr("type", "submit")
            .text("Submit")
            .rect(30.0, 190.0, 120.0, 40.0),
    );

    let home_link = page.add(
        ElementInit::tag("a")
            .id("home")
            .attr("href", "/home")
            .text("Home")
            .rect(20.0, 340.0, 60.0, 20.0),
    );

    // A scrollable feed column.
    let feed = page.add(
        ElementInit::tag("div")
            .id("feed")
            .class("feed")
            .rect(600.0, 80.0, 320.0, 400.0)
            .scroll_height(2400.0)
            .style(Style {
                overflow_y: crate::style::Overflow::Auto,
                ..Style::default()
            }),
    );

    // Overlay scenario: a button fully covered by a translucent modal.
    let covered = page.add(
        ElementInit::tag("button")
            .id("covered")
            .text("Behind the modal")
            .rect(60.0, 420.0, 160.0, 44.0),
    );
    let overlay = page.add(
        ElementInit::tag("div")
            .id("overlay")
            .class("modal-backdrop")
            .rect(40.0, 400.0, 220.0, 110.0)
            .z_index(1000)
            .style(Style {
                position: Position::Fixed,
                opacity: 0.5,
                ..Style::default()
            }),
    );

    // Trap elements, one per refusal reason.
    let trap_opacity = page.add(
        ElementInit::tag("button")
            .id("hp-opacity")
            .text("invisible")
            .rect(20.0, 900.0, 120.0, 40.0)
            .style(Style {
                opacity: 0.0,
                ..Style::default()
            }),
    );
    let trap_visibility = page.add(
        ElementInit::tag("button")
            .id("hp-visibility")
            .rect(20.0, 960.0, 120.0, 40.0)
            .style(Style {
                visibility: Visibility::Hidden,
                ..Style::default()
            }),
    );
    let trap_aria = page.add(
        ElementInit::tag("button")
            .id("hp-aria")
            .attr("aria-hidden", "true")
            .rect(20.0, 1020.0, 120.0, 40.0),
    );
    let trap_class = page.add(
        ElementInit::tag("a")
            .id("hp-class")
            .class("sr-only")
            .attr("href", "/trap")
            .rect(20.0, 1080.0, 120.0, 20.0),
    );
    let trap_tiny = page.add(
        ElementInit::tag("button")
            .id("hp-tiny")
            .rect(20.0, 1120.0, 3.0, 3.0),
    );
    let trap_zero = page.add(
        ElementInit::tag("span")
            .id("hp-zero")
            .rect(20.0, 1140.0, 0.0, 0.0),
    );
    let trap_display = page.add(
        ElementInit::tag("button")
            .id("hp-display")
            .rect(20.0, 1160.0, 120.0, 40.0)
            .style(Style {
                display: Display::None,
                ..Style::default()
            }),
    );
    let svg = page.add(
        ElementInit::tag("svg")
            .id("hp-svg")
            .rect(20.0, 1220.0, 64.0, 64.0),
    );
    page.insert(svg, ElementInit::tag("path").rect(20.0, 1220.0, 64.0, 64.0));

    // Below the document's scrollable range: scrolling can never bring it
    // into the comfortable band.
    let trap_offscreen = page.add(
        ElementInit::tag("button")
            .id("hp-offscreen")
            .rect(20.0, page.viewport_height * 3.0 + 2000.0, 120.0, 40.0),
    );

    FixtureIds {
        title,
        text_input,
        dropdown,
        submit,
        home_link,
        feed,
        covered,
        overlay,
        trap_opacity,
        trap_visibility,
        trap_aria,
        trap_class,
        trap_tiny,
        trap_zero,
        trap_display,
        trap_svg: svg,
        trap_offscreen,
    }
}

/// A fresh viewport-sized page with the fixtures document installed.
pub fn test_page() -> (Page, FixtureIds) {
    let mut page = Page::new(1280.0, 720.0);
    let ids = build_test_page(&mut page);
    (page, ids)
}

/// Keep the overlay out of the way for tests that click ordinary controls.
pub fn dismiss_overlay(page: &mut Page, ids: &FixtureIds) {
    page.detach(ids.overlay);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_ids_resolve_by_selector() {
        let (page, ids) = test_page();
        assert_eq!(page.query_selector("#title").unwrap(), Some(ids.title));
        assert_eq!(
            page.query_selector("#text-input").unwrap(),
            Some(ids.text_input)
        );
        assert_eq!(page.query_selector("#dropdown").unwrap(), Some(ids.dropdown));
        assert_eq!(
            page.query_selector("#main-form > button").unwrap(),
            Some(ids.submit)
        );
    }

    #[test]
    fn overlay_wins_hit_testing_over_covered_button() {
        let (page, ids) = test_page();
        let rect = page.bounding_rect(ids.covered);
        let (cx, cy) = rect.center();
        assert_eq!(page.element_from_point(cx, cy), Some(ids.overlay));
    }

    #[test]
    fn dismissing_overlay_exposes_the_button() {
        let (mut page, ids) = test_page();
        dismiss_overlay(&mut page, &ids);
        let rect = page.bounding_rect(ids.covered);
        let (cx, cy) = rect.center();
        assert_eq!(page.element_from_point(cx, cy), Some(ids.covered));
    }

    #[test]
    fn feed_is_scrollable() {
        let (page, ids) = test_page();
        let feed = page.element(ids.feed).unwrap();
        assert!(feed.scroll_height > feed.client_height() + 20.0);
        assert!(feed.style.clips_overflow());
    }

    #[test]
    fn pointer_events_defaults_leave_overlay_clickable() {
        let (page, ids) = test_page();
        let overlay = page.element(ids.overlay).unwrap();
        assert_eq!(overlay.style.pointer_events, crate::style::PointerEvents::Auto);
        let rect = page.bounding_rect(ids.overlay);
        assert_eq!(rect.width, 220.0);
    }
}
