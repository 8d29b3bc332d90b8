//! Trap detection for the human pipelines.
//!
//! The checks run in a fixed order and the first match wins; the order is
//! part of the observable contract (a hidden SVG honeypot reports
//! `svg-element`, not `opacity-zero`).

use std::sync::LazyLock;

use regex::Regex;

use {
    hb_page::{Display, NodeId, Page, Visibility},
    hb_protocol::RefusalReason,
};

static HONEYPOT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ghost|sr-only|visually-hidden|trap|honey|offscreen|off-screen)\b")
        .expect("honeypot class pattern")
});

/// Inspect an element for trap traits. `None` means it looks interactable.
pub fn detect(page: &Page, node: NodeId) -> Option<RefusalReason> {
    let el = page.element(node).ok()?;

    if page.in_svg_subtree(node) {
        return Some(RefusalReason::SvgElement);
    }
    if page.attribute(node, "aria-hidden").as_deref() == Some("true") {
        return Some(RefusalReason::AriaHidden);
    }
    if page.offset_parent(node).is_none() && el.style.display != Display::Contents {
        return Some(RefusalReason::NoOffsetParent);
    }
    if !el.classes.is_empty() && HONEYPOT_CLASS.is_match(&el.classes.join(" ")) {
        return Some(RefusalReason::HoneypotClass);
    }
    if el.style.opacity == 0.0 {
        return Some(RefusalReason::OpacityZero);
    }
    if el.style.visibility == Visibility::Hidden {
        return Some(RefusalReason::VisibilityHidden);
    }

    let rect = page.bounding_rect(node);
    if rect.is_zero() {
        return Some(RefusalReason::NoBoundingBox);
    }
    if rect.width < 5.0 || rect.height < 5.0 {
        return Some(RefusalReason::SubPixel);
    }
    None
}
