//! Target resolution shared by every interactive action.
//!
//! Each action accepts either a `handleId` or a `selector`; when both are
//! present the handle wins.

use serde_json::Value;

use hb_page::{NodeId, Page};

use crate::{
    error::{Error, Result},
    handles::HandleRegistry,
};

/// Resolve the element an action targets.
pub fn target(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<NodeId> {
    if let Some(handle) = params.get("handleId").and_then(Value::as_str) {
        return registry.resolve(page, handle);
    }
    if let Some(selector) = params.get("selector").and_then(Value::as_str) {
        return page.query_selector(selector)?.ok_or(Error::ElementNotFound);
    }
    Err(Error::InvalidParams(
        "need `handleId` or `selector`".into(),
    ))
}

/// Resolve the scope element for `*Within` queries: the `handleId` if
/// given, otherwise the document root.
pub fn scope(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<NodeId> {
    if let Some(handle) = params.get("handleId").and_then(Value::as_str) {
        return registry.resolve(page, handle);
    }
    Ok(page.root())
}

/// Whether the caller named a target at all (type may fall back to the
/// focused element).
pub fn has_explicit_target(params: &Value) -> bool {
    params.get("handleId").and_then(Value::as_str).is_some()
        || params.get("selector").and_then(Value::as_str).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_page::ElementInit;
    use serde_json::json;

    #[test]
    fn handle_wins_over_selector() {
        let mut page = Page::new(800.0, 600.0);
        let by_selector = page.add(ElementInit::tag("div").id("a"));
        let by_handle = page.add(ElementInit::tag("div").id("b"));
        let mut registry = HandleRegistry::new();
        let handle = registry.store(by_handle);

        let node = target(
            &page,
            &mut registry,
            &json!({"handleId": handle, "selector": "#a"}),
        )
        .unwrap();
        assert_eq!(node, by_handle);
        let _ = by_selector;
    }

    #[test]
    fn missing_element_and_missing_params_are_distinct() {
        let page = Page::new(800.0, 600.0);
        let mut registry = HandleRegistry::new();
        assert!(matches!(
            target(&page, &mut registry, &json!({"selector": "#ghost"})),
            Err(Error::ElementNotFound)
        ));
        assert!(matches!(
            target(&page, &mut registry, &json!({})),
            Err(Error::InvalidParams(_))
        ));
    }
}
