//! Read-only DOM actions.
//!
//! All of these run synchronously under the page lock and register handles
//! for the elements they return. None of them use page-world evaluation,
//! so they work under any CSP.

use serde_json::{Value, json};

use hb_page::{NodeId, Page};

use crate::{
    error::{Error, Result},
    handles::HandleRegistry,
    resolve,
};

/// Default truncation for `elementHTML`.
const ELEMENT_HTML_LIMIT: usize = 5000;
/// Scrollable detection slack: content must exceed the port by this much.
const SCROLLABLE_SLACK: f64 = 20.0;

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams(format!("missing `{name}`")))
}

/// Short structured description of an element, handle included.
pub fn element_summary(page: &Page, registry: &mut HandleRegistry, node: NodeId) -> Value {
    let handle = registry.store(node);
    let el = match page.element(node) {
        Ok(el) => el,
        Err(_) => return Value::Null,
    };
    let cls = if el.classes.is_empty() {
        Value::Null
    } else {
        Value::String(el.classes.iter().take(3).cloned().collect::<Vec<_>>().join(" "))
    };
    let text = {
        let t = page.text_content(node);
        if t.is_empty() {
            Value::Null
        } else {
            Value::String(t.chars().take(60).collect())
        }
    };
    let label = page
        .attribute(node, "aria-label")
        .or_else(|| page.attribute(node, "name"))
        .or_else(|| page.attribute(node, "placeholder"))
        .map(Value::String)
        .unwrap_or(Value::Null);
    json!({
        "handleId": handle,
        "tag": el.tag,
        "id": el.id,
        "cls": cls,
        "text": text,
        "label": label,
    })
}

pub fn query_selector(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let selector = str_param(params, "selector")?;
    match page.query_selector(selector)? {
        Some(node) => Ok(element_summary(page, registry, node)),
        None => Ok(Value::Null),
    }
}

pub fn query_selector_all(
    page: &Page,
    registry: &mut HandleRegistry,
    params: &Value,
) -> Result<Value> {
    let selector = str_param(params, "selector")?;
    let nodes = page.query_selector_all(selector)?;
    Ok(Value::Array(
        nodes
            .into_iter()
            .map(|n| element_summary(page, registry, n))
            .collect(),
    ))
}

pub fn query_selector_within(
    page: &Page,
    registry: &mut HandleRegistry,
    params: &Value,
) -> Result<Value> {
    let scope = resolve::scope(page, registry, params)?;
    let selector = str_param(params, "selector")?;
    match page.query_selector_within(scope, selector)? {
        Some(node) => Ok(element_summary(page, registry, node)),
        None => Ok(Value::Null),
    }
}

pub fn query_selector_all_within(
    page: &Page,
    registry: &mut HandleRegistry,
    params: &Value,
) -> Result<Value> {
    let scope = resolve::scope(page, registry, params)?;
    let selector = str_param(params, "selector")?;
    let nodes = page.query_selector_all_within(scope, selector)?;
    Ok(Value::Array(
        nodes
            .into_iter()
            .map(|n| element_summary(page, registry, n))
            .collect(),
    ))
}

pub fn bounding_box(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let node = resolve::target(page, registry, params)?;
    let rect = page.bounding_rect(node);
    Ok(json!({
        "x": rect.x,
        "y": rect.y,
        "width": rect.width,
        "height": rect.height,
    }))
}

pub fn get_attribute(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let node = resolve::target(page, registry, params)?;
    let name = str_param(params, "name")?;
    Ok(page
        .attribute(node, name)
        .map(Value::String)
        .unwrap_or(Value::Null))
}

pub fn get_property(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let node = resolve::target(page, registry, params)?;
    let name = str_param(params, "name")?;
    let el = page.element(node)?;
    let value = match name {
        "value" => Value::String(el.value.clone()),
        "tagName" => Value::String(el.tag.to_ascii_uppercase()),
        "textContent" | "innerText" => Value::String(page.text_content(node)),
        "selectedIndex" => json!(el.selected_index),
        "id" => el.id.clone().map(Value::String).unwrap_or(Value::Null),
        "className" => Value::String(el.classes.join(" ")),
        "href" => page
            .attribute(node, "href")
            .map(Value::String)
            .unwrap_or(Value::Null),
        "title" => page
            .attribute(node, "title")
            .map(Value::String)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    };
    Ok(value)
}

/// `{html, title, url}` from the isolated world — immune to page CSP.
pub fn get_html(page: &Page) -> Result<Value> {
    Ok(json!({
        "html": page.outer_html(page.root()),
        "title": page.title,
        "url": page.url,
    }))
}

pub fn element_html(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let node = resolve::target(page, registry, params)?;
    let inner = params
        .get("inner")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let limit = params
        .get("maxLength")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(ELEMENT_HTML_LIMIT);
    let html = if inner {
        page.inner_html(node)
    } else {
        page.outer_html(node)
    };
    let truncated = html.len() > limit;
    let html: String = html.chars().take(limit).collect();
    Ok(json!({ "html": html, "truncated": truncated }))
}

pub fn query_all_info(page: &Page, registry: &mut HandleRegistry, params: &Value) -> Result<Value> {
    let selector = str_param(params, "selector")?;
    let nodes = page.query_selector_all(selector)?;
    Ok(Value::Array(
        nodes
            .into_iter()
            .map(|n| element_summary(page, registry, n))
            .collect(),
    ))
}

/// Existence map for several selectors in one round-trip.
pub fn batch_query(page: &Page, params: &Value) -> Result<Value> {
    let selectors = params
        .get("selectors")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidParams("missing `selectors`".into()))?;
    let mut out = serde_json::Map::new();
    for selector in selectors {
        let Some(selector) = selector.as_str() else {
            return Err(Error::InvalidParams("selectors must be strings".into()));
        };
        let found = page.query_selector(selector)?.is_some();
        out.insert(selector.to_string(), Value::Bool(found));
    }
    Ok(Value::Object(out))
}

/// Elements whose content overflows their port with clipping overflow.
pub fn find_scrollable(page: &Page, registry: &mut HandleRegistry) -> Result<Value> {
    let mut out = Vec::new();
    for node in page.query_selector_all("*")? {
        let el = page.element(node)?;
        if el.style.clips_overflow()
            && el.scroll_height > el.client_height() + SCROLLABLE_SLACK
            && !page.bounding_rect(node).is_zero()
        {
            let handle = registry.store(node);
            out.push(json!({
                "handleId": handle,
                "tag": el.tag,
                "selector": short_selector(page, node),
                "scrollHeight": el.scroll_height,
                "clientHeight": el.client_height(),
            }));
        }
    }
    Ok(Value::Array(out))
}

/// Categorised list of interactive elements with derived short selectors.
/// Never uses evaluation, so it is safe under strict CSP.
pub fn discover_elements(page: &Page, registry: &mut HandleRegistry) -> Result<Value> {
    let mut elements = Vec::new();
    for node in page.query_selector_all("*")? {
        let el = page.element(node)?;
        if page.bounding_rect(node).is_zero() {
            continue;
        }
        let kind = match el.tag.as_str() {
            "a" if page.attribute(node, "href").is_some() => "link",
            "button" => "button",
            "input"
                if matches!(
                    page.attribute(node, "type").as_deref(),
                    Some("button") | Some("submit")
                ) =>
            {
                "button"
            },
            "input" if page.attribute(node, "type").as_deref() != Some("hidden") => "input",
            "textarea" | "select" => "input",
            _ if page.attribute(node, "role").as_deref() == Some("button") => "button",
            _ => continue,
        };
        let handle = registry.store(node);
        let text = page.text_content(node);
        elements.push(json!({
            "type": kind,
            "tag": el.tag,
            "text": if text.is_empty() { Value::Null } else { Value::String(text.chars().take(60).collect()) },
            "href": page.attribute(node, "href").map(Value::String).unwrap_or(Value::Null),
            "handleId": handle,
            "selector": short_selector(page, node),
            "inputType": page.attribute(node, "type").map(Value::String).unwrap_or(Value::Null),
            "name": page.attribute(node, "name").map(Value::String).unwrap_or(Value::Null),
            "placeholder": page.attribute(node, "placeholder").map(Value::String).unwrap_or(Value::Null),
        }));
    }
    Ok(json!({ "elements": elements }))
}

/// The shortest selector that plausibly identifies the element: id, then
/// tag plus first class, then bare tag.
fn short_selector(page: &Page, node: NodeId) -> String {
    let Ok(el) = page.element(node) else {
        return String::new();
    };
    if let Some(id) = &el.id {
        return format!("#{id}");
    }
    if let Some(class) = el.classes.first() {
        return format!("{}.{class}", el.tag);
    }
    el.tag.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_page::fixture;

    #[test]
    fn query_selector_returns_summary_or_null() {
        let (page, _ids) = fixture::test_page();
        let mut registry = HandleRegistry::new();
        let found = query_selector(&page, &mut registry, &json!({"selector": "#title"})).unwrap();
        assert_eq!(found["tag"], "h1");
        assert_eq!(found["text"], "Human Browser Test Page");
        assert!(found["handleId"].as_str().unwrap().starts_with("el_"));

        let missing =
            query_selector(&page, &mut registry, &json!({"selector": "#nope"})).unwrap();
        assert!(missing.is_null());
    }

    #[test]
    fn element_html_matches_selector_tag_and_truncates() {
        let (page, _ids) = fixture::test_page();
        let mut registry = HandleRegistry::new();
        let found = query_selector(&page, &mut registry, &json!({"selector": "#submit"})).unwrap();
        let handle = found["handleId"].as_str().unwrap();

        let html = element_html(&page, &mut registry, &json!({"handleId": handle})).unwrap();
        assert!(html["html"].as_str().unwrap().starts_with("<button"));

        let short =
            element_html(&page, &mut registry, &json!({"handleId": handle, "maxLength": 10}))
                .unwrap();
        assert_eq!(short["html"].as_str().unwrap().len(), 10);
        assert_eq!(short["truncated"], true);
    }

    #[test]
    fn batch_query_maps_existence() {
        let (page, _ids) = fixture::test_page();
        let out = batch_query(&page, &json!({"selectors": ["#title", "#missing", "select"]}))
            .unwrap();
        assert_eq!(out["#title"], true);
        assert_eq!(out["#missing"], false);
        assert_eq!(out["select"], true);
    }

    #[test]
    fn find_scrollable_spots_the_feed() {
        let (page, ids) = fixture::test_page();
        let mut registry = HandleRegistry::new();
        let out = find_scrollable(&page, &mut registry).unwrap();
        let list = out.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["selector"], "#feed");
        let _ = ids;
    }

    #[test]
    fn discover_finds_links_buttons_inputs() {
        let (page, _ids) = fixture::test_page();
        let mut registry = HandleRegistry::new();
        let out = discover_elements(&page, &mut registry).unwrap();
        let elements = out["elements"].as_array().unwrap();
        let kind_of = |sel: &str| {
            elements
                .iter()
                .find(|e| e["selector"] == sel)
                .map(|e| e["type"].as_str().unwrap().to_string())
        };
        assert_eq!(kind_of("#home").as_deref(), Some("link"));
        assert_eq!(kind_of("#submit").as_deref(), Some("button"));
        assert_eq!(kind_of("#text-input").as_deref(), Some("input"));
        assert_eq!(kind_of("#dropdown").as_deref(), Some("input"));
        // Hidden traps have no box and are not discovered.
        assert!(kind_of("#hp-display").is_none());
    }

    #[test]
    fn get_property_reads_live_form_state() {
        let (mut page, ids) = fixture::test_page();
        let mut registry = HandleRegistry::new();
        page.set_value_native(ids.text_input, "hello").unwrap();
        let value = get_property(
            &page,
            &mut registry,
            &json!({"selector": "#text-input", "name": "value"}),
        )
        .unwrap();
        assert_eq!(value, "hello");
        let tag = get_property(
            &page,
            &mut registry,
            &json!({"selector": "#text-input", "name": "tagName"}),
        )
        .unwrap();
        assert_eq!(tag, "INPUT");
    }
}
