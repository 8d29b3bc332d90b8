//! Avoid-ruleset matching.
//!
//! Rules are a declarative filter of elements interaction must refuse.
//! Per-request rules arrive already unioned with the broker's globals, but
//! the union is applied again here so the engine honours both even when
//! driven directly.

use serde_json::Value;

use {
    hb_page::{NodeId, Page},
    hb_protocol::{AvoidRules, FRAMEWORK_CONFIG_FIELD},
};

/// Union of the request's `avoid` and the injected tuning's `avoid`.
pub fn collect_rules(params: &Value) -> AvoidRules {
    let mut rules: AvoidRules = params
        .get("avoid")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    if let Some(injected) = params
        .get(FRAMEWORK_CONFIG_FIELD)
        .and_then(|cfg| cfg.get("avoid"))
        && let Ok(global) = serde_json::from_value::<AvoidRules>(injected.clone())
    {
        rules.union(&global);
    }
    rules
}

/// Whether any rule matches the element.
pub fn matches(page: &Page, node: NodeId, rules: &AvoidRules) -> bool {
    let Ok(el) = page.element(node) else {
        return false;
    };

    for class in &rules.classes {
        if el.classes.iter().any(|c| c == class) {
            return true;
        }
    }
    if let Some(id) = &el.id
        && rules.ids.iter().any(|r| r == id)
    {
        return true;
    }
    for rule in &rules.attributes {
        // "name" for presence, "name=value" for equality.
        match rule.split_once('=') {
            Some((name, value)) => {
                if page.attribute(node, name.trim()).as_deref() == Some(value.trim()) {
                    return true;
                }
            },
            None => {
                if page.attribute(node, rule.trim()).is_some() {
                    return true;
                }
            },
        }
    }
    for selector in &rules.selectors {
        if page.matches(node, selector).unwrap_or(false) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_page::ElementInit;
    use serde_json::json;

    #[test]
    fn collect_unions_request_and_injected() {
        let params = json!({
            "avoid": {"classes": ["sponsored"]},
            "__frameworkConfig": {"avoid": {"classes": ["tracker"], "ids": ["ad"]}}
        });
        let rules = collect_rules(&params);
        assert_eq!(rules.classes, vec!["sponsored".to_string(), "tracker".into()]);
        assert_eq!(rules.ids, vec!["ad".to_string()]);
    }

    #[test]
    fn matches_each_rule_kind() {
        let mut page = Page::new(800.0, 600.0);
        let el = page.add(
            ElementInit::tag("a")
                .id("promo")
                .class("sponsored")
                .attr("data-track", "1")
                .attr("rel", "nofollow"),
        );

        let by_class = AvoidRules {
            classes: vec!["sponsored".into()],
            ..Default::default()
        };
        assert!(matches(&page, el, &by_class));

        let by_id = AvoidRules {
            ids: vec!["promo".into()],
            ..Default::default()
        };
        assert!(matches(&page, el, &by_id));

        let by_attr_presence = AvoidRules {
            attributes: vec!["data-track".into()],
            ..Default::default()
        };
        assert!(matches(&page, el, &by_attr_presence));

        let by_attr_value = AvoidRules {
            attributes: vec!["rel=nofollow".into()],
            ..Default::default()
        };
        assert!(matches(&page, el, &by_attr_value));

        let by_selector = AvoidRules {
            selectors: vec!["a.sponsored".into()],
            ..Default::default()
        };
        assert!(matches(&page, el, &by_selector));

        let no_match = AvoidRules {
            classes: vec!["organic".into()],
            ..Default::default()
        };
        assert!(!matches(&page, el, &no_match));
    }
}
