//! End-to-end engine behaviour against the fixtures document.
//!
//! All tests run with a paused clock: the pipelines' sleeps auto-advance,
//! so a full human click costs microseconds of wall time while keeping its
//! virtual timing observable.

use std::sync::Arc;

use {serde_json::json, tokio::sync::Mutex};

use {
    hb_engine::Engine,
    hb_page::{
        EventKind, Page,
        fixture::{self, FixtureIds},
    },
};

async fn engine_with_fixture() -> (Arc<Engine>, Arc<Mutex<Page>>, FixtureIds) {
    let (page, ids) = fixture::test_page();
    let page = Arc::new(Mutex::new(page));
    let engine = Engine::new(Arc::clone(&page)).await;
    (engine, page, ids)
}

// ── Honeypot matrix ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn honeypot_matrix_refuses_with_exact_reason_and_no_events() {
    let cases = [
        ("#hp-svg", "svg-element"),
        ("#hp-aria", "aria-hidden"),
        ("#hp-display", "no-offsetParent"),
        ("#hp-class", "honeypot-class"),
        ("#hp-opacity", "opacity-zero"),
        ("#hp-visibility", "visibility-hidden"),
        ("#hp-tiny", "sub-pixel"),
        ("#hp-zero", "no-bounding-box"),
        ("#hp-offscreen", "off-screen"),
    ];
    for (selector, reason) in cases {
        let (engine, page, _ids) = engine_with_fixture().await;
        let result = engine
            .handle("human.click", &json!({ "selector": selector }))
            .await
            .unwrap();
        assert_eq!(result["clicked"], false, "{selector}");
        assert_eq!(result["reason"], reason, "{selector}");

        let page = page.lock().await;
        let node = page.query_selector(selector).unwrap().unwrap();
        let clicks = page.count_events(EventKind::Click, node)
            + page.count_events(EventKind::MouseDown, node);
        assert_eq!(clicks, 0, "{selector} received events");
    }
}

#[tokio::test(start_paused = true)]
async fn refused_click_is_stable_across_retries() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    for _ in 0..3 {
        let result = engine
            .handle("human.click", &json!({ "selector": "#hp-opacity" }))
            .await
            .unwrap();
        assert_eq!(result["reason"], "opacity-zero");
    }
}

// ── Avoid rules ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn avoid_rules_union_request_and_injected() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    // Injected global rule (as the broker would attach it).
    let result = engine
        .handle(
            "human.click",
            &json!({
                "selector": "#submit",
                "__frameworkConfig": { "avoid": { "ids": ["submit"] } }
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["clicked"], false);
    assert_eq!(result["reason"], "avoided");

    // Per-request rule alone.
    let result = engine
        .handle(
            "human.click",
            &json!({ "selector": "#home", "avoid": { "selectors": ["a[href]"] } }),
        )
        .await
        .unwrap();
    assert_eq!(result["reason"], "avoided");
}

// ── Successful click ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn click_dispatches_full_sequence_and_focuses_target() {
    let (engine, page, ids) = engine_with_fixture().await;
    let result = engine
        .handle("human.click", &json!({ "selector": "#submit" }))
        .await
        .unwrap();
    assert_eq!(result["clicked"], true);

    let page = page.lock().await;
    assert_eq!(page.count_events(EventKind::MouseDown, ids.submit), 1);
    assert_eq!(page.count_events(EventKind::MouseUp, ids.submit), 1);
    assert_eq!(page.count_events(EventKind::Click, ids.submit), 1);
    assert_eq!(page.focused(), Some(ids.submit));
    // The path produced real motion.
    assert!(
        page.events()
            .iter()
            .filter(|e| e.kind == EventKind::MouseMove)
            .count()
            >= 15
    );
}

#[tokio::test(start_paused = true)]
async fn overlay_receives_the_click_not_the_covered_button() {
    let (engine, page, ids) = engine_with_fixture().await;
    let result = engine
        .handle("human.click", &json!({ "selector": "#covered" }))
        .await
        .unwrap();
    assert_eq!(result["clicked"], true);

    let page = page.lock().await;
    assert!(page.count_events(EventKind::Click, ids.overlay) >= 1);
    assert_eq!(page.count_events(EventKind::Click, ids.covered), 0);
    // Focus still lands on the element the caller meant.
    assert_eq!(page.focused(), Some(ids.covered));
}

#[tokio::test(start_paused = true)]
async fn click_below_the_fold_scrolls_into_comfortable_band() {
    let (engine, page, _ids) = engine_with_fixture().await;
    {
        let mut page = page.lock().await;
        page.add(
            hb_page::ElementInit::tag("button")
                .id("deep")
                .text("Deep")
                .rect(20.0, 1800.0, 120.0, 40.0),
        );
    }
    let result = engine
        .handle("human.click", &json!({ "selector": "#deep" }))
        .await
        .unwrap();
    assert_eq!(result["clicked"], true);

    let page = page.lock().await;
    assert!(page.scroll_y > 0.0);
    let node = page.query_selector("#deep").unwrap().unwrap();
    let rect = page.bounding_rect(node);
    let fraction = rect.y / page.viewport_height;
    assert!((0.15..=0.85).contains(&fraction), "top at {fraction}");
}

#[tokio::test(start_paused = true)]
async fn element_removed_mid_click_reports_disappeared() {
    let (engine, page, ids) = engine_with_fixture().await;
    let page_clone = Arc::clone(&page);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        page_clone.lock().await.detach(ids.submit);
    });
    let result = engine
        .handle("human.click", &json!({ "selector": "#submit" }))
        .await
        .unwrap();
    assert_eq!(result["clicked"], false);
    assert_eq!(result["reason"], "element-disappeared");
}

// ── Typing ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn human_type_fills_the_input_with_per_key_pacing() {
    let (engine, page, ids) = engine_with_fixture().await;
    let clicked = engine
        .handle("human.click", &json!({ "selector": "#text-input" }))
        .await
        .unwrap();
    assert_eq!(clicked["clicked"], true);

    let started = tokio::time::Instant::now();
    let typed = engine
        .handle(
            "human.type",
            &json!({ "selector": "#text-input", "text": "Hello world" }),
        )
        .await
        .unwrap();
    assert_eq!(typed["typed"], true);

    // At least 50 ms per character of virtual time.
    assert!(started.elapsed() >= std::time::Duration::from_millis(11 * 50));

    let page = page.lock().await;
    assert_eq!(page.element(ids.text_input).unwrap().value, "Hello world");
    assert_eq!(page.count_events(EventKind::KeyDown, ids.text_input), 11);
    assert_eq!(page.count_events(EventKind::Input, ids.text_input), 11);
    assert_eq!(page.count_events(EventKind::KeyPress, ids.text_input), 11);
}

#[tokio::test(start_paused = true)]
async fn typing_into_a_trap_reports_the_click_refusal() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    let result = engine
        .handle(
            "human.type",
            &json!({ "selector": "#hp-opacity", "text": "x" }),
        )
        .await
        .unwrap();
    assert_eq!(result["typed"], false);
    assert_eq!(result["reason"], "opacity-zero");
}

#[tokio::test(start_paused = true)]
async fn dropdown_arrow_enter_selects_second_option_with_one_change() {
    let (engine, page, ids) = engine_with_fixture().await;
    let clicked = engine
        .handle("human.click", &json!({ "selector": "#dropdown" }))
        .await
        .unwrap();
    assert_eq!(clicked["clicked"], true);

    let typed = engine
        .handle(
            "human.type",
            &json!({ "selector": "#dropdown", "text": "{ArrowDown}{Enter}" }),
        )
        .await
        .unwrap();
    assert_eq!(typed["typed"], true);

    let page = page.lock().await;
    assert_eq!(page.select_value(ids.dropdown).as_deref(), Some("second"));
    assert_eq!(page.count_events(EventKind::Change, ids.dropdown), 1);
}

#[tokio::test(start_paused = true)]
async fn select_all_chord_selects_without_inserting() {
    let (engine, page, ids) = engine_with_fixture().await;
    engine
        .handle(
            "dom.setValue",
            &json!({ "selector": "#text-input", "value": "abc" }),
        )
        .await
        .unwrap();
    engine
        .handle("dom.focus", &json!({ "selector": "#text-input" }))
        .await
        .unwrap();
    engine
        .handle("dom.keyDown", &json!({ "key": "Control" }))
        .await
        .unwrap();
    engine
        .handle("dom.type", &json!({ "text": "a" }))
        .await
        .unwrap();
    engine
        .handle("dom.keyUp", &json!({ "key": "Control" }))
        .await
        .unwrap();

    let page = page.lock().await;
    let el = page.element(ids.text_input).unwrap();
    assert_eq!(el.value, "abc");
    assert_eq!((el.selection_start, el.selection_end), (0, 3));
}

#[tokio::test(start_paused = true)]
async fn clear_input_empties_the_value() {
    let (engine, page, ids) = engine_with_fixture().await;
    engine
        .handle(
            "dom.setValue",
            &json!({ "selector": "#text-input", "value": "stale draft" }),
        )
        .await
        .unwrap();
    let cleared = engine
        .handle("human.clearInput", &json!({ "selector": "#text-input" }))
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], true);

    let page = page.lock().await;
    assert_eq!(page.element(ids.text_input).unwrap().value, "");
}

// ── Scrolling ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn plain_scroll_reports_before_and_after() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    let first = engine
        .handle("dom.scroll", &json!({ "amount": 500 }))
        .await
        .unwrap();
    assert_eq!(first["scrolled"], true);
    assert_eq!(first["before"], 0.0);
    assert_eq!(first["after"], 500.0);

    // Exhaust the document, then detect the bottom by before == after.
    engine
        .handle("dom.scroll", &json!({ "amount": 100000 }))
        .await
        .unwrap();
    let stuck = engine
        .handle("dom.scroll", &json!({ "amount": 100 }))
        .await
        .unwrap();
    assert_eq!(stuck["scrolled"], false);
    assert_eq!(stuck["before"], stuck["after"]);
}

#[tokio::test(start_paused = true)]
async fn human_scroll_moves_the_window_and_reports_amount() {
    let (engine, page, _ids) = engine_with_fixture().await;
    let result = engine
        .handle("human.scroll", &json!({ "direction": "down", "amount": 600 }))
        .await
        .unwrap();
    assert_eq!(result["scrolled"], true);
    assert_eq!(result["amount"], 600.0);
    // Back-scrolls may leave us short of 600, never past it.
    let y = page.lock().await.scroll_y;
    assert!(y > 300.0 && y <= 600.0, "scroll_y = {y}");
}

#[tokio::test(start_paused = true)]
async fn human_scroll_targets_scrollable_elements() {
    let (engine, page, ids) = engine_with_fixture().await;
    let result = engine
        .handle(
            "human.scroll",
            &json!({ "selector": "#feed", "amount": 400, "config": { "backScrollChance": 0.0 } }),
        )
        .await
        .unwrap();
    assert_eq!(result["scrolled"], true);
    let page = page.lock().await;
    assert_eq!(page.element(ids.feed).unwrap().scroll_top, 400.0);
    assert_eq!(page.scroll_y, 0.0);
}

// ── waitForSelector ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wait_for_selector_times_out_to_null() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    let result = engine
        .handle(
            "dom.waitForSelector",
            &json!({ "selector": "#late", "timeout": 500 }),
        )
        .await
        .unwrap();
    assert!(result.is_null());
}

#[tokio::test(start_paused = true)]
async fn wait_for_selector_sees_late_insertions() {
    let (engine, page, _ids) = engine_with_fixture().await;
    let page_clone = Arc::clone(&page);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        page_clone
            .lock()
            .await
            .add(hb_page::ElementInit::tag("div").id("late").rect(0.0, 0.0, 10.0, 10.0));
    });
    let result = engine
        .handle(
            "dom.waitForSelector",
            &json!({ "selector": "#late", "timeout": 5000 }),
        )
        .await
        .unwrap();
    assert_eq!(result["tag"], "div");
    assert!(result["handleId"].as_str().unwrap().starts_with("el_"));
}

// ── Handles and config ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stale_handles_error_by_kind() {
    let (engine, page, ids) = engine_with_fixture().await;
    let found = engine
        .handle("dom.querySelector", &json!({ "selector": "#home" }))
        .await
        .unwrap();
    let handle = found["handleId"].as_str().unwrap().to_string();

    page.lock().await.detach(ids.home_link);
    let err = engine
        .handle("dom.elementHTML", &json!({ "handleId": handle }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stale"), "{err}");

    let err = engine
        .handle("dom.elementHTML", &json!({ "handleId": "el_999" }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Handle not found"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn sweeper_honours_reconfigured_ttl() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    engine
        .handle(
            "framework.setConfig",
            &json!({ "handles": { "ttlMs": 1000, "cleanupIntervalMs": 100 } }),
        )
        .await
        .unwrap();
    let found = engine
        .handle("dom.querySelector", &json!({ "selector": "#home" }))
        .await
        .unwrap();
    let handle = found["handleId"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(3000)).await;

    let err = engine
        .handle("dom.elementHTML", &json!({ "handleId": handle }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Handle not found"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn set_config_round_trips_through_get_config() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    engine
        .handle(
            "framework.setConfig",
            &json!({ "click": { "thinkDelayMin": 10, "thinkDelayMax": 20 } }),
        )
        .await
        .unwrap();
    let config = engine
        .handle("framework.getConfig", &json!({}))
        .await
        .unwrap();
    assert_eq!(config["click"]["thinkDelayMin"], 10);
    assert_eq!(config["click"]["thinkDelayMax"], 20);
    // Untouched groups keep their defaults.
    assert_eq!(config["handles"]["cleanupIntervalMs"], 60_000);
}

#[tokio::test(start_paused = true)]
async fn concurrent_actions_on_one_tab_are_serialized() {
    let (engine, page, ids) = engine_with_fixture().await;
    engine
        .handle("dom.focus", &json!({ "selector": "#text-input" }))
        .await
        .unwrap();

    // Two typing streams racing on the same tab must not interleave.
    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.handle("dom.type", &json!({ "text": "aaaa" })).await })
    };
    let second = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.handle("dom.type", &json!({ "text": "bbbb" })).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let page = page.lock().await;
    let value = &page.element(ids.text_input).unwrap().value;
    assert!(
        value == "aaaabbbb" || value == "bbbbaaaa",
        "interleaved value: {value}"
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_action_is_a_typed_error() {
    let (engine, _page, _ids) = engine_with_fixture().await;
    let err = engine
        .handle("dom.teleport", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown action"), "{err}");
}
