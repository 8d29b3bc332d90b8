//! Human input clearing: click to focus, triple-click to select all,
//! brief pause, Backspace.

use serde_json::{Value, json};

use hb_page::{EventKind, PageEvent};

use crate::{
    engine::Engine,
    error::Result,
    human::{click, sleep_range},
    keyboard::{self, Press},
    keys::Token,
};

pub(crate) async fn run(engine: &Engine, params: &Value) -> Result<Value> {
    // Focus with the full click pipeline; refusals come back phrased for
    // clearing.
    let outcome = click::run_inner(engine, params, "cleared").await?;
    if outcome.is_null() {
        return Ok(Value::Null);
    }
    if outcome.get("cleared").is_some() {
        return Ok(outcome);
    }

    let node = {
        let page = engine.page.lock().await;
        let mut handles = engine.handles.lock().await;
        crate::resolve::target(&page, &mut handles, params)?
    };

    // Two more presses complete the triple-click.
    for _ in 0..2 {
        click::inter_click_pause().await;
        let mut page = engine.page.lock().await;
        let (cx, cy) = *engine.cursor.lock().await;
        if let Some(hit) = page.element_from_point(cx, cy) {
            page.dispatch(PageEvent::mouse(EventKind::MouseDown, hit, cx, cy));
            page.dispatch(PageEvent::mouse(EventKind::MouseUp, hit, cx, cy));
            page.dispatch(PageEvent::mouse(EventKind::Click, hit, cx, cy));
        }
    }

    // Triple-click selects everything.
    {
        let mut page = engine.page.lock().await;
        let len = page.element(node)?.value.chars().count();
        page.set_selection_range(node, 0, len)?;
    }

    sleep_range(80, 200).await;
    keyboard::press(engine, &Token::Key("Backspace".into()), Press::Full).await?;

    Ok(json!({ "cleared": true }))
}
