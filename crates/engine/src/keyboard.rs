//! Keyboard event synthesis and input effects.
//!
//! Events go to the current focus owner (or the body) with the full
//! key/code/keyCode/charCode/modifier set. Value mutation goes through the
//! element's native setter semantics so framework-bound inputs observe the
//! `input` events that follow.

use serde_json::{Value, json};

use hb_page::{EventKind, Modifiers, NodeId, Page, PageEvent};

use crate::{
    engine::Engine,
    error::{Error, Result},
    keys::{self, KeyInfo, Token},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Press {
    /// keydown, effects, keyup.
    Full,
    Down,
    Up,
}

/// Dispatch one token at the focus owner.
pub(crate) async fn press(engine: &Engine, token: &Token, mode: Press) -> Result<()> {
    let info = keys::key_info(token);
    let mut page = engine.page.lock().await;
    let mut modifiers = engine.modifiers.lock().await;
    let target = page.focused().unwrap_or_else(|| page.body());

    match mode {
        Press::Down => {
            if let Token::Key(name) = token
                && keys::is_modifier(name)
            {
                keys::apply_modifier(&mut modifiers, name, true);
            }
            dispatch_key(&mut page, EventKind::KeyDown, target, &info, *modifiers);
        },
        Press::Up => {
            if let Token::Key(name) = token
                && keys::is_modifier(name)
            {
                keys::apply_modifier(&mut modifiers, name, false);
            }
            dispatch_key(&mut page, EventKind::KeyUp, target, &info, *modifiers);
        },
        Press::Full => {
            // A bare modifier token in a typing stream toggles its state:
            // down if currently up, up if currently down. State persists
            // across calls until released.
            if let Token::Key(name) = token
                && keys::is_modifier(name)
            {
                let down = match name.as_str() {
                    "Meta" => modifiers.meta,
                    "Control" => modifiers.ctrl,
                    "Shift" => modifiers.shift,
                    "Alt" => modifiers.alt,
                    _ => false,
                };
                keys::apply_modifier(&mut modifiers, name, !down);
                let kind = if down { EventKind::KeyUp } else { EventKind::KeyDown };
                dispatch_key(&mut page, kind, target, &info, *modifiers);
                return Ok(());
            }

            let mods = *modifiers;
            dispatch_key(&mut page, EventKind::KeyDown, target, &info, mods);
            apply_effect(&mut page, target, token, &info, mods)?;
            dispatch_key(&mut page, EventKind::KeyUp, target, &info, mods);
        },
    }
    Ok(())
}

fn dispatch_key(page: &mut Page, kind: EventKind, target: NodeId, info: &KeyInfo, mods: Modifiers) {
    let char_code = if kind == EventKind::KeyPress {
        info.char_code
    } else {
        0
    };
    page.dispatch(PageEvent::key(
        kind,
        target,
        info.key.clone(),
        info.code.clone(),
        info.key_code,
        char_code,
        mods,
    ));
}

/// The token's observable effect between keydown and keyup.
fn apply_effect(
    page: &mut Page,
    target: NodeId,
    token: &Token,
    info: &KeyInfo,
    mods: Modifiers,
) -> Result<()> {
    let is_input = page.element(target).map(|e| e.is_text_input()).unwrap_or(false);
    let is_select = page.element(target).map(|e| e.is_select()).unwrap_or(false);

    match token {
        Token::Char(c) => {
            // Select-all chord swallows the character.
            if (mods.ctrl || mods.meta) && c.eq_ignore_ascii_case(&'a') {
                if is_input {
                    let len = page.element(target)?.value.chars().count();
                    page.set_selection_range(target, 0, len)?;
                }
                return Ok(());
            }
            dispatch_key(page, EventKind::KeyPress, target, info, mods);
            if is_input {
                replace_selection(page, target, &c.to_string())?;
                page.dispatch(PageEvent::simple(EventKind::Input, target));
            }
        },
        Token::Key(name) => match name.as_str() {
            "Backspace" if is_input => {
                let el = page.element(target)?;
                let (start, end) = (el.selection_start, el.selection_end);
                if start == end && start > 0 {
                    page.set_selection_range(target, start - 1, end)?;
                }
                replace_selection(page, target, "")?;
                page.dispatch(PageEvent::simple(EventKind::Input, target));
            },
            "Delete" if is_input => {
                let el = page.element(target)?;
                let (start, end) = (el.selection_start, el.selection_end);
                let len = el.value.chars().count();
                if start == end && start < len {
                    page.set_selection_range(target, start, end + 1)?;
                }
                replace_selection(page, target, "")?;
                page.dispatch(PageEvent::simple(EventKind::Input, target));
            },
            "ArrowDown" if is_select => {
                let count = page.select_options(target).len();
                let el = page.element_mut(target)?;
                if count > 0 && el.selected_index + 1 < count {
                    el.selected_index += 1;
                }
            },
            "ArrowUp" if is_select => {
                let el = page.element_mut(target)?;
                el.selected_index = el.selected_index.saturating_sub(1);
            },
            // Committing the keyboard selection fires exactly one change.
            "Enter" if is_select => {
                page.dispatch(PageEvent::simple(EventKind::Change, target));
            },
            _ => {},
        },
    }
    Ok(())
}

/// Replace the current selection (or insert at the caret) preserving the
/// caret position, as the native value setter does.
fn replace_selection(page: &mut Page, node: NodeId, replacement: &str) -> Result<()> {
    let el = page.element(node)?;
    let chars: Vec<char> = el.value.chars().collect();
    let (start, end) = (
        el.selection_start.min(chars.len()),
        el.selection_end.min(chars.len()),
    );
    let mut value: String = chars[..start].iter().collect();
    value.push_str(replacement);
    let tail: String = chars[end..].iter().collect();
    value.push_str(&tail);
    let caret = start + replacement.chars().count();

    let el = page.element_mut(node)?;
    el.value = value;
    el.selection_start = caret;
    el.selection_end = caret;
    Ok(())
}

// ── dom.keyPress / dom.keyDown / dom.keyUp ───────────────────────────────────

pub(crate) async fn key_action(engine: &Engine, params: &Value, mode: Press) -> Result<Value> {
    let key = params
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams("missing `key`".into()))?;
    let token = token_for(key);
    press(engine, &token, mode).await?;
    Ok(json!({ "pressed": true, "key": key }))
}

/// A single character is a character token; anything longer is a named key.
pub(crate) fn token_for(key: &str) -> Token {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Token::Char(c),
        _ => Token::Key(key.to_string()),
    }
}

// ── dom.setValue ─────────────────────────────────────────────────────────────

/// Direct value assignment through the native setter, with the
/// `input`/`change` pair frameworks listen for.
pub(crate) async fn set_value(engine: &Engine, params: &Value) -> Result<Value> {
    let value = params
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidParams("missing `value`".into()))?;
    let mut page = engine.page.lock().await;
    let mut handles = engine.handles.lock().await;
    let node = crate::resolve::target(&page, &mut handles, params)?;
    drop(handles);
    page.set_value_native(node, value)?;
    page.dispatch(PageEvent::simple(EventKind::Input, node));
    page.dispatch(PageEvent::simple(EventKind::Change, node));
    Ok(json!({ "set": true }))
}
