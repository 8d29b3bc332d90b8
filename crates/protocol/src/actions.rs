//! The action namespace.
//!
//! Action names are dotted strings on the wire; the constants here are the
//! complete set the extension understands. Namespace predicates drive the
//! broker's tuning injection.

// Tab actions, handled natively by the page-bridge.
pub const TABS_LIST: &str = "tabs.list";
pub const TABS_NAVIGATE: &str = "tabs.navigate";
pub const TABS_CREATE: &str = "tabs.create";
pub const TABS_CLOSE: &str = "tabs.close";
pub const TABS_ACTIVATE: &str = "tabs.activate";
pub const TABS_RELOAD: &str = "tabs.reload";
pub const TABS_WAIT_FOR_NAVIGATION: &str = "tabs.waitForNavigation";
pub const TABS_SET_VIEWPORT: &str = "tabs.setViewport";
pub const TABS_SCREENSHOT: &str = "tabs.screenshot";

// Cookies and frames.
pub const COOKIES_GET_ALL: &str = "cookies.getAll";
pub const COOKIES_SET: &str = "cookies.set";
pub const FRAMES_LIST: &str = "frames.list";

// DOM reads, executed in the isolated world.
pub const DOM_QUERY_SELECTOR: &str = "dom.querySelector";
pub const DOM_QUERY_SELECTOR_ALL: &str = "dom.querySelectorAll";
pub const DOM_QUERY_SELECTOR_WITHIN: &str = "dom.querySelectorWithin";
pub const DOM_QUERY_SELECTOR_ALL_WITHIN: &str = "dom.querySelectorAllWithin";
pub const DOM_WAIT_FOR_SELECTOR: &str = "dom.waitForSelector";
pub const DOM_BOUNDING_BOX: &str = "dom.boundingBox";
pub const DOM_GET_ATTRIBUTE: &str = "dom.getAttribute";
pub const DOM_GET_PROPERTY: &str = "dom.getProperty";
pub const DOM_GET_HTML: &str = "dom.getHTML";
pub const DOM_ELEMENT_HTML: &str = "dom.elementHTML";
pub const DOM_QUERY_ALL_INFO: &str = "dom.queryAllInfo";
pub const DOM_BATCH_QUERY: &str = "dom.batchQuery";
pub const DOM_FIND_SCROLLABLE: &str = "dom.findScrollable";
pub const DOM_DISCOVER_ELEMENTS: &str = "dom.discoverElements";

// DOM writes. `dom.click` is the human pipeline by contract.
pub const DOM_CLICK: &str = "dom.click";
pub const DOM_MOUSE_MOVE_TO: &str = "dom.mouseMoveTo";
pub const DOM_FOCUS: &str = "dom.focus";
pub const DOM_TYPE: &str = "dom.type";
pub const DOM_KEY_PRESS: &str = "dom.keyPress";
pub const DOM_KEY_DOWN: &str = "dom.keyDown";
pub const DOM_KEY_UP: &str = "dom.keyUp";
pub const DOM_SCROLL: &str = "dom.scroll";
pub const DOM_SET_VALUE: &str = "dom.setValue";

// Page-world evaluation (CSP fallback ladder).
pub const DOM_EVALUATE: &str = "dom.evaluate";
pub const DOM_ELEMENT_EVALUATE: &str = "dom.elementEvaluate";
pub const DOM_EVALUATE_HANDLE: &str = "dom.evaluateHandle";

// Debug.
pub const DOM_SET_DEBUG: &str = "dom.setDebug";

// Human behaviour pipelines.
pub const HUMAN_CLICK: &str = "human.click";
pub const HUMAN_TYPE: &str = "human.type";
pub const HUMAN_SCROLL: &str = "human.scroll";
pub const HUMAN_CLEAR_INPUT: &str = "human.clearInput";

// Framework runtime tuning.
pub const FRAMEWORK_SET_CONFIG: &str = "framework.setConfig";
pub const FRAMEWORK_GET_CONFIG: &str = "framework.getConfig";
pub const FRAMEWORK_RELOAD: &str = "framework.reload";

// Cursor persistence, internal to the bridge/engine pair.
pub const CURSOR_GET_POSITION: &str = "cursor.getPosition";
pub const CURSOR_REPORT_POSITION: &str = "cursor.reportPosition";

// Event names.
pub const EVENT_RESPONSE: &str = "response";
pub const EVENT_URL_CHANGED: &str = "urlChanged";
pub const EVENT_COOKIES_CHANGED: &str = "cookiesChanged";

/// Actions executed against the DOM in the isolated world.
pub fn is_dom(action: &str) -> bool {
    action.starts_with("dom.")
}

/// Human-behaviour pipelines.
pub fn is_human(action: &str) -> bool {
    action.starts_with("human.")
}

/// Actions that receive the runtime tuning record on the way through the
/// broker.
pub fn wants_tuning(action: &str) -> bool {
    is_dom(action) || is_human(action)
}

/// Actions the page-bridge serves with host-browser APIs rather than the
/// content script.
pub fn is_browser_native(action: &str) -> bool {
    action.starts_with("tabs.") || action.starts_with("cookies.") || action == FRAMES_LIST
}

/// Evaluation actions that run in the page's main world via the CSP ladder.
pub fn is_evaluation(action: &str) -> bool {
    matches!(action, DOM_EVALUATE | DOM_ELEMENT_EVALUATE | DOM_EVALUATE_HANDLE)
}
