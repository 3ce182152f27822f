//! Page scripts and selectors used by the harvest loop.
//!
//! Scripts are JavaScript function expressions. [`invocation`] turns one
//! plus JSON arguments into an evaluable expression. Every script returns a
//! JSON-serializable value.

use serde_json::Value;

/// Selectors that open the full reviews panel, tried in order.
pub const PANEL_TRIGGERS: &[&str] = &[
    "button[aria-label*='Reviews']",
    "button[aria-label*='reviews']",
    "a[href*='/reviews']",
    "button[jsaction*='pane.review']",
    "div[role='button'][aria-label*='reviews']",
];

/// The reviews dialog or scroll box once opened.
pub const PANEL_SELECTOR: &str =
    "div[role='dialog'], div.section-scrollbox, div[aria-modal='true']";

/// Main content region that must exist before harvesting starts.
pub const MAIN_PANEL: &str = "div[role='main'], div[role='region']";

/// Scroll every scrollable feed container by `px`; falls back to the window.
///
/// Returns the number of containers scrolled.
pub const SCROLL_STEP: &str = r#"(px) => {
    const candidates = Array.from(document.querySelectorAll(
        "div[role='feed'], div.m6QErb, div[role='dialog'] div, div[aria-modal='true'] div, div.section-scrollbox"
    ));
    let scrolled = 0;
    for (const el of candidates) {
        if (el.scrollHeight > el.clientHeight + 10) {
            el.scrollBy(0, px);
            scrolled += 1;
        }
    }
    if (scrolled === 0) {
        window.scrollBy(0, px);
    }
    return scrolled;
}"#;

/// Height of the tallest scrollable container (or the document).
pub const FEED_HEIGHT: &str = r#"() => {
    let best = document.body ? document.body.scrollHeight : 0;
    for (const el of document.querySelectorAll("div[role='feed'], div.m6QErb, div[role='dialog'] div")) {
        if (el.scrollHeight > el.clientHeight + 10 && el.scrollHeight > best) {
            best = el.scrollHeight;
        }
    }
    return best;
}"#;

/// Click collapsed "More" controls (and optionally "See translation").
///
/// Returns the number of controls clicked.
pub const EXPAND_MORE: &str = r#"(clickTranslations) => {
    const labels = ['more', 'see more', 'read more', 'المزيد', 'عرض المزيد'];
    const translation = ['see translation', 'translate', 'see original', 'عرض الترجمة', 'ترجمة'];
    let clicked = 0;
    for (const el of document.querySelectorAll("button, a, span[role='button'], div[role='button']")) {
        const text = (el.innerText || el.getAttribute('aria-label') || '').trim().toLowerCase();
        if (!text || text.length > 40) continue;
        const isMore = labels.some((l) => text === l || text.startsWith(l + ' '))
            || el.classList.contains('w8nwRe');
        const isTranslation = clickTranslations && translation.some((l) => text.includes(l));
        if (isMore || isTranslation) {
            try { el.click(); clicked += 1; } catch (e) {}
        }
    }
    return clicked;
}"#;

/// Click the first control whose text mentions all reviews.
///
/// Returns true when something was clicked.
pub const OPEN_PANEL_BY_TEXT: &str = r#"() => {
    const phrases = ['see all reviews', 'show all reviews', 'all reviews', 'more reviews', 'جميع المراجعات', 'المزيد من المراجعات'];
    for (const el of document.querySelectorAll("button, a, div[role='button'], span[role='button']")) {
        const text = (el.innerText || el.getAttribute('aria-label') || '').trim().toLowerCase();
        if (text && phrases.some((p) => text.includes(p))) {
            try { el.click(); return true; } catch (e) {}
        }
    }
    return false;
}"#;

/// Open the sort menu and choose the next ordering.
///
/// Returns the label of the ordering chosen, or null.
pub const SORT_CYCLE: &str = r#"(index) => {
    const trigger = document.querySelector(
        "button[aria-label*='Sort'], button[aria-label*='sort'], button[data-value='Sort'], button[aria-label*='ترتيب']"
    );
    if (!trigger) return null;
    trigger.click();
    const options = Array.from(document.querySelectorAll("div[role='menuitemradio'], li[role='menuitemradio']"));
    if (options.length === 0) return null;
    const choice = options[index % options.length];
    choice.click();
    return (choice.innerText || '').trim() || String(index);
}"#;

/// Build an evaluable expression that calls `script` with `args`.
pub fn invocation(script: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})({})", script.trim(), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_serializes_args() {
        assert_eq!(invocation("(px) => px", &[json!(900)]), "((px) => px)(900)");
        assert_eq!(
            invocation("(a, b) => a", &[json!("it's"), json!(true)]),
            "((a, b) => a)(\"it's\", true)"
        );
        assert_eq!(invocation("() => 1", &[]), "(() => 1)()");
    }

    #[test]
    fn test_scripts_are_function_expressions() {
        for script in [SCROLL_STEP, FEED_HEIGHT, EXPAND_MORE, OPEN_PANEL_BY_TEXT, SORT_CYCLE] {
            assert!(script.starts_with('('));
            assert!(script.contains("=>"));
        }
    }
}
