//! Review body extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{collapse_ws, compile, first_text};

type TextStrategy = fn(ElementRef<'_>) -> Option<String>;

const STRATEGIES: &[TextStrategy] = &[by_body_selector, by_longest_text_node];

static BODY_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        ".MyEned .wiI7pd",
        ".d5K5Pd",
        ".review-full-text",
        "[data-review-text]",
        "[itemprop='reviewBody']",
        ".wiI7pd",
    ])
});

/// Tags whose text never belongs to the review body.
const EXCLUDED_TAGS: &[&str] = &["button", "a", "script", "style", "noscript"];

/// Class fragments marking rating or date widgets.
const EXCLUDED_CLASS_HINTS: &[&str] = &["rating", "date", "time"];

pub(super) fn extract(block: ElementRef<'_>) -> Option<String> {
    STRATEGIES.iter().find_map(|strategy| strategy(block))
}

fn by_body_selector(block: ElementRef<'_>) -> Option<String> {
    first_text(block, &BODY_SELECTORS)
}

/// The longest text node that is not part of a control or a rating/date
/// widget. Ties go to the earliest node.
fn by_longest_text_node(block: ElementRef<'_>) -> Option<String> {
    block
        .descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node
                .ancestors()
                .take_while(|a| a.id() != block.id())
                .filter_map(ElementRef::wrap)
                .any(is_excluded)
        })
        .map(|(_, text)| collapse_ws(text))
        .filter(|text| !text.is_empty())
        .fold(None, |best: Option<String>, text| match best {
            Some(b) if b.chars().count() >= text.chars().count() => Some(b),
            _ => Some(text),
        })
}

fn is_excluded(el: ElementRef<'_>) -> bool {
    let element = el.value();
    if EXCLUDED_TAGS.contains(&element.name()) {
        return true;
    }
    element.classes().any(|class| {
        let class = class.to_lowercase();
        EXCLUDED_CLASS_HINTS.iter().any(|hint| class.contains(hint))
    })
}
