//! Author extraction strategies.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{compile, element_text, first_text};
use crate::models::UNKNOWN_AUTHOR;

type AuthorStrategy = fn(ElementRef<'_>) -> Option<String>;

const STRATEGIES: &[AuthorStrategy] = &[by_name_class, by_name_button_id, by_profile_control];

static NAME_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        ".d4r55",
        ".IaK8zc",
        ".CVo7Bb",
        ".kyCNSe",
        ".PrHqRd",
        ".NiCqic",
        "[itemprop='author']",
    ])
});

static NAME_BUTTON: LazyLock<Vec<Selector>> =
    LazyLock::new(|| compile(&["[id^='ml-reviews-page-user-review-name-']"]));

static CONTROLS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(&["button[aria-label], a[aria-label]"]));

/// Resolve the author, falling back to [`UNKNOWN_AUTHOR`].
pub(super) fn extract(block: ElementRef<'_>) -> String {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(block))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

fn by_name_class(block: ElementRef<'_>) -> Option<String> {
    first_text(block, &NAME_SELECTORS)
}

fn by_name_button_id(block: ElementRef<'_>) -> Option<String> {
    first_text(block, &NAME_BUTTON)
}

/// Buttons or links labelled "... profile" wrap the reviewer name.
fn by_profile_control(block: ElementRef<'_>) -> Option<String> {
    CONTROLS.iter().find_map(|sel| {
        block
            .select(sel)
            .filter(|el| {
                el.value()
                    .attr("aria-label")
                    .map(|label| label.trim().to_lowercase().ends_with("profile"))
                    .unwrap_or(false)
            })
            .map(element_text)
            .find(|t| !t.is_empty())
    })
}
