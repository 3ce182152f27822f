//! Review block location.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::compile;

/// Block selectors in priority order. The first selector with any match wins.
static BLOCK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        "div[data-review-id]",
        "[data-reviewid]",
        "div.jftiEf",
        "div.hjmQqc",
        "div.VjjEkf",
        "[itemprop='review']",
    ])
});

/// Locate review blocks in document order.
///
/// Blocks nested inside another matched block are dropped so that a review
/// whose inner container repeats the id attribute is only visited once.
pub(super) fn locate(document: &Html) -> Vec<ElementRef<'_>> {
    for selector in BLOCK_SELECTORS.iter() {
        let matches: Vec<ElementRef<'_>> = document.select(selector).collect();
        if matches.is_empty() {
            continue;
        }

        let ids: HashSet<_> = matches.iter().map(|m| m.id()).collect();
        return matches
            .into_iter()
            .filter(|m| !m.ancestors().any(|a| ids.contains(&a.id())))
            .collect();
    }
    Vec::new()
}
