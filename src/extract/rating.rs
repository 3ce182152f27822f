//! Star rating extraction.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{collapse_ws, compile, element_text, normalize_digits};
use crate::models::MAX_RATING;

type RatingStrategy = fn(ElementRef<'_>) -> Option<u8>;

const STRATEGIES: &[RatingStrategy] = &[by_image_label, by_glyph, by_star_label];

/// Rating phrasings, tried in order. Group 1 is the value.
static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\brated\s+(\d+(?:\.\d+)?)").unwrap(),
        Regex::new(r"(?i)\brating\s+of\s+(\d+(?:\.\d+)?)").unwrap(),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s+out\s+of\s+5\b").unwrap(),
        Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*5\b").unwrap(),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*stars?\b").unwrap(),
        Regex::new(r"(\d+(?:\.\d+)?)\s*(?:نجوم|نجمة|نجمات)").unwrap(),
        // A label that is nothing but the number.
        Regex::new(r"^(\d+(?:\.\d+)?)$").unwrap(),
    ]
});

static IMAGE_LABELS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| compile(&["[role='img'][aria-label]"]));

static GLYPHS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| compile(&[".fontBodyLarge.fzvQIb", ".Rab10", ".kvMYJc"]));

static LABELLED: LazyLock<Vec<Selector>> = LazyLock::new(|| compile(&["[aria-label]"]));

/// Resolve the rating. `0` means none was found or it was out of range.
pub(super) fn extract(block: ElementRef<'_>) -> u8 {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(block))
        .unwrap_or(0)
}

/// Parse a rating in `1..=5` from a label or glyph text.
///
/// Arabic-Indic and Extended Arabic-Indic digits are accepted.
pub fn parse_rating(label: &str) -> Option<u8> {
    let normalized = collapse_ws(&normalize_digits(label));
    let value: f64 = RATING_PATTERNS
        .iter()
        .find_map(|re| re.captures(&normalized))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())?;

    let rounded = value.round();
    if (1.0..=f64::from(MAX_RATING)).contains(&rounded) {
        Some(rounded as u8)
    } else {
        None
    }
}

fn by_image_label(block: ElementRef<'_>) -> Option<u8> {
    IMAGE_LABELS.iter().find_map(|sel| {
        block
            .select(sel)
            .filter_map(|el| el.value().attr("aria-label"))
            .find_map(parse_rating)
    })
}

fn by_glyph(block: ElementRef<'_>) -> Option<u8> {
    GLYPHS.iter().find_map(|sel| {
        block.select(sel).find_map(|el| match el.value().attr("aria-label") {
            Some(label) => parse_rating(label),
            None => parse_rating(&element_text(el)),
        })
    })
}

/// Any labelled element that talks about stars.
fn by_star_label(block: ElementRef<'_>) -> Option<u8> {
    LABELLED.iter().find_map(|sel| {
        block
            .select(sel)
            .filter_map(|el| el.value().attr("aria-label"))
            .filter(|label| {
                let lower = label.to_lowercase();
                lower.contains("star") || lower.contains("نجم")
            })
            .find_map(parse_rating)
    })
}
