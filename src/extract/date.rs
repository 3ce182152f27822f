//! Review date extraction and relative-date normalization.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{collapse_ws, compile, first_text, normalize_digits};

type DateStrategy = fn(ElementRef<'_>) -> Option<String>;

const STRATEGIES: &[DateStrategy] = &[by_date_selector, by_date_like_text];

static DATE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        ".rsqaWe",
        ".xRkPPb",
        ".bHyEBc",
        ".dehysf",
        "time",
        ".review-date",
        "[data-review-date]",
    ])
});

/// Text nodes longer than this are review bodies, not dates.
const MAX_DATE_TEXT_CHARS: usize = 60;

static DATE_LIKE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:\d+|an?|one)\s+(?:minute|hour|day|week|month|year)s?\s+ago\b")
            .unwrap(),
        Regex::new(r"(?:قبل|منذ)\s+\S+").unwrap(),
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(),
        Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap(),
    ]
});

/// Source suffixes such as "on Google" that follow some relative dates.
static SOURCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+on\s+.*$").unwrap());

static ENGLISH_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+|an?|one)\s+(minute|hour|day|week|month|year)s?\b").unwrap()
});

static ARABIC_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:قبل|منذ)\s+(\d+)\s*(يوم|أيام|ايام|أسبوع|اسبوع|أسابيع|اسابيع|شهر|أشهر|اشهر|شهور|سنة|سنوات|عام|أعوام|اعوام)")
        .unwrap()
});

static ARABIC_DUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:قبل|منذ)\s+(يومين|أسبوعين|اسبوعين|شهرين|سنتين|عامين)").unwrap()
});

static ARABIC_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:قبل|منذ)\s+(يوم|أسبوع|اسبوع|شهر|سنة|عام)\b").unwrap()
});

/// Raw date string shown on the block, if any.
pub(super) fn extract(block: ElementRef<'_>) -> Option<String> {
    STRATEGIES.iter().find_map(|strategy| strategy(block))
}

fn by_date_selector(block: ElementRef<'_>) -> Option<String> {
    first_text(block, &DATE_SELECTORS)
}

/// First short text node that looks like a date.
fn by_date_like_text(block: ElementRef<'_>) -> Option<String> {
    block
        .descendants()
        .filter_map(|node| node.value().as_text())
        .map(|text| collapse_ws(text))
        .filter(|text| !text.is_empty() && text.chars().count() <= MAX_DATE_TEXT_CHARS)
        .find(|text| DATE_LIKE.iter().any(|re| re.is_match(text)))
}

/// Normalize a relative date phrase to `YYYY-MM-DD` against `observed_at`.
///
/// Months count as 30 days and years as 365. Minutes and hours resolve to
/// the observation day. Returns `None` for anything that is not a relative
/// phrase (absolute dates pass through unchanged at the record level).
pub fn normalize_relative_date(raw: &str, observed_at: DateTime<Utc>) -> Option<String> {
    let text = normalize_digits(&raw.trim().to_lowercase());
    let text = SOURCE_SUFFIX.replace(&text, "");
    let days = relative_days(&text)?;
    let delta = TimeDelta::try_days(days)?;
    observed_at
        .checked_sub_signed(delta)
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Days before the observation time described by a relative phrase.
fn relative_days(text: &str) -> Option<i64> {
    if let Some(caps) = ENGLISH_RELATIVE.captures(text) {
        let count = match &caps[1] {
            "a" | "an" | "one" => 1,
            n => n.parse::<i64>().ok()?,
        };
        return count.checked_mul(unit_days(&caps[2])?);
    }

    if let Some(caps) = ARABIC_NUMERIC.captures(text) {
        let count: i64 = caps[1].parse().ok()?;
        return count.checked_mul(unit_days(&caps[2])?);
    }

    if let Some(caps) = ARABIC_DUAL.captures(text) {
        return unit_days(&caps[1]).map(|d| d * 2);
    }

    if let Some(caps) = ARABIC_SINGLE.captures(text) {
        return unit_days(&caps[1]);
    }

    None
}

fn unit_days(unit: &str) -> Option<i64> {
    let days = match unit {
        "minute" | "hour" => 0,
        "day" | "يوم" | "أيام" | "ايام" | "يومين" => 1,
        "week" | "أسبوع" | "اسبوع" | "أسابيع" | "اسابيع" | "أسبوعين" | "اسبوعين" => 7,
        "month" | "شهر" | "أشهر" | "اشهر" | "شهور" | "شهرين" => 30,
        "year" | "سنة" | "سنوات" | "عام" | "أعوام" | "اعوام" | "سنتين" | "عامين" => 365,
        _ => return None,
    };
    Some(days)
}
