//! Review extraction from structural snapshots.
//!
//! Each field is resolved by an ordered list of pure strategy functions
//! tried in priority order: targeted selectors first, structural fallbacks
//! after. A block that yields no usable text is skipped; extraction as a
//! whole never fails.

mod author;
mod blocks;
mod date;
mod fingerprint;
mod rating;
mod text;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{CandidateRecord, MIN_TEXT_LEN};

pub use date::normalize_relative_date;
pub use fingerprint::{derive_fingerprint, FINGERPRINT_PREFIX_CHARS};
pub use rating::parse_rating;

/// Per-block extraction failure. Always recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no review text found in block")]
    MissingText,
    #[error("review text too short ({0} chars)")]
    TextTooShort(usize),
}

/// Inputs that do not come from the snapshot itself.
#[derive(Debug, Clone)]
pub struct ExtractContext<'a> {
    pub source_id: &'a str,
    pub observed_at: DateTime<Utc>,
    /// Maximum number of records returned.
    pub limit: usize,
}

/// Extract review records from a snapshot.
///
/// Records come back largest-text-first, deduplicated by fingerprint within
/// this call and capped at `ctx.limit`.
pub fn extract_records(html: &str, ctx: &ExtractContext<'_>) -> Vec<CandidateRecord> {
    if ctx.limit == 0 {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let blocks = blocks::locate(&document);

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for block in blocks {
        match extract_block(block, ctx) {
            Ok(record) => {
                if seen.insert(record.fingerprint.clone()) {
                    records.push(record);
                }
            }
            Err(e) => {
                skipped += 1;
                debug!("Skipping review block: {}", e);
            }
        }
    }

    if skipped > 0 {
        debug!(
            "Extracted {} records ({} blocks skipped)",
            records.len(),
            skipped
        );
    }

    // Stable sort keeps document order among equal lengths.
    records.sort_by_key(|r| std::cmp::Reverse(r.text.chars().count()));
    records.truncate(ctx.limit);
    records
}

/// Extract one record from one review block.
fn extract_block(
    block: ElementRef<'_>,
    ctx: &ExtractContext<'_>,
) -> Result<CandidateRecord, ExtractionError> {
    let text = text::extract(block).ok_or(ExtractionError::MissingText)?;
    let len = text.chars().count();
    if len < MIN_TEXT_LEN {
        return Err(ExtractionError::TextTooShort(len));
    }

    let author = author::extract(block);
    let rating = rating::extract(block);
    let raw_date = date::extract(block).unwrap_or_default();
    let normalized_date = normalize_relative_date(&raw_date, ctx.observed_at).unwrap_or_default();
    let fingerprint = fingerprint::block_id(block)
        .unwrap_or_else(|| derive_fingerprint(&text, &author));

    Ok(CandidateRecord {
        fingerprint,
        author,
        rating,
        text,
        raw_date,
        normalized_date,
        source_id: ctx.source_id.to_string(),
        observed_at: ctx.observed_at,
    })
}

/// Compile a list of CSS selectors, dropping any that fail to parse.
fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// Element text with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    collapse_ws(&element.text().collect::<Vec<_>>().join(" "))
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map Arabic-Indic digits (and the Arabic decimal separator) to ASCII.
fn normalize_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{066B}' => '.',
            _ => c,
        })
        .collect()
}

/// First non-empty text among elements matching any of `selectors`, in
/// selector priority order.
fn first_text(block: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        block
            .select(sel)
            .map(element_text)
            .find(|t| !t.is_empty())
    })
}
