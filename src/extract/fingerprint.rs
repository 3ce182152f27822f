//! Record fingerprints.

use scraper::ElementRef;
use sha2::{Digest, Sha256};

/// Number of text characters that feed a derived fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 160;

const ID_ATTRIBUTES: &[&str] = &["data-review-id", "data-reviewid"];

/// Source-provided review id on the block element itself.
pub(super) fn block_id(block: ElementRef<'_>) -> Option<String> {
    ID_ATTRIBUTES.iter().find_map(|attr| {
        block
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

/// Fingerprint derived from the first characters of the text and the author.
pub fn derive_fingerprint(text: &str, author: &str) -> String {
    let prefix: String = text.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b"|");
    hasher.update(author.as_bytes());
    hex::encode(hasher.finalize())
}
