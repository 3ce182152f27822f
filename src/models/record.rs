//! Review record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author sentinel used when no author could be extracted.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Minimum number of characters a review body needs to be kept.
pub const MIN_TEXT_LEN: usize = 10;

/// Highest valid star rating. A rating of 0 means "not detected".
pub const MAX_RATING: u8 = 5;

/// A review extracted from one snapshot of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Source-provided review id, or a hash of text prefix and author.
    pub fingerprint: String,
    pub author: String,
    pub rating: u8,
    pub text: String,
    /// Date string as shown on the page (may be empty).
    pub raw_date: String,
    /// `YYYY-MM-DD` when `raw_date` was a relative phrase, otherwise empty.
    pub normalized_date: String,
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
}

impl CandidateRecord {
    /// Whether this record satisfies the invariants required for persistence.
    pub fn is_persistable(&self) -> bool {
        !self.fingerprint.is_empty()
            && !self.author.is_empty()
            && self.rating <= MAX_RATING
            && self.text.chars().count() >= MIN_TEXT_LEN
    }
}
