//! Data models for reviewharvest.

mod feed;
mod record;

pub use feed::{load_feeds, parse_feeds, FeedDescriptor};
pub use record::{CandidateRecord, MAX_RATING, MIN_TEXT_LEN, UNKNOWN_AUTHOR};
