//! Anti-automation interstitial detection.
//!
//! A snapshot is considered blocked when it contains one of a small set of
//! phrases that only appear on captcha / unusual-traffic pages. The list is
//! kept short and specific so that review text mentioning "robots" or
//! "traffic" does not trip it.

/// Phrases that identify an anti-automation interstitial (lowercase).
const BLOCK_SIGNATURES: &[&str] = &[
    "unusual traffic",
    "not a robot",
    "recaptcha",
    "google.com/sorry",
    "our systems have detected",
    "verify you are human",
    "captcha-form",
    "detected unusual activity",
    "حركة مرور غير عادية",
    "لست روبوت",
];

/// Return the first interstitial phrase found in the snapshot, if any.
pub fn detect_block(snapshot: &str) -> Option<&'static str> {
    let haystack = snapshot.to_lowercase();
    BLOCK_SIGNATURES
        .iter()
        .copied()
        .find(|sig| haystack.contains(sig))
}

/// Whether the snapshot is an anti-automation interstitial.
pub fn is_blocked(snapshot: &str) -> bool {
    detect_block(snapshot).is_some()
}
