//! Per-feed harvest session state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::dedup::DedupStore;
use crate::models::FeedDescriptor;

/// Lifecycle of a harvest session. Anything but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Converged,
    Stagnated,
    TimedOut,
    Blocked,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Converged => "converged",
            Self::Stagnated => "stagnated",
            Self::TimedOut => "timed_out",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by the convergence loop for one feed.
#[derive(Debug)]
pub struct HarvestSession {
    pub target_count: usize,
    seen: DedupStore,
    /// Consecutive iterations without growth (mirrors the stagnation policy).
    pub stagnation_counter: u32,
    /// Driver errors so far.
    pub total_attempts: u32,
    pub iterations: u32,
    /// Records the sink accepted.
    pub new_count: usize,
    pub failed_upserts: usize,
    started: Instant,
    status: SessionStatus,
    reason: Option<String>,
}

impl HarvestSession {
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count,
            seen: DedupStore::new(),
            stagnation_counter: 0,
            total_attempts: 0,
            iterations: 0,
            new_count: 0,
            failed_upserts: 0,
            started: Instant::now(),
            status: SessionStatus::Running,
            reason: None,
        }
    }

    /// Offer a fingerprint to the session's dedup store.
    pub fn admit(&mut self, fingerprint: &str) -> bool {
        self.seen.admit(fingerprint)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Records still wanted before the target is reached.
    pub fn remaining(&self) -> usize {
        self.target_count.saturating_sub(self.seen.len())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Move to a terminal status. Ignored once the session has finished.
    pub fn finish(&mut self, status: SessionStatus, reason: Option<String>) -> bool {
        if !self.is_running() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.reason = reason;
        true
    }

    pub fn into_result(self, feed: &FeedDescriptor) -> SessionResult {
        SessionResult {
            name: feed.name.clone(),
            url: feed.url.clone(),
            source_id: feed.source_id(),
            status: self.status,
            collected_count: self.seen.len(),
            new_count: self.new_count,
            failed_upserts: self.failed_upserts,
            iterations: self.iterations,
            reason: self.reason,
        }
    }
}

/// Outcome reported for one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub name: String,
    pub url: String,
    pub source_id: String,
    pub status: SessionStatus,
    /// Distinct fingerprints seen during the session.
    pub collected_count: usize,
    /// Records successfully upserted.
    pub new_count: usize,
    pub failed_upserts: usize,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SessionResult {
    /// Result for a feed whose session never started.
    pub fn failed(feed: &FeedDescriptor, reason: impl Into<String>) -> Self {
        Self::unstarted(feed, SessionStatus::Failed, reason)
    }

    pub fn cancelled(feed: &FeedDescriptor) -> Self {
        Self::unstarted(feed, SessionStatus::Cancelled, "cancelled")
    }

    fn unstarted(feed: &FeedDescriptor, status: SessionStatus, reason: impl Into<String>) -> Self {
        Self {
            name: feed.name.clone(),
            url: feed.url.clone(),
            source_id: feed.source_id(),
            status,
            collected_count: 0,
            new_count: 0,
            failed_upserts: 0,
            iterations: 0,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_is_final() {
        let mut session = HarvestSession::new(10);
        assert!(session.is_running());
        assert!(session.finish(SessionStatus::Blocked, Some("blocked: recaptcha".into())));
        assert!(!session.finish(SessionStatus::Converged, None));
        assert_eq!(session.status(), SessionStatus::Blocked);
        assert_eq!(session.reason(), Some("blocked: recaptcha"));
    }

    #[test]
    fn test_finish_running_is_rejected() {
        let mut session = HarvestSession::new(10);
        assert!(!session.finish(SessionStatus::Running, None));
        assert!(session.is_running());
    }

    #[test]
    fn test_remaining_saturates() {
        let mut session = HarvestSession::new(2);
        assert_eq!(session.remaining(), 2);
        session.admit("a");
        session.admit("a");
        assert_eq!(session.remaining(), 1);
        session.admit("b");
        session.admit("c");
        assert_eq!(session.remaining(), 0);
        assert_eq!(session.seen_count(), 3);
    }

    #[test]
    fn test_result_serialization() {
        let feed = FeedDescriptor::new("Cafe", "https://maps.example.com/?cid=42");
        let mut session = HarvestSession::new(5);
        session.admit("x");
        session.new_count = 1;
        session.finish(SessionStatus::Converged, None);
        let result = session.into_result(&feed);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "converged");
        assert_eq!(json["source_id"], "42");
        assert_eq!(json["collected_count"], 1);
        assert!(json.get("reason").is_none());
    }
}
