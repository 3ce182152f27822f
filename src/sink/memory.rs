//! In-memory sink for dry runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_persistable, RecordSink, SinkResult};
use crate::models::CandidateRecord;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<CandidateRecord>,
    /// (source_id, fingerprint) -> index into `records`.
    index: HashMap<(String, String), usize>,
}

/// Lock-based sink keeping records in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<RwLock<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(&self, source_id: &str, record: &CandidateRecord) -> SinkResult<()> {
        check_persistable(record)?;

        let mut stored = record.clone();
        stored.source_id = source_id.to_string();

        let mut inner = self.inner.write().await;
        let key = (source_id.to_string(), record.fingerprint.clone());
        match inner.index.get(&key).copied() {
            Some(i) => inner.records[i] = stored,
            None => {
                let i = inner.records.len();
                inner.records.push(stored);
                inner.index.insert(key, i);
            }
        }
        Ok(())
    }

    async fn list(&self, source_id: Option<&str>) -> SinkResult<Vec<CandidateRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| source_id.map_or(true, |s| r.source_id == s))
            .cloned()
            .collect())
    }

    async fn count(&self, source_id: Option<&str>) -> SinkResult<usize> {
        let inner = self.inner.read().await;
        Ok(match source_id {
            Some(s) => inner.records.iter().filter(|r| r.source_id == s).count(),
            None => inner.records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use chrono::Utc;

    fn record(fp: &str, text: &str) -> CandidateRecord {
        CandidateRecord {
            fingerprint: fp.to_string(),
            author: "Ann".to_string(),
            rating: 5,
            text: text.to_string(),
            raw_date: String::new(),
            normalized_date: String::new(),
            source_id: "s1".to_string(),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let sink = MemorySink::new();
        sink.upsert("s1", &record("a", "First version of it")).await.unwrap();
        sink.upsert("s1", &record("a", "Second version of it")).await.unwrap();
        sink.upsert("s1", &record("b", "Another review text")).await.unwrap();

        assert_eq!(sink.count(Some("s1")).await.unwrap(), 2);
        let records = sink.list(None).await.unwrap();
        assert_eq!(records[0].text, "Second version of it");
        assert_eq!(records[1].fingerprint, "b");
    }

    #[tokio::test]
    async fn test_same_fingerprint_different_sources() {
        let sink = MemorySink::new();
        sink.upsert("s1", &record("a", "Shared fingerprint")).await.unwrap();
        sink.upsert("s2", &record("a", "Shared fingerprint")).await.unwrap();

        assert_eq!(sink.count(None).await.unwrap(), 2);
        assert_eq!(sink.count(Some("s2")).await.unwrap(), 1);
        assert_eq!(sink.list(Some("s2")).await.unwrap()[0].source_id, "s2");
    }

    #[tokio::test]
    async fn test_rejects_short_text() {
        let sink = MemorySink::new();
        let err = sink.upsert("s1", &record("a", "short")).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(sink.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_upserts() {
        let sink = MemorySink::new();
        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let fp = format!("fp-{}", i % 5);
                sink.upsert("s1", &record(&fp, "Concurrent review body")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(sink.count(Some("s1")).await.unwrap(), 5);
    }
}
