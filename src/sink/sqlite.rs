//! SQLite sink over diesel-async.
//!
//! A single connection behind an async mutex serializes upserts from all
//! concurrent sessions. `SyncConnectionWrapper` runs the blocking SQLite
//! calls on tokio's blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tokio::sync::Mutex;
use tracing::info;

use super::{check_persistable, RecordSink, SinkError, SinkResult};
use crate::models::CandidateRecord;
use crate::schema::reviews;

/// Async SQLite connection using SyncConnectionWrapper.
pub type AsyncSqliteConnection = SyncConnectionWrapper<SqliteConnection>;

const CREATE_REVIEWS: &str = "CREATE TABLE IF NOT EXISTS reviews (
    source_id TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    author TEXT NOT NULL,
    rating INTEGER NOT NULL,
    review_text TEXT NOT NULL,
    raw_date TEXT NOT NULL DEFAULT '',
    normalized_date TEXT NOT NULL DEFAULT '',
    observed_at TEXT NOT NULL,
    PRIMARY KEY (source_id, fingerprint)
)";

/// Review row from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ReviewRecord {
    source_id: String,
    fingerprint: String,
    author: String,
    rating: i32,
    review_text: String,
    raw_date: String,
    normalized_date: String,
    observed_at: String,
}

/// New review for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = reviews)]
struct NewReview<'a> {
    source_id: &'a str,
    fingerprint: &'a str,
    author: &'a str,
    rating: i32,
    review_text: &'a str,
    raw_date: &'a str,
    normalized_date: &'a str,
    observed_at: String,
}

impl<'a> NewReview<'a> {
    fn from_record(source_id: &'a str, record: &'a CandidateRecord) -> Self {
        Self {
            source_id,
            fingerprint: &record.fingerprint,
            author: &record.author,
            rating: i32::from(record.rating),
            review_text: &record.text,
            raw_date: &record.raw_date,
            normalized_date: &record.normalized_date,
            observed_at: record.observed_at.to_rfc3339(),
        }
    }
}

impl ReviewRecord {
    fn into_record(self) -> SinkResult<CandidateRecord> {
        let observed_at = DateTime::parse_from_rfc3339(&self.observed_at)
            .map_err(|e| {
                SinkError::Database(format!("bad observed_at '{}': {}", self.observed_at, e))
            })?
            .with_timezone(&Utc);

        Ok(CandidateRecord {
            fingerprint: self.fingerprint,
            author: self.author,
            rating: u8::try_from(self.rating).unwrap_or(0),
            text: self.review_text,
            raw_date: self.raw_date,
            normalized_date: self.normalized_date,
            source_id: self.source_id,
            observed_at,
        })
    }
}

/// Persistent sink backed by one SQLite file.
pub struct SqliteSink {
    conn: Mutex<AsyncSqliteConnection>,
}

impl SqliteSink {
    /// Open (creating if needed) the database and its `reviews` table.
    pub async fn open(database_url: &str) -> SinkResult<Self> {
        // Strip sqlite: prefix if present for diesel
        let url = database_url
            .strip_prefix("sqlite:")
            .unwrap_or(database_url);

        let mut conn = AsyncSqliteConnection::establish(url).await?;
        diesel::sql_query(CREATE_REVIEWS).execute(&mut conn).await?;

        info!("Opened review store at {}", url);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn upsert(&self, source_id: &str, record: &CandidateRecord) -> SinkResult<()> {
        check_persistable(record)?;

        let row = NewReview::from_record(source_id, record);
        let mut conn = self.conn.lock().await;
        diesel::replace_into(reviews::table)
            .values(&row)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn list(&self, source_id: Option<&str>) -> SinkResult<Vec<CandidateRecord>> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<ReviewRecord> = match source_id {
            Some(s) => {
                reviews::table
                    .filter(reviews::source_id.eq(s))
                    .order((reviews::observed_at.asc(), reviews::fingerprint.asc()))
                    .select(ReviewRecord::as_select())
                    .load(&mut *conn)
                    .await?
            }
            None => {
                reviews::table
                    .order((
                        reviews::source_id.asc(),
                        reviews::observed_at.asc(),
                        reviews::fingerprint.asc(),
                    ))
                    .select(ReviewRecord::as_select())
                    .load(&mut *conn)
                    .await?
            }
        };

        rows.into_iter().map(ReviewRecord::into_record).collect()
    }

    async fn count(&self, source_id: Option<&str>) -> SinkResult<usize> {
        let mut conn = self.conn.lock().await;
        let n: i64 = match source_id {
            Some(s) => {
                reviews::table
                    .filter(reviews::source_id.eq(s))
                    .count()
                    .get_result(&mut *conn)
                    .await?
            }
            None => reviews::table.count().get_result(&mut *conn).await?,
        };
        Ok(n.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(fp: &str, text: &str) -> CandidateRecord {
        CandidateRecord {
            fingerprint: fp.to_string(),
            author: "Ann".to_string(),
            rating: 4,
            text: text.to_string(),
            raw_date: "3 days ago".to_string(),
            normalized_date: "2024-01-07".to_string(),
            source_id: "s1".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
        }
    }

    async fn open_temp() -> (tempfile::TempDir, SqliteSink) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.db");
        let sink = SqliteSink::open(&path.display().to_string()).await.unwrap();
        (dir, sink)
    }

    #[tokio::test]
    async fn test_upsert_and_list_roundtrip() {
        let (_dir, sink) = open_temp().await;
        let original = record("a", "Lovely staff and good coffee");
        sink.upsert("s1", &original).await.unwrap();

        let records = sink.list(Some("s1")).await.unwrap();
        assert_eq!(records, vec![original]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let (_dir, sink) = open_temp().await;
        sink.upsert("s1", &record("a", "First version of it")).await.unwrap();
        sink.upsert("s1", &record("a", "Second version of it")).await.unwrap();
        sink.upsert("s2", &record("a", "Other source entirely")).await.unwrap();

        assert_eq!(sink.count(Some("s1")).await.unwrap(), 1);
        assert_eq!(sink.count(None).await.unwrap(), 2);
        assert_eq!(
            sink.list(Some("s1")).await.unwrap()[0].text,
            "Second version of it"
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.db").display().to_string();
        {
            let sink = SqliteSink::open(&path).await.unwrap();
            sink.upsert("s1", &record("a", "Persisted across opens")).await.unwrap();
        }
        let sink = SqliteSink::open(&format!("sqlite:{}", path)).await.unwrap();
        assert_eq!(sink.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_record() {
        let (_dir, sink) = open_temp().await;
        let err = sink.upsert("s1", &record("a", "tiny")).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(sink.count(None).await.unwrap(), 0);
    }
}
