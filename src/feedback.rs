// User feedback store. Production feedback lives in a Postgres table
// `user_data(prompt text, label boolean, time timestamptz default now())`;
// every operation opens its own connection and closes it before returning.

use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

use crate::errors::FeedbackError;

/// One row of the append-only feedback log.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedbackRecord {
    pub prompt: String,
    pub label: bool,
    pub time: DateTime<Utc>,
}

pub trait FeedbackStore {
    /// Appends one submission, timestamped by the store.
    fn insert(&self, prompt: &str, label: bool) -> impl Future<Output = Result<(), FeedbackError>> + Send;

    /// Full snapshot of the log.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<FeedbackRecord>, FeedbackError>> + Send;
}

#[derive(Clone, Debug)]
pub struct PgFeedbackStore {
    url: String,
}

impl PgFeedbackStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_url(url: Option<&str>) -> Result<Self, FeedbackError> {
        url.map(Self::new).ok_or(FeedbackError::MissingUrl)
    }

    async fn connect(&self) -> Result<PgConnection, FeedbackError> {
        PgConnection::connect(&self.url)
            .await
            .map_err(FeedbackError::Connect)
    }
}

/// Closes `conn` explicitly; a failed close is only logged because the
/// operation itself already finished.
async fn release(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        warn!("closing feedback store connection failed: {err}");
    }
}

impl FeedbackStore for PgFeedbackStore {
    async fn insert(&self, prompt: &str, label: bool) -> Result<(), FeedbackError> {
        if prompt.trim().is_empty() {
            return Err(FeedbackError::EmptyPrompt);
        }
        let mut conn = self.connect().await?;
        let result = sqlx::query("INSERT INTO user_data (prompt, label) VALUES ($1, $2)")
            .bind(prompt)
            .bind(label)
            .execute(&mut conn)
            .await;
        release(conn).await;
        result.map_err(FeedbackError::Query)?;
        debug!(label, "inserted feedback row");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_as::<_, FeedbackRecord>("SELECT prompt, label, time FROM user_data")
            .fetch_all(&mut conn)
            .await;
        release(conn).await;
        result.map_err(FeedbackError::Query)
    }
}

/// Feedback log held in memory. Rows are timestamped with the wall clock unless
/// pushed with an explicit time.
#[derive(Debug, Default)]
pub struct MemoryFeedbackStore {
    rows: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<FeedbackRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn push_at(&self, prompt: impl Into<String>, label: bool, time: DateTime<Utc>) {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(FeedbackRecord {
                prompt: prompt.into(),
                label,
                time,
            });
    }

    pub fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FeedbackStore for MemoryFeedbackStore {
    async fn insert(&self, prompt: &str, label: bool) -> Result<(), FeedbackError> {
        if prompt.trim().is_empty() {
            return Err(FeedbackError::EmptyPrompt);
        }
        self.push_at(prompt, label, Utc::now());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_appends_and_snapshots() {
        let store = MemoryFeedbackStore::new();
        store.insert("Should I learn Rust?", true).await.unwrap();
        store.insert("Is it raining?", false).await.unwrap();

        let rows = store.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].prompt, "Should I learn Rust?");
        assert!(rows[0].label);
        assert!(rows[0].time <= rows[1].time);
    }

    #[tokio::test]
    async fn empty_prompts_are_rejected() {
        let store = MemoryFeedbackStore::new();
        let err = store.insert("  ", true).await.unwrap_err();
        assert!(matches!(err, FeedbackError::EmptyPrompt));
        assert!(store.is_empty());
    }

    #[test]
    fn postgres_store_requires_a_url() {
        assert!(matches!(
            PgFeedbackStore::from_url(None),
            Err(FeedbackError::MissingUrl)
        ));
        assert!(PgFeedbackStore::from_url(Some("postgres://localhost/lucky")).is_ok());
    }
}
