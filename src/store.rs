//! Document store (C8/C9 collaborator): record types and the `DocStore`
//! trait workers write through, plus the real MongoDB-backed implementation.
//!
//! Shard selection (C8) lives in [`crate::shard`]; this module only knows
//! how to talk to one already-selected shard database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, CrawlResult};

pub const PAGES_COLLECTION: &str = "pages";
pub const FAILED_TASKS_COLLECTION: &str = "failed_tasks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub host: String,
    pub http_status: u16,
    pub crawl_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_len: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub task_id: String,
    pub url: String,
    pub host: String,
    /// Either a stringified HTTP status or the sentinel `"ERR"`.
    pub status: String,
    pub failed_at: DateTime<Utc>,
    pub rounds: u32,
}

/// Outcome of a single `insert_many` call: either every document landed, or
/// the store reported how many of them did (a `BulkWriteError`-style partial
/// failure, per §4.8 — any other error is the caller's to swallow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
}

#[async_trait]
pub trait DocStore: Send + Sync {
    async fn insert_successes(
        &self,
        shard: &str,
        records: &[SuccessRecord],
    ) -> CrawlResult<InsertOutcome>;

    async fn insert_failures(
        &self,
        shard: &str,
        records: &[FailureRecord],
    ) -> CrawlResult<InsertOutcome>;
}

/// Real store against MongoDB. Each shard is its own database named
/// `"{db_prefix}{shard_index}"`, with fixed `pages`/`failed_tasks`
/// collections in each.
pub struct MongoStore {
    client: mongodb::Client,
    db_prefix: String,
}

impl MongoStore {
    pub async fn connect(mongo_url: &str, db_prefix: impl Into<String>) -> CrawlResult<Self> {
        let client = mongodb::Client::with_uri_str(mongo_url)
            .await
            .map_err(|e| CrawlError::Store(e.to_string()))?;
        Ok(Self {
            client,
            db_prefix: db_prefix.into(),
        })
    }

    fn database(&self, shard: &str) -> mongodb::Database {
        self.client.database(&format!("{}{shard}", self.db_prefix))
    }
}

#[async_trait]
impl DocStore for MongoStore {
    async fn insert_successes(
        &self,
        shard: &str,
        records: &[SuccessRecord],
    ) -> CrawlResult<InsertOutcome> {
        if records.is_empty() {
            return Ok(InsertOutcome { inserted: 0 });
        }
        let collection = self
            .database(shard)
            .collection::<SuccessRecord>(PAGES_COLLECTION);
        insert_unordered(collection, records).await
    }

    async fn insert_failures(
        &self,
        shard: &str,
        records: &[FailureRecord],
    ) -> CrawlResult<InsertOutcome> {
        if records.is_empty() {
            return Ok(InsertOutcome { inserted: 0 });
        }
        let collection = self
            .database(shard)
            .collection::<FailureRecord>(FAILED_TASKS_COLLECTION);
        insert_unordered(collection, records).await
    }
}

async fn insert_unordered<T>(
    collection: mongodb::Collection<T>,
    records: &[T],
) -> CrawlResult<InsertOutcome>
where
    T: Serialize + Send + Sync,
{
    let options = mongodb::options::InsertManyOptions::builder()
        .ordered(false)
        .build();
    match collection.insert_many(records).with_options(options).await {
        Ok(result) => Ok(InsertOutcome {
            inserted: result.inserted_ids.len() as u64,
        }),
        Err(err) => {
            // A partial bulk-write failure still reports how many documents
            // landed before the first duplicate/validation error; anything
            // else (connection loss, auth) is swallowed by the writer, not
            // retried — the store is the sink, and re-running the seeder is
            // the recovery path.
            if let Some(partial) = partial_inserted_count(&err) {
                Ok(InsertOutcome { inserted: partial })
            } else {
                log::error!("document store insert failed: {err}");
                Ok(InsertOutcome { inserted: 0 })
            }
        }
    }
}

fn partial_inserted_count(err: &mongodb::error::Error) -> Option<u64> {
    if let mongodb::error::ErrorKind::InsertMany(ref insert_many) = *err.kind {
        return insert_many
            .write_errors
            .as_ref()
            .map(|_| insert_many.inserted_ids.len() as u64);
    }
    None
}

pub mod memory {
    //! In-memory `DocStore` for unit and end-to-end tests. Plain `pub`,
    //! not `#[cfg(test)]`, so integration tests in `tests/` can use it.
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryStore {
        pages: Mutex<HashMap<String, Vec<SuccessRecord>>>,
        failed: Mutex<HashMap<String, Vec<FailureRecord>>>,
    }

    impl InMemoryStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn all_pages(&self) -> Vec<SuccessRecord> {
            self.pages.lock().await.values().flatten().cloned().collect()
        }

        pub async fn all_failed(&self) -> Vec<FailureRecord> {
            self.failed.lock().await.values().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl DocStore for InMemoryStore {
        async fn insert_successes(
            &self,
            shard: &str,
            records: &[SuccessRecord],
        ) -> CrawlResult<InsertOutcome> {
            self.pages
                .lock()
                .await
                .entry(shard.to_string())
                .or_default()
                .extend(records.iter().cloned());
            Ok(InsertOutcome {
                inserted: records.len() as u64,
            })
        }

        async fn insert_failures(
            &self,
            shard: &str,
            records: &[FailureRecord],
        ) -> CrawlResult<InsertOutcome> {
            self.failed
                .lock()
                .await
                .entry(shard.to_string())
                .or_default()
                .extend(records.iter().cloned());
            Ok(InsertOutcome {
                inserted: records.len() as u64,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn records_round_trip_through_the_store() {
            let store = InMemoryStore::new();
            let record = SuccessRecord {
                id: "1".into(),
                url: "https://example.com".into(),
                host: "example.com".into(),
                http_status: 200,
                crawl_timestamp: Utc::now(),
                html: Some("<html></html>".into()),
                html_len: None,
            };
            store.insert_successes("0", &[record]).await.unwrap();
            assert_eq!(store.all_pages().await.len(), 1);
        }
    }
}
