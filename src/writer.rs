//! Batched writer (C9): consumes write items off an in-process channel,
//! buffers by outcome type, and flushes to the document store by size or
//! on shutdown.

use std::sync::Arc;

use crate::runtime::channel::Rx;
use crate::shard::shard_name;
use crate::stats::SharedStats;
use crate::store::{DocStore, FailureRecord, SuccessRecord};

pub enum WriteItem {
    Success(SuccessRecord),
    Failure(FailureRecord),
}

pub struct Writer<S: DocStore> {
    rx: Rx<WriteItem>,
    store: Arc<S>,
    stats: SharedStats,
    batch_size: usize,
    shard_threshold: u64,
    db_prefix: String,
    print_every: u64,
}

impl<S: DocStore> Writer<S> {
    #[must_use]
    pub fn new(
        rx: Rx<WriteItem>,
        store: Arc<S>,
        stats: SharedStats,
        batch_size: usize,
        shard_threshold: u64,
        db_prefix: String,
        print_every: u64,
    ) -> Self {
        Self {
            rx,
            store,
            stats,
            batch_size,
            shard_threshold,
            db_prefix,
            print_every,
        }
    }

    /// Drain the channel until it closes, flushing each buffer whenever it
    /// reaches `batch_size`, and once more on shutdown.
    pub async fn run(mut self) {
        let mut successes: Vec<SuccessRecord> = Vec::with_capacity(self.batch_size);
        let mut failures: Vec<FailureRecord> = Vec::with_capacity(self.batch_size);

        while let Some(item) = self.rx.recv().await {
            match item {
                WriteItem::Success(record) => {
                    successes.push(record);
                    if successes.len() >= self.batch_size {
                        self.flush_successes(&mut successes).await;
                    }
                }
                WriteItem::Failure(record) => {
                    failures.push(record);
                    if failures.len() >= self.batch_size {
                        self.flush_failures(&mut failures).await;
                    }
                }
            }
        }

        self.flush_successes(&mut successes).await;
        self.flush_failures(&mut failures).await;
    }

    async fn flush_successes(&self, buffer: &mut Vec<SuccessRecord>) {
        if buffer.is_empty() {
            return;
        }
        // First record's id determines the shard for the whole batch (§9).
        let shard = shard_name(&buffer[0].id, self.shard_threshold, &self.db_prefix);
        match self.store.insert_successes(&shard, buffer).await {
            Ok(outcome) => {
                self.stats.record_ok(outcome.inserted);
                self.maybe_print_progress();
            }
            Err(err) => log::error!("writer: success flush to {shard} failed: {err}"),
        }
        buffer.clear();
    }

    async fn flush_failures(&self, buffer: &mut Vec<FailureRecord>) {
        if buffer.is_empty() {
            return;
        }
        let shard = shard_name(&buffer[0].task_id, self.shard_threshold, &self.db_prefix);
        match self.store.insert_failures(&shard, buffer).await {
            Ok(outcome) => {
                self.stats.record_fail(outcome.inserted);
                self.maybe_print_progress();
            }
            Err(err) => log::error!("writer: failure flush to {shard} failed: {err}"),
        }
        buffer.clear();
    }

    fn maybe_print_progress(&self) {
        let total = self.stats.ok() + self.stats.fail();
        if self.print_every > 0 && total % self.print_every == 0 && total > 0 {
            println!("PROGRESS_{}K", total / 1000);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::runtime::channel::unbounded;
    use crate::stats::Stats;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn flushes_on_shutdown_even_below_batch_size() {
        let (tx, rx) = unbounded::<WriteItem>();
        let store = Arc::new(InMemoryStore::new());
        let stats = Stats::new();
        let writer = Writer::new(rx, store.clone(), stats.clone(), 200, 500_000, "s_".into(), 0);

        let handle = tokio::spawn(writer.run());
        tx.send(WriteItem::Success(SuccessRecord {
            id: "1".into(),
            url: "https://example.com".into(),
            host: "example.com".into(),
            http_status: 200,
            crawl_timestamp: Utc::now(),
            html: None,
            html_len: Some(3),
        }))
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.all_pages().await.len(), 1);
        assert_eq!(stats.ok(), 1);
    }

    #[tokio::test]
    async fn flushes_at_batch_size_threshold() {
        let (tx, rx) = unbounded::<WriteItem>();
        let store = Arc::new(InMemoryStore::new());
        let stats = Stats::new();
        let writer = Writer::new(rx, store.clone(), stats.clone(), 2, 500_000, "s_".into(), 0);
        let handle = tokio::spawn(writer.run());

        for i in 0..2u32 {
            tx.send(WriteItem::Failure(FailureRecord {
                task_id: i.to_string(),
                url: "https://example.com".into(),
                host: "example.com".into(),
                status: "ERR".into(),
                failed_at: Utc::now(),
                rounds: 5,
            }))
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.all_failed().await.len(), 2);
        assert_eq!(stats.fail(), 2);
    }
}
