//! Worker loop (C7): batched pop, bounded-parallel fetch, classify,
//! retry-or-emit.
//!
//! Entries within one popped batch are dispatched onto independent
//! concurrent tasks bounded by the global `CONCURRENCY` semaphore and the
//! per-host [`DomainLimiter`], rejoined through a `FuturesUnordered` —
//! the same fan-out/rejoin shape the crawl orchestrator uses for page
//! tasks, with an owned permit of each kind held for the task's lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Timelike, Utc};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::classify::{classify, Decision};
use crate::config::Config;
use crate::domain_limiter::DomainLimiter;
use crate::entry::{decode, encode, Entry};
use crate::fetch::{Fetcher, Payload};
use crate::host::{normalize, raw_authority};
use crate::queue::QueueBackend;
use crate::runtime::channel::Tx;
use crate::stats::SharedStats;
use crate::store::{FailureRecord, SuccessRecord};
use crate::writer::WriteItem;

fn task_id(run_id: u64, base_id: u64) -> String {
    if run_id == 0 {
        base_id.to_string()
    } else {
        format!("{run_id}-{base_id}")
    }
}

/// Current time truncated to whole seconds, per the record fields'
/// ISO-8601 second-precision contract (§3).
fn now_at_second_precision() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Push a retried entry back to the queue head, hedged once against a
/// transient client error; the second failure is abandoned for that task
/// rather than retried further (§7, taxonomy (c)).
async fn push_retry<Q: QueueBackend>(queue: &Q, task_list: &str, entry: &Entry) {
    let wire = encode(entry.base_id, entry.attempt, &entry.url);
    if queue.push_many(task_list, vec![wire.clone()]).await.is_ok() {
        return;
    }
    if let Err(err) = queue.push_many(task_list, vec![wire]).await {
        log::warn!(
            "worker: abandoning retry for base_id={} after hedge failure: {err}",
            entry.base_id
        );
    }
}

struct ItemOutcome {
    write: Option<WriteItem>,
    retry: Option<Entry>,
}

async fn process_one<F: Fetcher>(
    entry: Entry,
    fetcher: Arc<F>,
    config: Arc<Config>,
    stats: SharedStats,
) -> ItemOutcome {
    let host = raw_authority(&entry.url);
    let outcome = fetcher.fetch(&entry.url).await;
    stats.record_attempt();

    let decision = classify(outcome.ok, outcome.status, entry.attempt, config.max_retries);
    match decision {
        Decision::Success => {
            let id = task_id(config.run_id, entry.base_id);
            let (html, html_len) = match outcome.payload {
                Payload::Text(text) => (Some(text), None),
                Payload::Len(len) => (None, Some(len)),
                Payload::Empty => (None, None),
            };
            let record = SuccessRecord {
                id,
                url: entry.url,
                host,
                http_status: outcome.status.unwrap_or(0),
                crawl_timestamp: now_at_second_precision(),
                html,
                html_len,
            };
            ItemOutcome {
                write: Some(WriteItem::Success(record)),
                retry: None,
            }
        }
        Decision::Retry => ItemOutcome {
            write: None,
            retry: Some(entry.with_next_attempt()),
        },
        Decision::TerminalFail => {
            let id = task_id(config.run_id, entry.base_id);
            let status = outcome
                .status
                .map_or_else(|| "ERR".to_string(), |s| s.to_string());
            let record = FailureRecord {
                task_id: id,
                url: entry.url,
                host,
                status,
                failed_at: now_at_second_precision(),
                rounds: entry.attempt,
            };
            ItemOutcome {
                write: Some(WriteItem::Failure(record)),
                retry: None,
            }
        }
    }
}

/// Run one worker until the termination controller signals `stop`, the
/// completion marker is set with an empty queue and zero in-flight, or
/// `idle_quit_after` elapses with no batch received.
#[allow(clippy::too_many_arguments)]
pub async fn run<Q, F>(
    config: Arc<Config>,
    queue: Arc<Q>,
    fetcher: Arc<F>,
    writer_tx: Tx<WriteItem>,
    stats: SharedStats,
    global: Arc<Semaphore>,
    domains: Arc<DomainLimiter>,
    stop: Arc<AtomicBool>,
) where
    Q: QueueBackend + 'static,
    F: Fetcher + 'static,
{
    let mut last_got = Instant::now();

    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let batch = match queue
            .blocking_multi_pop(&config.task_list, config.batch_pop, config.brpop_timeout)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                log::warn!("worker: pop failed, retrying: {err}");
                Vec::new()
            }
        };

        if batch.is_empty() {
            if last_got.elapsed() >= config.idle_quit_after {
                return;
            }
            let marker_set = queue.get_flag(&format!("{}:enqueue_complete", config.task_list)).await.unwrap_or(false);
            let queue_len = queue.length(&config.task_list).await.unwrap_or(u64::MAX);
            if marker_set && queue_len == 0 && stats.in_flight() == 0 {
                return;
            }
            continue;
        }
        last_got = Instant::now();

        stats.in_flight_add(batch.len() as i64);

        let mut tasks = FuturesUnordered::new();
        for raw in batch {
            let Some(entry) = decode(&raw) else {
                stats.in_flight_add(-1);
                continue;
            };

            let global = global.clone();
            let domains = domains.clone();
            let fetcher = fetcher.clone();
            let config = config.clone();
            let stats = stats.clone();
            let host = normalize(&entry.url);

            tasks.push(tokio::spawn(async move {
                let _global_permit = global.acquire_owned().await.ok();
                let _host_permit = domains.acquire(host).await;
                process_one(entry, fetcher, config, stats).await
            }));
        }

        while let Some(joined) = tasks.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("worker: fetch task panicked: {err}");
                    stats.in_flight_add(-1);
                    continue;
                }
            };

            if let Some(item) = outcome.write {
                if let Err(err) = writer_tx.send(item).await {
                    log::error!("worker: writer channel closed early: {err}");
                }
            }
            if let Some(retry_entry) = outcome.retry {
                push_retry(&*queue, &config.task_list, &retry_entry).await;
            }
            stats.in_flight_add(-1);
        }
    }
}
