//! Worker entry point: builds the configuration, connects to the queue and
//! document store, and runs the fetch/classify/persist pipeline until the
//! termination controller signals completion.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::Semaphore;

use distcrawl::config::Config;
use distcrawl::domain_limiter::DomainLimiter;
use distcrawl::fetch::ReqwestFetcher;
use distcrawl::queue::RedisQueue;
use distcrawl::runtime::channel::unbounded;
use distcrawl::stats::Stats;
use distcrawl::store::MongoStore;
use distcrawl::writer::Writer;
use distcrawl::{termination, worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(Config::from_env()?);

    log::info!("worker: connecting to queue at {}", config.redis_url);
    let queue = Arc::new(RedisQueue::connect(&config.redis_url).await?);

    log::info!("worker: connecting to document store at {}", config.mongo_url);
    let store = Arc::new(MongoStore::connect(&config.mongo_url, config.mongo_db_prefix.clone()).await?);

    let fetcher = Arc::new(ReqwestFetcher::new(config.timeout, config.light_mode)?);

    let stats = Stats::new();
    let global = Arc::new(Semaphore::new(config.concurrency));
    let domains = Arc::new(DomainLimiter::new(config.limit_per_host));
    let stop = Arc::new(AtomicBool::new(false));

    let (writer_tx, writer_rx) = unbounded();
    let writer = Writer::new(
        writer_rx,
        store,
        stats.clone(),
        config.batch_size,
        config.mongo_split_threshold,
        config.mongo_db_prefix.clone(),
        config.print_every,
    );
    let writer_handle = tokio::spawn(writer.run());

    println!("WORKERS_READY");
    println!("CONSUME_READY");
    println!("PERSIST_READY");

    let termination_handle = tokio::spawn(termination::supervise(
        config.clone(),
        queue.clone(),
        stats.clone(),
        stop.clone(),
    ));

    worker::run(
        config,
        queue,
        fetcher,
        writer_tx.clone(),
        stats.clone(),
        global,
        domains,
        stop,
    )
    .await;

    termination_handle.await.ok();
    drop(writer_tx);
    writer_handle.await.ok();

    println!("WORKERS_STOPPED");
    termination::report_final_status(&stats);
    Ok(())
}
