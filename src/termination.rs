//! Termination controller (C10): the single supervisory routine that
//! decides when all work is done and signals the worker pool to stop.
//!
//! Workers may also self-exit on `IDLE_QUIT_AFTER` inactivity without this
//! controller's involvement (the crashed-master scenario, §4.9); this
//! routine is what lets a healthy run shut down promptly instead of
//! waiting out the idle timeout on every worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::queue::QueueBackend;
use crate::stats::SharedStats;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll once per second until the completion marker is set, the queue is
/// empty, and in-flight is zero, then flip `stop` for every worker.
pub async fn supervise<Q: QueueBackend>(config: Arc<Config>, queue: Arc<Q>, stats: SharedStats, stop: Arc<AtomicBool>) {
    let flag_key = format!("{}:enqueue_complete", config.task_list);
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let marker_set = queue.get_flag(&flag_key).await.unwrap_or(false);
        let queue_len = queue.length(&config.task_list).await.unwrap_or(u64::MAX);
        let in_flight = stats.in_flight();

        if marker_set && queue_len == 0 && in_flight == 0 {
            log::info!("termination: marker set, queue empty, in-flight zero; stopping workers");
            stop.store(true, Ordering::SeqCst);
            return;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Print the final `RUN_STATUS` line once the writer has drained.
pub fn report_final_status(stats: &SharedStats) {
    println!(
        "RUN_STATUS attempts={} ok={} fail={}",
        stats.attempts(),
        stats.ok(),
        stats.fail()
    );
}
