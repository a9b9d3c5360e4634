//! Per-host concurrency limiter.
//!
//! Each normalized host gets its own semaphore bounding in-flight fetches to
//! `LIMIT_PER_HOST`, independent of the global `CONCURRENCY` cap. Semaphores
//! are created lazily on first use so hosts that never appear cost nothing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct DomainLimiter {
    host_semaphores: DashMap<String, Arc<Semaphore>>,
    max_per_host: usize,
}

impl DomainLimiter {
    #[must_use]
    pub fn new(max_per_host: usize) -> Self {
        Self {
            host_semaphores: DashMap::new(),
            max_per_host,
        }
    }

    /// Acquire a permit for `host`, creating its semaphore on first use.
    ///
    /// The returned permit is owned and releases on drop; callers hold it
    /// for the lifetime of the in-flight fetch task.
    pub async fn acquire(&self, host: String) -> OwnedSemaphorePermit {
        let semaphore = self
            .host_semaphores
            .entry(host.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone();

        loop {
            if let Ok(permit) = semaphore.clone().acquire_owned().await {
                return permit;
            }
            log::error!("semaphore for host '{host}' was closed unexpectedly - replacing");
            let fresh = Arc::new(Semaphore::new(self.max_per_host));
            self.host_semaphores.insert(host.clone(), fresh.clone());
            if let Ok(permit) = fresh.acquire_owned().await {
                return permit;
            }
            log::error!("fresh semaphore for host '{host}' also failed - retrying");
        }
    }
}
