//! Queue client (C4): push/pop against the Redis-like backing store,
//! abstracted behind [`QueueBackend`] so tests can substitute an in-memory
//! stand-in for the real server.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CrawlError, CrawlResult};

#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Atomically push `items` to the head of `key`. All-or-nothing.
    async fn push_many(&self, key: &str, items: Vec<Vec<u8>>) -> CrawlResult<()>;

    /// Pop up to `count` items, blocking up to `timeout` for the first one.
    /// Returns an empty vec on timeout.
    async fn blocking_multi_pop(
        &self,
        key: &str,
        count: usize,
        timeout: Duration,
    ) -> CrawlResult<Vec<Vec<u8>>>;

    async fn get_flag(&self, key: &str) -> CrawlResult<bool>;
    async fn set_flag(&self, key: &str) -> CrawlResult<()>;
    async fn delete(&self, key: &str) -> CrawlResult<()>;
    async fn length(&self, key: &str) -> CrawlResult<u64>;
}

/// Real backend against a Redis-compatible server via the `redis` crate's
/// async multiplexed connection manager.
pub struct RedisQueue {
    manager: redis::aio::ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> CrawlResult<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CrawlError::Queue(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn push_many(&self, key: &str, items: Vec<Vec<u8>>) -> CrawlResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        redis::cmd("LPUSH")
            .arg(key)
            .arg(items)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }

    async fn blocking_multi_pop(
        &self,
        key: &str,
        count: usize,
        timeout: Duration,
    ) -> CrawlResult<Vec<Vec<u8>>> {
        let mut conn = self.manager.clone();

        // Prefer a native atomic multi-pop when the server supports BLMPOP;
        // fall back to BRPOP one + LPOP (count-1) otherwise.
        let native: redis::RedisResult<Option<(String, Vec<Vec<u8>>)>> = redis::cmd("BLMPOP")
            .arg(timeout.as_secs_f64())
            .arg(1)
            .arg(key)
            .arg("RIGHT")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await;

        match native {
            Ok(Some((_key, items))) => return Ok(items),
            Ok(None) => return Ok(Vec::new()),
            Err(_) => {}
        }

        let first: Option<Vec<u8>> = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout.as_secs())
            .query_async::<Option<(String, Vec<u8>)>>(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))?
            .map(|(_, v)| v);

        let Some(first) = first else {
            return Ok(Vec::new());
        };

        let mut out = vec![first];
        if count > 1 {
            let rest: Vec<Vec<u8>> = redis::cmd("LPOP")
                .arg(key)
                .arg(count - 1)
                .query_async::<Option<Vec<Vec<u8>>>>(&mut conn)
                .await
                .map_err(|e| CrawlError::Queue(e.to_string()))?
                .unwrap_or_default();
            out.extend(rest);
        }
        Ok(out)
    }

    async fn get_flag(&self, key: &str) -> CrawlResult<bool> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn set_flag(&self, key: &str) -> CrawlResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg("1")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }

    async fn delete(&self, key: &str) -> CrawlResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }

    async fn length(&self, key: &str) -> CrawlResult<u64> {
        let mut conn = self.manager.clone();
        redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }
}

pub mod memory {
    //! In-memory `QueueBackend` for unit and end-to-end tests. Not behind
    //! `#[cfg(test)]` so integration tests under `tests/` (which link
    //! against the library as an ordinary dependency, not the unit-test
    //! harness) can use it too.
    use std::collections::{HashMap, HashSet, VecDeque};

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct State {
        lists: HashMap<String, VecDeque<Vec<u8>>>,
        flags: HashSet<String>,
    }

    pub struct InMemoryQueue {
        state: Mutex<State>,
    }

    impl InMemoryQueue {
        #[must_use]
        pub fn new() -> Self {
            Self {
                state: Mutex::new(State::default()),
            }
        }
    }

    impl Default for InMemoryQueue {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl QueueBackend for InMemoryQueue {
        async fn push_many(&self, key: &str, items: Vec<Vec<u8>>) -> CrawlResult<()> {
            let mut state = self.state.lock().await;
            let list = state.lists.entry(key.to_string()).or_default();
            for item in items {
                list.push_front(item);
            }
            Ok(())
        }

        async fn blocking_multi_pop(
            &self,
            key: &str,
            count: usize,
            _timeout: Duration,
        ) -> CrawlResult<Vec<Vec<u8>>> {
            let mut state = self.state.lock().await;
            let list = state.lists.entry(key.to_string()).or_default();
            let mut out = Vec::new();
            for _ in 0..count {
                match list.pop_back() {
                    Some(item) => out.push(item),
                    None => break,
                }
            }
            Ok(out)
        }

        async fn get_flag(&self, key: &str) -> CrawlResult<bool> {
            Ok(self.state.lock().await.flags.contains(key))
        }

        async fn set_flag(&self, key: &str) -> CrawlResult<()> {
            self.state.lock().await.flags.insert(key.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> CrawlResult<()> {
            let mut state = self.state.lock().await;
            state.lists.remove(key);
            state.flags.remove(key);
            Ok(())
        }

        async fn length(&self, key: &str) -> CrawlResult<u64> {
            let state = self.state.lock().await;
            Ok(state.lists.get(key).map_or(0, |l| l.len() as u64))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn push_then_pop_is_fifo_across_calls() {
            let q = InMemoryQueue::new();
            q.push_many("k", vec![b"a".to_vec(), b"b".to_vec()])
                .await
                .unwrap();
            let popped = q
                .blocking_multi_pop("k", 10, Duration::from_secs(0))
                .await
                .unwrap();
            assert_eq!(popped, vec![b"a".to_vec(), b"b".to_vec()]);
        }

        #[tokio::test]
        async fn flags_and_delete_round_trip() {
            let q = InMemoryQueue::new();
            assert!(!q.get_flag("done").await.unwrap());
            q.set_flag("done").await.unwrap();
            assert!(q.get_flag("done").await.unwrap());
            q.delete("done").await.unwrap();
            assert!(!q.get_flag("done").await.unwrap());
        }
    }
}
