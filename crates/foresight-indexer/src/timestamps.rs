use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

use foresight_rpc::{EthRpc, RpcError};

/// Backoff schedule for throttled block fetches: 250ms doubling, capped.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Block timestamps never change, so the cache needs no eviction policy
/// beyond "clear everything once it gets big".
const CACHE_CAPACITY: usize = 50_000;

type SharedLookup = Shared<BoxFuture<'static, Result<u64, Arc<RpcError>>>>;

#[derive(Debug, Clone, thiserror::Error)]
#[error("could not resolve timestamp for block {block}: {source}")]
pub struct TimestampError {
    pub block: u64,
    #[source]
    pub source: Arc<RpcError>,
}

/// Memoized block-number -> UNIX-timestamp resolution, safe under arbitrary
/// concurrent fan-out. Layered exactly as: cache, then in-flight dedup, then
/// the concurrency gate, then retry-with-backoff. The dedup layer matters
/// most when one batch holds many logs from the same block; without it every
/// log would fire its own `eth_getBlockByNumber`.
pub struct TimestampResolver {
    rpc: Arc<dyn EthRpc>,
    cache: Mutex<HashMap<u64, u64>>,
    in_flight: AsyncMutex<HashMap<u64, SharedLookup>>,
    gate: Arc<Semaphore>,
    max_attempts: u32,
}

impl TimestampResolver {
    pub fn new(rpc: Arc<dyn EthRpc>, concurrency: usize, max_attempts: u32) -> Self {
        Self {
            rpc,
            cache: Mutex::new(HashMap::new()),
            in_flight: AsyncMutex::new(HashMap::new()),
            gate: Arc::new(Semaphore::new(concurrency.max(1))),
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn resolve(&self, block_number: u64) -> Result<u64, TimestampError> {
        if let Some(ts) = self.cache_get(block_number) {
            return Ok(ts);
        }

        let (lookup, created_here) = {
            let mut in_flight = self.in_flight.lock().await;
            // A racing caller may have populated the cache while we waited
            // for the in-flight lock.
            if let Some(ts) = self.cache_get(block_number) {
                return Ok(ts);
            }

            match in_flight.get(&block_number) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let fut = Self::fetch_with_backoff(
                        self.rpc.clone(),
                        self.gate.clone(),
                        block_number,
                        self.max_attempts,
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(block_number, fut.clone());
                    (fut, true)
                }
            }
        };

        let result = lookup.await;

        if created_here {
            self.in_flight.lock().await.remove(&block_number);
            if let Ok(ts) = result {
                self.cache_put(block_number, ts);
            }
        }

        result.map_err(|source| TimestampError {
            block: block_number,
            source,
        })
    }

    fn cache_get(&self, block_number: u64) -> Option<u64> {
        self.cache
            .lock()
            .expect("timestamp cache poisoned")
            .get(&block_number)
            .copied()
    }

    fn cache_put(&self, block_number: u64, ts: u64) {
        let mut cache = self.cache.lock().expect("timestamp cache poisoned");
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(block_number, ts);
    }

    /// One underlying lookup. The semaphore permit is taken per attempt so a
    /// block sitting in backoff sleep does not hold a slot.
    async fn fetch_with_backoff(
        rpc: Arc<dyn EthRpc>,
        gate: Arc<Semaphore>,
        block_number: u64,
        max_attempts: u32,
    ) -> Result<u64, Arc<RpcError>> {
        let mut backoff = BACKOFF_BASE;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let result = {
                let _permit = gate
                    .acquire()
                    .await
                    .expect("timestamp semaphore closed");
                rpc.get_block_timestamp(block_number).await
            };

            match result {
                Ok(ts) => return Ok(ts),
                Err(e) if e.is_throttled() && attempt + 1 < max_attempts => {
                    tracing::debug!(
                        "[TimestampResolver] 🐢 Throttled on block {block_number} (attempt {}), backing off {:?}",
                        attempt + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                    last_error = Some(e);
                }
                Err(e) => return Err(Arc::new(e)),
            }
        }

        Err(Arc::new(last_error.unwrap_or(RpcError::Timeout {
            timeout_ms: 0,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256};
    use async_trait::async_trait;
    use foresight_rpc::{RawLog, RawTransaction};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct CountingRpc {
        calls: AtomicU64,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
        throttle_first: AtomicU64,
    }

    impl CountingRpc {
        fn new(throttle_first: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                throttle_first: AtomicU64::new(throttle_first),
            })
        }
    }

    #[async_trait]
    impl EthRpc for CountingRpc {
        async fn block_number(&self) -> Result<u64, RpcError> {
            unimplemented!("not used by resolver")
        }

        async fn get_logs(
            &self,
            _from: u64,
            _to: u64,
            _addresses: &[Address],
            _topic0: Option<Vec<B256>>,
        ) -> Result<Vec<RawLog>, RpcError> {
            unimplemented!("not used by resolver")
        }

        async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            if self
                .throttle_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                .is_ok()
            {
                return Err(RpcError::Rpc {
                    code: 429,
                    message: "too many requests".to_string(),
                });
            }

            Ok(1_700_000_000 + block_number * 12)
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
            unimplemented!("not used by resolver")
        }

        async fn get_transaction_by_hash(
            &self,
            _tx: B256,
        ) -> Result<Option<RawTransaction>, RpcError> {
            unimplemented!("not used by resolver")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_block_fires_one_rpc_call() {
        let rpc = CountingRpc::new(0);
        let resolver = Arc::new(TimestampResolver::new(rpc.clone(), 2, 3));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(42).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1_700_000_000 + 42 * 12);
        }

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_bounds_concurrency() {
        let rpc = CountingRpc::new(0);
        let resolver = Arc::new(TimestampResolver::new(rpc.clone(), 2, 3));

        let tasks: Vec<_> = (0..20)
            .map(|block| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(block).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(rpc.max_concurrent.load(Ordering::SeqCst) <= 2);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_rpc() {
        let rpc = CountingRpc::new(0);
        let resolver = TimestampResolver::new(rpc.clone(), 2, 3);

        resolver.resolve(7).await.unwrap();
        resolver.resolve(7).await.unwrap();
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_retries_then_succeeds() {
        let rpc = CountingRpc::new(2);
        let resolver = TimestampResolver::new(rpc.clone(), 2, 6);

        let ts = resolver.resolve(9).await.unwrap();
        assert_eq!(ts, 1_700_000_000 + 9 * 12);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_attempts_surface_fatal_error() {
        let rpc = CountingRpc::new(u64::MAX);
        let resolver = TimestampResolver::new(rpc.clone(), 2, 4);

        let err = resolver.resolve(9).await.unwrap_err();
        assert_eq!(err.block, 9);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 4);
    }
}
