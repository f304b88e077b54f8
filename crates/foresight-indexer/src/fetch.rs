use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use foresight_rpc::{EthRpc, RawLog, RpcErrorKind};
use rand::Rng;

/// Span cap applied permanently once a provider rejects a window as too
/// large. Small enough that any provider accepts it.
const RANGE_REJECTED_CAP: u64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct SpanConfig {
    pub init: u64,
    pub min: u64,
    pub max: u64,
}

/// One served window of the scan.
#[derive(Debug)]
pub struct FetchStep {
    pub logs: Vec<RawLog>,
    pub from_block: u64,
    pub to_block: u64,
    /// First block the caller should ask for next. Never less than
    /// `from_block + 1`, so the scan always makes progress.
    pub next_cursor: u64,
}

/// Adaptive log fetcher. Widens its window multiplicatively while the
/// provider keeps up and shrinks it under pressure; a window the provider
/// rejects outright costs one sacrificed block rather than a stall.
pub struct RangeFetcher {
    rpc: Arc<dyn EthRpc>,
    addresses: Vec<Address>,
    topic0: Option<Vec<B256>>,
    span: u64,
    span_cap: u64,
    span_min: u64,
}

impl RangeFetcher {
    pub fn new(rpc: Arc<dyn EthRpc>, addresses: Vec<Address>, spans: SpanConfig) -> Self {
        let span_cap = spans.max.max(1);
        Self {
            rpc,
            addresses,
            topic0: None,
            span: spans.init.clamp(spans.min.max(1), span_cap),
            span_cap,
            span_min: spans.min.max(1),
        }
    }

    /// Restrict the scan to the given event signatures (topic0).
    pub fn with_topic_filter(mut self, topics: Vec<B256>) -> Self {
        self.topic0 = Some(topics);
        self
    }

    pub const fn span(&self) -> u64 {
        self.span
    }

    pub const fn span_cap(&self) -> u64 {
        self.span_cap
    }

    /// Serve the next window starting at `from_block`, never past `to_block`.
    /// Retries throttled windows in place; any other failure advances past a
    /// single block so the scan cannot wedge on one poisoned range.
    pub async fn next_step(&mut self, from_block: u64, to_block: u64) -> FetchStep {
        debug_assert!(from_block <= to_block);

        loop {
            let window_end = to_block.min(from_block + self.span - 1);

            match self
                .rpc
                .get_logs(from_block, window_end, &self.addresses, self.topic0.clone())
                .await
            {
                Ok(logs) => {
                    self.grow_span();
                    return FetchStep {
                        logs,
                        from_block,
                        to_block: window_end,
                        next_cursor: window_end + 1,
                    };
                }
                Err(e) => match e.kind() {
                    RpcErrorKind::RangeTooLarge => {
                        if self.span_cap > RANGE_REJECTED_CAP {
                            tracing::warn!(
                                "[RangeFetcher] 📉 Provider rejected a {} block window, capping spans at {RANGE_REJECTED_CAP}",
                                window_end - from_block + 1
                            );
                            self.span_cap = RANGE_REJECTED_CAP;
                        }
                        self.shrink_span();
                        Self::backoff_sleep().await;
                    }
                    RpcErrorKind::Throttled => {
                        self.shrink_span();
                        tracing::debug!(
                            "[RangeFetcher] 🐢 Throttled on [{from_block}, {window_end}], span now {}",
                            self.span
                        );
                        Self::backoff_sleep().await;
                    }
                    RpcErrorKind::Other => {
                        tracing::warn!(
                            error = %e,
                            "[RangeFetcher] ⚠️ Unclassified error on [{from_block}, {window_end}], sacrificing block {from_block}"
                        );
                        self.shrink_span();
                        return FetchStep {
                            logs: Vec::new(),
                            from_block,
                            to_block: from_block,
                            next_cursor: from_block + 1,
                        };
                    }
                },
            }
        }
    }

    /// Multiplicative recovery: +25% per success, and at least +1 so small
    /// spans still grow under integer division. The effective floor is
    /// `min(span_min, span_cap)` because a range rejection can pull the cap
    /// below the configured minimum.
    fn grow_span(&mut self) {
        let floor = self.span_min.min(self.span_cap);
        self.span = (self.span * 5 / 4).max(self.span + 1).clamp(floor, self.span_cap);
    }

    fn shrink_span(&mut self) {
        let floor = self.span_min.min(self.span_cap);
        self.span = (self.span / 2).clamp(floor, self.span_cap);
    }

    async fn backoff_sleep() {
        let jitter_ms = rand::thread_rng().gen_range(400..=800);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use async_trait::async_trait;
    use foresight_rpc::{RawTransaction, RpcError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Scripted {
        Logs(usize),
        Throttle,
        RangeTooLarge,
        Other,
    }

    struct ScriptedRpc {
        script: Mutex<VecDeque<Scripted>>,
    }

    impl ScriptedRpc {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    fn fake_log(block: u64, index: u64) -> RawLog {
        serde_json::from_value(serde_json::json!({
            "address": "0x00000000000000000000000000000000000000aa",
            "topics": [],
            "data": "0x",
            "blockNumber": format!("{block:#x}"),
            "transactionHash": "0x1100000000000000000000000000000000000000000000000000000000000011",
            "logIndex": format!("{index:#x}"),
        }))
        .unwrap()
    }

    #[async_trait]
    impl EthRpc for ScriptedRpc {
        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(u64::MAX)
        }

        async fn get_logs(
            &self,
            from: u64,
            _to: u64,
            _addresses: &[Address],
            _topic0: Option<Vec<B256>>,
        ) -> Result<Vec<RawLog>, RpcError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                // Script exhausted: keep succeeding with empty batches.
                None | Some(Scripted::Logs(0)) => Ok(Vec::new()),
                Some(Scripted::Logs(n)) => {
                    Ok((0..n as u64).map(|i| fake_log(from, i)).collect())
                }
                Some(Scripted::Throttle) => Err(RpcError::Timeout { timeout_ms: 15_000 }),
                Some(Scripted::RangeTooLarge) => Err(RpcError::Rpc {
                    code: -32602,
                    message: "block range too large".to_string(),
                }),
                Some(Scripted::Other) => Err(RpcError::Rpc {
                    code: -32000,
                    message: "header not found".to_string(),
                }),
            }
        }

        async fn get_block_timestamp(&self, _block: u64) -> Result<u64, RpcError> {
            unimplemented!("not used by fetcher")
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
            unimplemented!("not used by fetcher")
        }

        async fn get_transaction_by_hash(
            &self,
            _tx: B256,
        ) -> Result<Option<RawTransaction>, RpcError> {
            unimplemented!("not used by fetcher")
        }
    }

    fn fetcher(rpc: Arc<ScriptedRpc>, spans: SpanConfig) -> RangeFetcher {
        RangeFetcher::new(rpc, vec![Address::ZERO], spans)
    }

    const SPANS: SpanConfig = SpanConfig {
        init: 100,
        min: 10,
        max: 1000,
    };

    /// Drive the fetcher to `to_block`, asserting the cursor never regresses.
    async fn drive(fetcher: &mut RangeFetcher, to_block: u64) -> u64 {
        let mut cursor = 1u64;
        let mut steps = 0u64;
        while cursor <= to_block {
            let step = fetcher.next_step(cursor, to_block).await;
            assert!(step.next_cursor > cursor, "cursor must advance");
            cursor = step.next_cursor;
            steps += 1;
            assert!(steps < 10_000, "scan did not terminate");
        }
        steps
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_scan_reaches_target() {
        let rpc = ScriptedRpc::new(vec![]);
        let mut fetcher = fetcher(rpc, SPANS);
        drive(&mut fetcher, 5_000).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_span_grows_on_success_and_respects_cap() {
        let rpc = ScriptedRpc::new(vec![]);
        let mut fetcher = fetcher(rpc, SPANS);
        for _ in 0..40 {
            fetcher.next_step(1, 1_000_000).await;
        }
        assert_eq!(fetcher.span(), SPANS.max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_halves_span_and_retries_same_window() {
        let rpc = ScriptedRpc::new(vec![
            Scripted::Throttle,
            Scripted::Throttle,
            Scripted::Logs(3),
        ]);
        let mut fetcher = fetcher(rpc, SPANS);
        let step = fetcher.next_step(1, 10_000).await;
        // Two halvings (100 -> 50 -> 25) then one success growth (25 -> 31).
        assert_eq!(step.from_block, 1);
        assert_eq!(step.logs.len(), 3);
        assert_eq!(fetcher.span(), 31);
    }

    #[tokio::test(start_paused = true)]
    async fn test_range_too_large_permanently_caps_span() {
        let rpc = ScriptedRpc::new(vec![Scripted::RangeTooLarge, Scripted::Logs(1)]);
        let mut fetcher = fetcher(rpc, SPANS);
        let step = fetcher.next_step(1, 10_000).await;
        assert_eq!(step.logs.len(), 1);
        assert_eq!(fetcher.span_cap(), 10);
        assert!(fetcher.span() <= 10);

        // Later successes grow the span but never past the lowered cap.
        for _ in 0..20 {
            fetcher.next_step(1, 10_000).await;
        }
        assert_eq!(fetcher.span(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_error_sacrifices_one_block() {
        let rpc = ScriptedRpc::new(vec![Scripted::Other]);
        let mut fetcher = fetcher(rpc, SPANS);
        let step = fetcher.next_step(7, 10_000).await;
        assert!(step.logs.is_empty());
        assert_eq!(step.next_cursor, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_error_storm_still_terminates() {
        let rpc = ScriptedRpc::new(vec![
            Scripted::Throttle,
            Scripted::Other,
            Scripted::RangeTooLarge,
            Scripted::Throttle,
            Scripted::Other,
            Scripted::Logs(2),
            Scripted::Throttle,
            Scripted::Other,
        ]);
        let mut fetcher = fetcher(rpc, SPANS);
        drive(&mut fetcher, 500).await;
    }
}
