use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use task_supervisor::{SupervisedTask, TaskError};

use foresight_db::ForesightPool;
use foresight_db::models::{Meta, meta_keys};
use foresight_rpc::{EthRpc, find_block_at_timestamp};

use crate::config::IndexerConfig;
use crate::engine::IngestionEngine;
use crate::fetch::{RangeFetcher, SpanConfig};
use crate::replay::{LogStore, ReplayLedger};

/// The network-driven loop: poll the chain head, pull logs through the
/// adaptive fetcher into the JSONL store, and apply them via replay — one
/// decode-and-apply path whether records arrive live or from disk.
#[derive(Clone)]
pub struct IngestionTask {
    pub pool: Pool,
    pub rpc: Arc<dyn EthRpc>,
    pub config: IndexerConfig,
    pub engine: Arc<IngestionEngine>,
    pub ledger: Arc<ReplayLedger>,
    pub store: LogStore,
}

impl SupervisedTask for IngestionTask {
    async fn run(&mut self) -> Result<(), TaskError> {
        // Crash recovery: apply whatever the store holds past the offset
        // before touching the network.
        let recovered = self.ledger.replay(false).await?;
        if recovered > 0 {
            tracing::info!(
                "[IngestionTask] 🧯 Recovered {recovered} record(s) from the log store"
            );
        }

        let mut cursor = self.load_or_derive_cursor().await?;
        tracing::info!("[IngestionTask] 📍 Syncing from block {}", cursor + 1);

        let mut fetcher = RangeFetcher::new(
            self.rpc.clone(),
            self.config.watched_addresses(),
            SpanConfig {
                init: self.config.span_init,
                min: self.config.span_min,
                max: self.config.span_max,
            },
        );

        let mut last_sweep = Instant::now();

        loop {
            let head = match self.rpc.block_number().await {
                Ok(head) => head,
                Err(e) => {
                    tracing::warn!(error = %e, "[IngestionTask] 🌐 Head poll failed");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            while cursor < head {
                let step = fetcher.next_step(cursor + 1, head).await;
                self.store.append(&step.logs).await?;

                let synced = step.next_cursor - 1;
                self.pool
                    .interact_with_context("store sync cursor".to_string(), move |conn| {
                        Meta::set_u64(meta_keys::LAST_BLOCK_SYNCED, synced, conn)
                    })
                    .await?;

                self.ledger.replay(false).await?;
                cursor = synced;
            }

            if last_sweep.elapsed() >= self.config.snapshot_sweep_interval {
                let marked = self.engine.force_snapshot_sweep().await?;
                tracing::info!(
                    "[IngestionTask] 🧹 Snapshot sweep marked {marked} market(s)"
                );
                self.engine.flush_snapshots().await;
                last_sweep = Instant::now();
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl IngestionTask {
    /// Resume from the persisted cursor, or derive a starting block from the
    /// lookback window on a fresh store.
    async fn load_or_derive_cursor(&self) -> Result<u64, anyhow::Error> {
        let stored = self
            .pool
            .interact_with_context("load sync cursor".to_string(), |conn| {
                Meta::get_u64(meta_keys::LAST_BLOCK_SYNCED, conn)
            })
            .await?;

        if let Some(cursor) = stored {
            return Ok(cursor);
        }

        let lookback_secs = self.config.lookback_days * 86_400;
        let target_ts = (Utc::now().timestamp() as u64).saturating_sub(lookback_secs);
        let start_block = find_block_at_timestamp(self.rpc.as_ref(), target_ts).await?;
        tracing::info!(
            "[IngestionTask] 🆕 No cursor found, starting {} day(s) back at block {start_block}",
            self.config.lookback_days
        );

        Ok(start_block.saturating_sub(1))
    }
}
