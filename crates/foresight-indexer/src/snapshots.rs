use alloy::primitives::B256;
use alloy::sol_types::SolCall;
use chrono::Utc;

use foresight_db::ForesightPool;
use foresight_db::models::{Market, MarketState, NewMarketState};
use foresight_types::u256_to_bigdecimal;

use crate::decode::abi::curve;
use crate::engine::{IngestionEngine, amounts_to_json};

impl IngestionEngine {
    /// Record a snapshot request for a market. Requests inside the debounce
    /// window are dropped unless `force` is set (market creation, resolution
    /// and the periodic sweep all force).
    pub fn mark_for_snapshot(&self, market_id: &str, force: bool) {
        let now = Utc::now();

        {
            let mut last = self
                .last_snapshot_mark
                .lock()
                .expect("snapshot mark map poisoned");

            let debounced = last.get(market_id).is_some_and(|marked| {
                (now - *marked).num_seconds() <= self.config.snapshot_debounce_secs
            });
            if debounced && !force {
                return;
            }
            last.insert(market_id.to_string(), now);
        }

        self.pending_snapshots
            .lock()
            .expect("pending snapshot map poisoned")
            .insert(market_id.to_string(), now);
    }

    /// Force-mark every unresolved market. Used by the slow re-snapshot
    /// sweep so quiet markets still get periodic state rows.
    pub async fn force_snapshot_sweep(&self) -> anyhow::Result<usize> {
        let markets = self
            .pool
            .interact_with_context(
                "fetch unresolved markets for snapshot sweep".to_string(),
                Market::find_unresolved,
            )
            .await?;

        for market in &markets {
            self.mark_for_snapshot(&market.market_id, true);
        }

        Ok(markets.len())
    }

    /// Drain the pending map and append one `market_state` row per market. A
    /// failed read skips that market; the next mark will retry it.
    pub async fn flush_snapshots(&self) -> usize {
        let due: Vec<String> = {
            let mut pending = self
                .pending_snapshots
                .lock()
                .expect("pending snapshot map poisoned");
            pending.drain().map(|(market_id, _)| market_id).collect()
        };

        let mut flushed = 0;
        for market_id in due {
            match self.snapshot_market(&market_id).await {
                Ok(()) => flushed += 1,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "[IngestionEngine] 📸 Snapshot of market {market_id} failed"
                    );
                }
            }
        }

        if flushed > 0 {
            tracing::info!("[IngestionEngine] 📸 Appended {flushed} market state snapshot(s)");
        }
        flushed
    }

    async fn snapshot_market(&self, market_id: &str) -> anyhow::Result<()> {
        let id: B256 = market_id.parse()?;
        let calldata = curve::getMarketInfoCall { marketId: id }.abi_encode();
        let returned = self
            .rpc
            .call(self.config.market_address, calldata)
            .await?;
        let info = curve::getMarketInfoCall::abi_decode_returns(&returned, true)?;

        let new_state = NewMarketState {
            market_id: market_id.to_string(),
            ts: Utc::now(),
            total_usdc: u256_to_bigdecimal(info.totalUsdc),
            total_q: amounts_to_json(&info.q),
            alpha: u256_to_bigdecimal(info.alpha),
        };

        let label_id = market_id.to_string();
        self.pool
            .interact_with_context(
                format!("append market state snapshot for {label_id}"),
                move |conn| MarketState::append(&new_state, conn),
            )
            .await?;

        Ok(())
    }
}
