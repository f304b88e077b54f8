use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{B256, U256};
use chrono::Utc;
use deadpool_diesel::postgres::Pool;
use task_supervisor::{SupervisedTask, TaskError};

use foresight_db::ForesightPool;
use foresight_db::models::{Market, NewPriceImpact, PriceImpact};
use foresight_types::u256_to_bigdecimal;

use crate::solver::{CurveQuoter, PriceImpactSolver};

/// Clip sizes measured, in whole USD.
pub const DEFAULT_CLIPS_USD: [u64; 4] = [100, 500, 1_000, 5_000];

/// Slow poll cycle recomputing "cost to move the top outcome" for every
/// unresolved market. Each market's rows are swapped atomically, so readers
/// never mix clip rows from different recomputations.
pub struct PriceImpactTask<Q> {
    pool: Pool,
    solver: Arc<PriceImpactSolver<Q>>,
    clips_usdc: Vec<U256>,
    interval: Duration,
}

impl<Q> Clone for PriceImpactTask<Q> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            solver: self.solver.clone(),
            clips_usdc: self.clips_usdc.clone(),
            interval: self.interval,
        }
    }
}

impl<Q: CurveQuoter> PriceImpactTask<Q> {
    pub fn new(pool: Pool, solver: PriceImpactSolver<Q>, interval: Duration) -> Self {
        Self {
            pool,
            solver: Arc::new(solver),
            clips_usdc: DEFAULT_CLIPS_USD
                .iter()
                .map(|usd| U256::from(*usd) * U256::from(1_000_000u64))
                .collect(),
            interval,
        }
    }

    async fn refresh_all(&self) -> anyhow::Result<usize> {
        let markets = self
            .pool
            .interact_with_context(
                "fetch unresolved markets for price impact".to_string(),
                Market::find_unresolved,
            )
            .await?;

        let mut refreshed = 0usize;
        for market in markets {
            match self.refresh_market(&market.market_id).await {
                Ok(rows) => {
                    refreshed += 1;
                    tracing::debug!(
                        "[PriceImpactTask] 📈 {} impact row(s) for market {}",
                        rows,
                        market.market_id
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "[PriceImpactTask] ⚠️ Price impact refresh failed for market {}",
                        market.market_id
                    );
                }
            }
        }

        Ok(refreshed)
    }

    async fn refresh_market(&self, market_id: &str) -> anyhow::Result<usize> {
        let id: B256 = market_id.parse()?;
        let impacts = self.solver.cost_to_move_top(id, &self.clips_usdc).await?;

        let computed_at = Utc::now();
        let rows: Vec<NewPriceImpact> = impacts
            .into_iter()
            .map(|impact| NewPriceImpact {
                market_id: market_id.to_string(),
                clip_usdc: u256_to_bigdecimal(impact.clip_usdc),
                shares: u256_to_bigdecimal(impact.shares),
                delta_prob: impact.delta_prob,
                computed_at,
            })
            .collect();

        let count = rows.len();
        let owned_id = market_id.to_string();
        self.pool
            .interact_with_context(
                format!("replace price impact rows for {owned_id}"),
                move |conn| PriceImpact::replace_for_market(&owned_id, &rows, conn),
            )
            .await?;

        Ok(count)
    }
}

impl<Q: CurveQuoter + 'static> SupervisedTask for PriceImpactTask<Q> {
    async fn run(&mut self) -> Result<(), TaskError> {
        loop {
            match self.refresh_all().await {
                Ok(refreshed) => {
                    tracing::info!(
                        "[PriceImpactTask] ✅ Refreshed price impact for {refreshed} market(s)"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "[PriceImpactTask] ⚠️ Refresh cycle failed");
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
