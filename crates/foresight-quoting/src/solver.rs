use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use bigdecimal::BigDecimal;

use foresight_rpc::EthRpc;
use foresight_types::u256_to_bigdecimal;

/// Read-only bonding-curve surface. Prices are micro-probability units
/// (1_000_000 = probability 1), matching USDC's 6-decimal fixed point.
mod abi {
    alloy::sol! {
        function getMarketInfo(bytes32 marketId) external view returns (uint256 totalUsdc, uint256[] memory q, uint256 alpha);
        function calcPrice(uint256[] memory q, uint256 alpha) external view returns (uint256[] memory prices);
        function quoteTrade(bytes32 marketId, uint256 outcomeIndex, uint256 shares) external view returns (uint256 cost);
    }
}

/// Share-quantity ceiling for the exponential bound growth. Hitting it means
/// the clip cannot move the market and no row is produced for that clip.
pub const SHARE_SEARCH_CAP: u64 = 1_000_000_000_000;

/// Micro-probability scale shared by prices and USDC amounts.
const PRICE_SCALE: u64 = 1_000_000;

/// The curve reads the solver needs, behind a trait so the search logic is
/// testable against synthetic curves.
#[async_trait]
pub trait CurveQuoter: Send + Sync {
    /// `(total_usdc, per-outcome quantities, alpha)`.
    async fn market_info(&self, market_id: B256) -> anyhow::Result<(U256, Vec<U256>, U256)>;

    /// Price vector for an arbitrary quantity vector.
    async fn prices(&self, q: &[U256], alpha: U256) -> anyhow::Result<Vec<U256>>;

    /// Quoted cost of buying `shares` of one outcome at current state.
    async fn quote(
        &self,
        market_id: B256,
        outcome_index: usize,
        shares: U256,
    ) -> anyhow::Result<U256>;
}

/// `eth_call`-backed quoter against the market contract.
pub struct OnChainQuoter {
    rpc: Arc<dyn EthRpc>,
    market_address: Address,
}

impl OnChainQuoter {
    pub fn new(rpc: Arc<dyn EthRpc>, market_address: Address) -> Self {
        Self {
            rpc,
            market_address,
        }
    }
}

#[async_trait]
impl CurveQuoter for OnChainQuoter {
    async fn market_info(&self, market_id: B256) -> anyhow::Result<(U256, Vec<U256>, U256)> {
        let calldata = abi::getMarketInfoCall { marketId: market_id }.abi_encode();
        let returned = self.rpc.call(self.market_address, calldata).await?;
        let info = abi::getMarketInfoCall::abi_decode_returns(&returned, true)?;
        Ok((info.totalUsdc, info.q, info.alpha))
    }

    async fn prices(&self, q: &[U256], alpha: U256) -> anyhow::Result<Vec<U256>> {
        let calldata = abi::calcPriceCall {
            q: q.to_vec(),
            alpha,
        }
        .abi_encode();
        let returned = self.rpc.call(self.market_address, calldata).await?;
        Ok(abi::calcPriceCall::abi_decode_returns(&returned, true)?.prices)
    }

    async fn quote(
        &self,
        market_id: B256,
        outcome_index: usize,
        shares: U256,
    ) -> anyhow::Result<U256> {
        let calldata = abi::quoteTradeCall {
            marketId: market_id,
            outcomeIndex: U256::from(outcome_index),
            shares,
        }
        .abi_encode();
        let returned = self.rpc.call(self.market_address, calldata).await?;
        Ok(abi::quoteTradeCall::abi_decode_returns(&returned, true)?.cost)
    }
}

/// One answered clip: the minimum share quantity whose quoted cost reaches
/// the clip, and the probability move it produces on the top outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactRow {
    pub clip_usdc: U256,
    pub shares: U256,
    pub delta_prob: BigDecimal,
}

pub struct PriceImpactSolver<Q> {
    quoter: Q,
}

impl<Q: CurveQuoter> PriceImpactSolver<Q> {
    pub fn new(quoter: Q) -> Self {
        Self { quoter }
    }

    /// Minimum shares whose quoted cost is >= `target_cost`: exponential
    /// bound growth (doubling from 1, capped), then integer bisection until
    /// the bounds are adjacent. `None` when the cap cannot reach the target.
    pub async fn min_shares_for_cost(
        &self,
        market_id: B256,
        outcome_index: usize,
        target_cost: U256,
    ) -> anyhow::Result<Option<U256>> {
        let cap = U256::from(SHARE_SEARCH_CAP);

        let mut high = U256::from(1u64);
        loop {
            let cost = self.quoter.quote(market_id, outcome_index, high).await?;
            if cost >= target_cost {
                break;
            }
            if high >= cap {
                return Ok(None);
            }
            high = (high * U256::from(2u64)).min(cap);
        }

        let mut low = U256::ZERO;
        while high - low > U256::from(1u64) {
            let mid = (low + high) >> 1;
            let cost = self.quoter.quote(market_id, outcome_index, mid).await?;
            if cost >= target_cost {
                high = mid;
            } else {
                low = mid;
            }
        }

        Ok(Some(high))
    }

    /// Full recomputation for one market: for the currently highest-priced
    /// outcome and each clip, the share quantity meeting the clip and the
    /// price delta after applying that quantity to a synthetic copy of the
    /// outcome-quantity vector. Clips the cap cannot answer are absent.
    pub async fn cost_to_move_top(
        &self,
        market_id: B256,
        clips_usdc: &[U256],
    ) -> anyhow::Result<Vec<ImpactRow>> {
        let (_total_usdc, q, alpha) = self.quoter.market_info(market_id).await?;
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let base_prices = self.quoter.prices(&q, alpha).await?;
        let Some(top) = base_prices
            .iter()
            .enumerate()
            .max_by_key(|(_, price)| **price)
            .map(|(i, _)| i)
        else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(clips_usdc.len());
        for &clip in clips_usdc {
            let Some(shares) = self.min_shares_for_cost(market_id, top, clip).await? else {
                tracing::debug!(
                    "[PriceImpactSolver] 🧱 Clip {clip} unreachable within share cap on {market_id}"
                );
                continue;
            };

            let mut synthetic = q.clone();
            synthetic[top] += shares;
            let moved_prices = self.quoter.prices(&synthetic, alpha).await?;

            let delta_prob = (u256_to_bigdecimal(moved_prices[top])
                - u256_to_bigdecimal(base_prices[top]))
                / BigDecimal::from(PRICE_SCALE);

            rows.push(ImpactRow {
                clip_usdc: clip,
                shares,
                delta_prob,
            });
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic convex curve: cost(shares) = unit_cost * shares
    ///                                      + shares^2 / curvature.
    struct SyntheticCurve {
        q: Vec<U256>,
        alpha: U256,
        unit_cost: u64,
        curvature: u64,
    }

    #[async_trait]
    impl CurveQuoter for SyntheticCurve {
        async fn market_info(&self, _market_id: B256) -> anyhow::Result<(U256, Vec<U256>, U256)> {
            Ok((U256::from(1_000_000_000u64), self.q.clone(), self.alpha))
        }

        async fn prices(&self, q: &[U256], _alpha: U256) -> anyhow::Result<Vec<U256>> {
            // Normalized quantities as micro-probabilities.
            let total: U256 = q.iter().copied().fold(U256::ZERO, |a, b| a + b);
            if total.is_zero() {
                return Ok(vec![U256::ZERO; q.len()]);
            }
            Ok(q.iter()
                .map(|&qi| qi * U256::from(1_000_000u64) / total)
                .collect())
        }

        async fn quote(
            &self,
            _market_id: B256,
            _outcome_index: usize,
            shares: U256,
        ) -> anyhow::Result<U256> {
            Ok(shares * U256::from(self.unit_cost)
                + shares * shares / U256::from(self.curvature))
        }
    }

    fn curve() -> PriceImpactSolver<SyntheticCurve> {
        PriceImpactSolver::new(SyntheticCurve {
            q: vec![
                U256::from(600_000u64),
                U256::from(300_000u64),
                U256::from(100_000u64),
            ],
            alpha: U256::from(50u64),
            unit_cost: 3,
            curvature: 1_000,
        })
    }

    fn market() -> B256 {
        B256::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_min_shares_is_minimal() {
        let solver = curve();
        let target = U256::from(10_000u64);
        let shares = solver
            .min_shares_for_cost(market(), 0, target)
            .await
            .unwrap()
            .unwrap();

        let at = solver.quoter.quote(market(), 0, shares).await.unwrap();
        let below = solver
            .quoter
            .quote(market(), 0, shares - U256::from(1u64))
            .await
            .unwrap();
        assert!(at >= target);
        assert!(below < target);
    }

    #[tokio::test]
    async fn test_monotonic_in_target_cost() {
        let solver = curve();
        let mut previous = U256::ZERO;
        for clip in [1_000u64, 5_000, 20_000, 100_000, 500_000] {
            let shares = solver
                .min_shares_for_cost(market(), 0, U256::from(clip))
                .await
                .unwrap()
                .unwrap();
            assert!(
                shares >= previous,
                "shares for clip {clip} regressed: {shares} < {previous}"
            );
            previous = shares;
        }
    }

    #[tokio::test]
    async fn test_unreachable_clip_is_absent_not_zero() {
        // A curve so cheap the cap cannot reach an astronomic target.
        let solver = PriceImpactSolver::new(SyntheticCurve {
            q: vec![U256::from(1u64), U256::from(1u64)],
            alpha: U256::from(50u64),
            unit_cost: 0,
            curvature: u64::MAX,
        });

        let result = solver
            .min_shares_for_cost(market(), 0, U256::from(u64::MAX))
            .await
            .unwrap();
        assert_eq!(result, None);

        let rows = solver
            .cost_to_move_top(market(), &[U256::from(u64::MAX)])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_cost_to_move_top_reports_positive_delta() {
        let solver = curve();
        let rows = solver
            .cost_to_move_top(market(), &[U256::from(10_000u64), U256::from(50_000u64)])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.delta_prob > BigDecimal::from(0));
        }
        // Bigger clip moves the price at least as much.
        assert!(rows[1].shares >= rows[0].shares);
        assert!(rows[1].delta_prob >= rows[0].delta_prob);
    }
}
