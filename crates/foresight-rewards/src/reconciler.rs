use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::{SolCall, SolEvent};
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;

use foresight_db::ForesightPool;
use foresight_db::models::{Meta, RewardClaim, meta_keys};
use foresight_indexer::decode::abi::{distributor, erc20};
use foresight_indexer::decode::{EventDecoder, parse_hex_bytes, parse_topics};
use foresight_indexer::engine::IngestionEngine;
use foresight_indexer::fetch::{RangeFetcher, SpanConfig};
use foresight_indexer::timestamps::TimestampResolver;
use foresight_rpc::{EthRpc, RawLog};
use foresight_types::{
    ContractKind, DomainEvent, EventContext, RewardClaimedEvent, u256_to_decimal_string,
};

/// Extract claim rows from distributor calldata: a single `claimReward`
/// yields one, `batchClaimRewards` one per paired index. Anything else (a
/// contract-mediated transfer, an airdrop sweep) yields none.
pub(crate) fn claims_from_calldata(input: &[u8]) -> Vec<(U256, U256)> {
    if let Ok(call) = distributor::claimRewardCall::abi_decode(input, true) {
        return vec![(call.epochId, call.amount)];
    }

    if let Ok(call) = distributor::batchClaimRewardsCall::abi_decode(input, true) {
        let n = call.epochIds.len().min(call.amounts.len());
        return (0..n).map(|i| (call.epochIds[i], call.amounts[i])).collect();
    }

    Vec::new()
}

/// Reconciles reward claims observed through two independent signals — the
/// distributor's own events and ERC-20 transfers out of the distributor —
/// into one ledger where no `(epoch, wallet)` pair is counted twice.
pub struct RewardReconciler {
    pool: Pool,
    rpc: Arc<dyn EthRpc>,
    engine: Arc<IngestionEngine>,
    decoder: Arc<EventDecoder>,
    timestamps: Arc<TimestampResolver>,
    distributors: HashSet<Address>,
    reward_token: Address,
    spans: SpanConfig,
    fallback_lookback_days: u64,
}

impl RewardReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Pool,
        rpc: Arc<dyn EthRpc>,
        engine: Arc<IngestionEngine>,
        decoder: Arc<EventDecoder>,
        timestamps: Arc<TimestampResolver>,
        distributors: impl IntoIterator<Item = Address>,
        reward_token: Address,
        spans: SpanConfig,
        fallback_lookback_days: u64,
    ) -> Self {
        Self {
            pool,
            rpc,
            engine,
            decoder,
            timestamps,
            distributors: distributors.into_iter().collect(),
            reward_token,
            spans,
            fallback_lookback_days,
        }
    }

    /// One reconciliation pass from the stored watermark to the chain head.
    /// Returns the number of claim rows dispatched (both paths).
    pub async fn reconcile(&self) -> anyhow::Result<usize> {
        let head = self.rpc.block_number().await?;
        let from_block = self.start_block(head).await?;
        if from_block > head {
            return Ok(0);
        }

        let mut addresses: Vec<Address> = self.distributors.iter().copied().collect();
        addresses.push(self.reward_token);
        let mut fetcher = RangeFetcher::new(self.rpc.clone(), addresses, self.spans)
            .with_topic_filter(vec![
                distributor::EpochRootSet::SIGNATURE_HASH,
                distributor::RewardClaimed::SIGNATURE_HASH,
                erc20::Transfer::SIGNATURE_HASH,
            ]);

        let mut cursor = from_block - 1;
        let mut claims = 0usize;

        while cursor < head {
            let step = fetcher.next_step(cursor + 1, head).await;
            for log in &step.logs {
                match self.handle_log(log).await {
                    Ok(n) => claims += n,
                    Err(e) => {
                        // One malformed claim transaction must not stall the
                        // whole pass.
                        tracing::warn!(
                            error = %e,
                            "[RewardReconciler] ⚠️ Skipping log {}#{}",
                            log.transaction_hash,
                            log.log_index
                        );
                    }
                }
            }
            cursor = step.next_cursor - 1;
        }

        let synced_at = Utc::now().to_rfc3339();
        self.pool
            .interact_with_context("advance rewards watermark".to_string(), move |conn| {
                Meta::set_u64(meta_keys::REWARDS_LAST_BLOCK, head, conn)?;
                Meta::set(meta_keys::REWARDS_LAST_SYNCED_AT, &synced_at, conn)
            })
            .await?;

        if claims > 0 {
            tracing::info!("[RewardReconciler] 🎁 Dispatched {claims} claim row(s)");
        }
        Ok(claims)
    }

    async fn start_block(&self, head: u64) -> anyhow::Result<u64> {
        let stored = self
            .pool
            .interact_with_context("load rewards watermark".to_string(), |conn| {
                Meta::get_u64(meta_keys::REWARDS_LAST_BLOCK, conn)
            })
            .await?;

        if let Some(watermark) = stored {
            return Ok(watermark + 1);
        }

        let target_ts = (Utc::now().timestamp() as u64)
            .saturating_sub(self.fallback_lookback_days * 86_400);
        let start = foresight_rpc::find_block_at_timestamp(self.rpc.as_ref(), target_ts).await?;
        tracing::info!(
            "[RewardReconciler] 🆕 No watermark, scanning from block {start} (head {head})"
        );
        Ok(start)
    }

    async fn handle_log(&self, raw: &RawLog) -> anyhow::Result<usize> {
        let Ok(address) = raw.address.parse::<Address>() else {
            return Ok(0);
        };
        let Some(topics) = parse_topics(&raw.topics) else {
            return Ok(0);
        };
        let Some(data) = parse_hex_bytes(&raw.data) else {
            return Ok(0);
        };

        if self.distributors.contains(&address) {
            // Path A: the distributor's own events, applied through the
            // shared mutator.
            let Some(event) = self.decoder.decode(ContractKind::Distributor, &topics, &data)
            else {
                return Ok(0);
            };
            let ctx = self.context_for(raw, address).await?;
            self.engine.apply(&event, &ctx).await?;
            return Ok(usize::from(matches!(event, DomainEvent::RewardClaimed(_))));
        }

        if address == self.reward_token {
            let Some(topic0) = topics.first() else {
                return Ok(0);
            };
            if *topic0 != erc20::Transfer::SIGNATURE_HASH {
                return Ok(0);
            }
            let Ok(transfer) = erc20::Transfer::decode_raw_log(topics.iter().copied(), &data, true)
            else {
                return Ok(0);
            };
            if !self.distributors.contains(&transfer.from) {
                return Ok(0);
            }
            return self.infer_claims_from_transfer(raw, transfer.to).await;
        }

        Ok(0)
    }

    /// Path B: a token transfer out of a distributor is a candidate claim.
    /// Some claim paths emit no dedicated event, so correctness is recovered
    /// from the transfer side-effect plus the transaction's calldata.
    async fn infer_claims_from_transfer(
        &self,
        raw: &RawLog,
        recipient: Address,
    ) -> anyhow::Result<usize> {
        let tx_hash_hex = raw.transaction_hash.to_lowercase();

        // If the direct-event path already produced a claim for this
        // transaction, inferring another would double-count it.
        let check_hash = tx_hash_hex.clone();
        let already = self
            .pool
            .interact_with_context(
                format!("check claim exists for tx {check_hash}"),
                move |conn| RewardClaim::exists_by_tx_hash(&check_hash, conn),
            )
            .await?;
        if already {
            return Ok(0);
        }

        let tx_hash = tx_hash_hex.parse()?;
        let Some(tx) = self.rpc.get_transaction_by_hash(tx_hash).await? else {
            tracing::warn!(
                "[RewardReconciler] 🫥 Transaction {tx_hash_hex} not found for claim inference"
            );
            return Ok(0);
        };
        let Some(input) = parse_hex_bytes(&tx.input) else {
            return Ok(0);
        };

        let inferred = claims_from_calldata(&input);
        if inferred.is_empty() {
            tracing::debug!(
                "[RewardReconciler] 🫥 Transfer in {tx_hash_hex} is not a recognized claim call"
            );
            return Ok(0);
        }

        let ctx = self.context_for(raw, self.reward_token).await?;
        let mut dispatched = 0usize;
        for (epoch_id, amount) in inferred {
            let event = DomainEvent::RewardClaimed(RewardClaimedEvent {
                epoch_id,
                wallet: recipient,
                amount,
            });
            self.engine.apply(&event, &ctx).await?;
            tracing::info!(
                "[RewardReconciler] 🔎 Inferred claim epoch={} wallet={recipient} from calldata",
                u256_to_decimal_string(epoch_id)
            );
            dispatched += 1;
        }

        Ok(dispatched)
    }

    async fn context_for(&self, raw: &RawLog, contract: Address) -> anyhow::Result<EventContext> {
        let ts = self.timestamps.resolve(raw.block_number).await?;
        let block_timestamp = DateTime::from_timestamp(i64::try_from(ts)?, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid timestamp {ts}"))?;

        Ok(EventContext {
            contract,
            tx_hash: raw.transaction_hash.to_lowercase().parse()?,
            log_index: raw.log_index,
            block_number: raw.block_number,
            block_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_single_claim_calldata() {
        let input = distributor::claimRewardCall {
            epochId: U256::from(7u64),
            amount: U256::from(1_000_000u64),
        }
        .abi_encode();

        let claims = claims_from_calldata(&input);
        assert_eq!(claims, vec![(U256::from(7u64), U256::from(1_000_000u64))]);
    }

    #[test]
    fn test_batch_claim_calldata_pairs_by_index() {
        let input = distributor::batchClaimRewardsCall {
            epochIds: vec![U256::from(7u64), U256::from(8u64)],
            amounts: vec![U256::from(1_000_000u64), U256::from(2_000_000u64)],
        }
        .abi_encode();

        let claims = claims_from_calldata(&input);
        assert_eq!(
            claims,
            vec![
                (U256::from(7u64), U256::from(1_000_000u64)),
                (U256::from(8u64), U256::from(2_000_000u64)),
            ]
        );
    }

    #[test]
    fn test_batch_claim_truncates_to_shorter_side() {
        let input = distributor::batchClaimRewardsCall {
            epochIds: vec![U256::from(1u64), U256::from(2u64), U256::from(3u64)],
            amounts: vec![U256::from(10u64)],
        }
        .abi_encode();

        assert_eq!(
            claims_from_calldata(&input),
            vec![(U256::from(1u64), U256::from(10u64))]
        );
    }

    #[test]
    fn test_unrecognized_selector_yields_nothing() {
        // 4 bytes of selector nothing will match, plus a word of junk.
        let mut input = vec![0xde, 0xad, 0xbe, 0xef];
        input.extend_from_slice(&[0u8; 32]);
        assert!(claims_from_calldata(&input).is_empty());
        assert!(claims_from_calldata(&[]).is_empty());
    }

    #[test]
    fn test_epoch_ids_survive_past_2_53() {
        let big = U256::from_str("18014398509481984001").unwrap();
        let input = distributor::claimRewardCall {
            epochId: big,
            amount: U256::from(5u64),
        }
        .abi_encode();

        let claims = claims_from_calldata(&input);
        assert_eq!(u256_to_decimal_string(claims[0].0), "18014398509481984001");
    }
}
