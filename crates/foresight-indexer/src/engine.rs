use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use alloy::primitives::{I256, U256};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use serde_json::Value as JsonValue;

use foresight_db::ForesightPool;
use foresight_db::models::{
    LockEvent, Market, NewLockEvent, NewMarket, NewRedemption, NewResolution, NewRewardClaim,
    NewRewardEpoch, NewTrade, Redemption, Resolution, RewardClaim, RewardEpoch, Trade,
};
use foresight_rpc::EthRpc;
use foresight_types::{
    DomainEvent, EventContext, LockKind, LockUpdatedEvent, MarketCreatedEvent,
    MarketResolvedEvent, MarketTradedEvent, RewardClaimedEvent, SponsoredLockedEvent,
    TokensRedeemedEvent, address_to_hex, b256_to_hex, i256_to_bigdecimal, u256_to_bigdecimal,
    u256_to_decimal_string,
};

use crate::config::IndexerConfig;
use crate::profiles::ProfileSink;

/// Split a signed USDC flow into its in/out sides. Exactly one side is
/// non-zero and equals `abs(flow)`, so `usdc_in - usdc_out == flow`.
pub(crate) fn split_usdc_flow(flow: I256) -> (BigDecimal, BigDecimal) {
    if flow.is_negative() {
        // `unsigned_abs` rather than negation so I256::MIN cannot overflow.
        (BigDecimal::default(), u256_to_bigdecimal(flow.unsigned_abs()))
    } else {
        (i256_to_bigdecimal(flow), BigDecimal::default())
    }
}

pub(crate) fn sum_amounts(amounts: &[U256]) -> BigDecimal {
    amounts
        .iter()
        .fold(BigDecimal::default(), |acc, a| acc + u256_to_bigdecimal(*a))
}

pub(crate) fn amounts_to_json(amounts: &[U256]) -> JsonValue {
    JsonValue::Array(
        amounts
            .iter()
            .map(|a| JsonValue::String(u256_to_decimal_string(*a)))
            .collect(),
    )
}

/// Applies decoded events to the relational store. The single owner of every
/// mutation: the replay ledger, the live loop and the reward reconciler all
/// funnel through `apply`. Callers enforce at-most-once delivery per
/// `(contract, tx_hash, log_index)` via the processed-log ledger.
pub struct IngestionEngine {
    pub(crate) pool: Pool,
    pub(crate) rpc: Arc<dyn EthRpc>,
    pub(crate) config: IndexerConfig,
    pub(crate) profile_sink: Arc<dyn ProfileSink>,
    /// Markets due for a state snapshot at the next flush.
    pub(crate) pending_snapshots: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Debounce record: when a snapshot request was last accepted per market.
    pub(crate) last_snapshot_mark: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Addresses awaiting profile enrichment.
    pub(crate) profile_queue: Mutex<HashSet<String>>,
}

impl IngestionEngine {
    pub fn new(
        pool: Pool,
        rpc: Arc<dyn EthRpc>,
        profile_sink: Arc<dyn ProfileSink>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            pool,
            rpc,
            config,
            profile_sink,
            pending_snapshots: Mutex::new(HashMap::new()),
            last_snapshot_mark: Mutex::new(HashMap::new()),
            profile_queue: Mutex::new(HashSet::new()),
        }
    }

    /// Apply one decoded event. The match is exhaustive on purpose: a new
    /// `DomainEvent` variant will not compile until it is handled here.
    pub async fn apply(&self, event: &DomainEvent, ctx: &EventContext) -> anyhow::Result<()> {
        match event {
            DomainEvent::MarketCreated(ev) => self.handle_market_created(ev, ctx).await,
            DomainEvent::MarketTraded(ev) => self.handle_market_traded(ev, ctx).await,
            DomainEvent::MarketResolved(ev) => self.handle_market_resolved(ev, ctx).await,
            DomainEvent::TokensRedeemed(ev) => self.handle_tokens_redeemed(ev, ctx).await,
            DomainEvent::SurplusWithdrawn(ev) => {
                // Surplus already lives on the resolution row; nothing to
                // persist beyond the trace.
                tracing::info!(
                    "[IngestionEngine] 💸 Surplus {} withdrawn to {} for market {}",
                    ev.amount,
                    address_to_hex(ev.recipient),
                    b256_to_hex(ev.market_id)
                );
                Ok(())
            }
            DomainEvent::LockUpdated(ev) => self.handle_lock(ev, LockKind::Lock, ctx).await,
            DomainEvent::Unlocked(ev) => self.handle_lock(ev, LockKind::Unlock, ctx).await,
            DomainEvent::StakeUpdated(ev) => self.handle_lock(ev, LockKind::Stake, ctx).await,
            DomainEvent::SponsoredLocked(ev) => self.handle_sponsored_lock(ev, ctx).await,
            DomainEvent::EpochRootSet(ev) => {
                let new_epoch = NewRewardEpoch {
                    epoch_id: u256_to_decimal_string(ev.epoch_id),
                    root: b256_to_hex(ev.root),
                    tx_hash: b256_to_hex(ctx.tx_hash),
                    block_time: ctx.block_timestamp,
                };
                let epoch_id = new_epoch.epoch_id.clone();
                self.pool
                    .interact_with_context(format!("upsert reward epoch {epoch_id}"), move |conn| {
                        RewardEpoch::upsert(&new_epoch, conn)
                    })
                    .await?;
                Ok(())
            }
            DomainEvent::RewardClaimed(ev) => self.handle_reward_claimed(ev, ctx).await,
        }
    }

    async fn handle_market_created(
        &self,
        ev: &MarketCreatedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);
        tracing::info!("[IngestionEngine] 🆕 Market {market_id} created");

        let new_market = NewMarket {
            market_id: market_id.clone(),
            creator: address_to_hex(ev.creator),
            oracle: address_to_hex(ev.oracle),
            surplus_recipient: address_to_hex(ev.surplus_recipient),
            question_id: b256_to_hex(ev.question_id),
            outcome_names: JsonValue::Array(
                ev.outcome_names
                    .iter()
                    .map(|n| JsonValue::String(n.clone()))
                    .collect(),
            ),
            metadata: (!ev.metadata.is_empty()).then(|| ev.metadata.clone()),
            created_tx_hash: b256_to_hex(ctx.tx_hash),
            created_block: i64::try_from(ctx.block_number)?,
            created_ts: ctx.block_timestamp,
        };

        self.pool
            .interact_with_context(format!("create market {market_id}"), move |conn| {
                Market::insert_or_ignore(&new_market, conn)
            })
            .await?;

        self.enqueue_profile(address_to_hex(ev.creator));
        self.enqueue_profile(address_to_hex(ev.oracle));
        self.enqueue_profile(address_to_hex(ev.surplus_recipient));
        self.mark_for_snapshot(&market_id, true);

        Ok(())
    }

    async fn handle_market_traded(
        &self,
        ev: &MarketTradedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);
        let trader = address_to_hex(ev.trader);
        let (usdc_in, usdc_out) = split_usdc_flow(ev.usdc_flow);

        let new_trade = NewTrade {
            market_id: market_id.clone(),
            trader: trader.clone(),
            usdc_in,
            usdc_out,
            tx_hash: b256_to_hex(ctx.tx_hash),
            log_index: i64::try_from(ctx.log_index)?,
            block_number: i64::try_from(ctx.block_number)?,
            ts: ctx.block_timestamp,
        };

        let check_id = market_id.clone();
        let applied = self
            .pool
            .interact_with_context(format!("record trade on market {market_id}"), move |conn| {
                if !Market::exists(&check_id, conn)? {
                    return Ok(false);
                }
                Trade::insert_or_ignore(&new_trade, conn)?;
                Ok::<_, diesel::result::Error>(true)
            })
            .await?;

        if !applied {
            tracing::warn!(
                "[IngestionEngine] ⏭️ Dropping trade for unknown market {market_id} (tx {})",
                b256_to_hex(ctx.tx_hash)
            );
            return Ok(());
        }

        self.enqueue_profile(trader);
        self.mark_for_snapshot(&market_id, false);

        Ok(())
    }

    async fn handle_market_resolved(
        &self,
        ev: &MarketResolvedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);
        tracing::info!("[IngestionEngine] 🏁 Market {market_id} resolved");

        let new_resolution = NewResolution {
            market_id: market_id.clone(),
            surplus: u256_to_bigdecimal(ev.surplus),
            payouts: amounts_to_json(&ev.payouts),
            tx_hash: b256_to_hex(ctx.tx_hash),
            ts: ctx.block_timestamp,
        };

        let check_id = market_id.clone();
        let applied = self
            .pool
            .interact_with_context(format!("resolve market {market_id}"), move |conn| {
                if !Market::exists(&check_id, conn)? {
                    return Ok(false);
                }
                Resolution::insert_or_ignore(&new_resolution, conn)?;
                Ok::<_, diesel::result::Error>(true)
            })
            .await?;

        if applied {
            // Final state of the curve is worth one last snapshot.
            self.mark_for_snapshot(&market_id, true);
        } else {
            tracing::warn!(
                "[IngestionEngine] ⏭️ Dropping resolution for unknown market {market_id}"
            );
        }

        Ok(())
    }

    async fn handle_tokens_redeemed(
        &self,
        ev: &TokensRedeemedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);

        let new_redemption = NewRedemption {
            market_id: market_id.clone(),
            redeemer: address_to_hex(ev.redeemer),
            token_id: u256_to_bigdecimal(ev.token_id),
            shares: u256_to_bigdecimal(ev.shares),
            payout: u256_to_bigdecimal(ev.payout),
            tx_hash: b256_to_hex(ctx.tx_hash),
            log_index: i64::try_from(ctx.log_index)?,
            block_number: i64::try_from(ctx.block_number)?,
            ts: ctx.block_timestamp,
        };

        let check_id = market_id.clone();
        let applied = self
            .pool
            .interact_with_context(
                format!("record redemption on market {market_id}"),
                move |conn| {
                    if !Market::exists(&check_id, conn)? {
                        return Ok(false);
                    }
                    Redemption::insert_or_ignore(&new_redemption, conn)?;
                    Ok::<_, diesel::result::Error>(true)
                },
            )
            .await?;

        if !applied {
            tracing::warn!(
                "[IngestionEngine] ⏭️ Dropping redemption for unknown market {market_id}"
            );
        }

        Ok(())
    }

    async fn handle_lock(
        &self,
        ev: &LockUpdatedEvent,
        kind: LockKind,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);

        let new_event = NewLockEvent {
            market_id: market_id.clone(),
            locker: address_to_hex(ev.locker),
            kind: kind.as_ref().to_string(),
            amounts: Some(amounts_to_json(&ev.amounts)),
            total_amount: Some(sum_amounts(&ev.amounts)),
            sets_amount: None,
            user_paid: None,
            subsidy_used: None,
            actual_cost: None,
            tx_hash: b256_to_hex(ctx.tx_hash),
            log_index: i64::try_from(ctx.log_index)?,
            block_number: i64::try_from(ctx.block_number)?,
            ts: ctx.block_timestamp,
        };

        self.insert_lock_event(new_event, kind).await
    }

    async fn handle_sponsored_lock(
        &self,
        ev: &SponsoredLockedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let market_id = b256_to_hex(ev.market_id);

        let new_event = NewLockEvent {
            market_id: market_id.clone(),
            locker: address_to_hex(ev.locker),
            kind: LockKind::Sponsored.as_ref().to_string(),
            amounts: None,
            total_amount: None,
            sets_amount: Some(u256_to_bigdecimal(ev.sets_amount)),
            user_paid: Some(u256_to_bigdecimal(ev.user_paid)),
            subsidy_used: Some(u256_to_bigdecimal(ev.subsidy_used)),
            actual_cost: Some(u256_to_bigdecimal(ev.actual_cost)),
            tx_hash: b256_to_hex(ctx.tx_hash),
            log_index: i64::try_from(ctx.log_index)?,
            block_number: i64::try_from(ctx.block_number)?,
            ts: ctx.block_timestamp,
        };

        self.insert_lock_event(new_event, LockKind::Sponsored).await
    }

    async fn insert_lock_event(
        &self,
        new_event: NewLockEvent,
        kind: LockKind,
    ) -> anyhow::Result<()> {
        let market_id = new_event.market_id.clone();
        let check_id = market_id.clone();

        let applied = self
            .pool
            .interact_with_context(
                format!("record {kind} event on market {market_id}"),
                move |conn| {
                    if !Market::exists(&check_id, conn)? {
                        return Ok(false);
                    }
                    LockEvent::insert_or_ignore(&new_event, conn)?;
                    Ok::<_, diesel::result::Error>(true)
                },
            )
            .await?;

        if !applied {
            tracing::warn!(
                "[IngestionEngine] ⏭️ Dropping {kind} event for unknown market {market_id}"
            );
        }

        Ok(())
    }

    async fn handle_reward_claimed(
        &self,
        ev: &RewardClaimedEvent,
        ctx: &EventContext,
    ) -> anyhow::Result<()> {
        let new_claim = NewRewardClaim {
            epoch_id: u256_to_decimal_string(ev.epoch_id),
            wallet: address_to_hex(ev.wallet),
            amount: u256_to_bigdecimal(ev.amount),
            tx_hash: b256_to_hex(ctx.tx_hash),
            block_time: ctx.block_timestamp,
        };

        let label = format!("record claim epoch={} wallet={}", new_claim.epoch_id, new_claim.wallet);
        let inserted = self
            .pool
            .interact_with_context(label, move |conn| RewardClaim::insert_or_ignore(&new_claim, conn))
            .await?;

        if inserted == 0 {
            tracing::debug!(
                "[IngestionEngine] ⏭️ Claim already recorded for epoch={} wallet={}",
                u256_to_decimal_string(ev.epoch_id),
                address_to_hex(ev.wallet)
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_split_flow_negative_goes_out() {
        let (usdc_in, usdc_out) = split_usdc_flow(I256::from_str("-50000000").unwrap());
        assert_eq!(usdc_in.to_string(), "0");
        assert_eq!(usdc_out.to_string(), "50000000");
    }

    #[test]
    fn test_split_flow_positive_goes_in() {
        let (usdc_in, usdc_out) = split_usdc_flow(I256::from_str("125000000").unwrap());
        assert_eq!(usdc_in.to_string(), "125000000");
        assert_eq!(usdc_out.to_string(), "0");
    }

    #[test]
    fn test_split_flow_zero() {
        let (usdc_in, usdc_out) = split_usdc_flow(I256::ZERO);
        assert_eq!(usdc_in.to_string(), "0");
        assert_eq!(usdc_out.to_string(), "0");
    }

    #[test]
    fn test_split_flow_conservation() {
        // usdc_in - usdc_out must reconstruct the signed flow.
        for raw in ["-987654321", "0", "1", "-1", "340282366920938463463374607431768211456"] {
            let flow = I256::from_str(raw).unwrap();
            let (usdc_in, usdc_out) = split_usdc_flow(flow);
            assert_eq!((usdc_in - usdc_out).to_string(), raw);
        }
    }

    #[test]
    fn test_sum_amounts_spans_u64() {
        let amounts = vec![U256::from(u64::MAX), U256::from(1u64)];
        assert_eq!(sum_amounts(&amounts).to_string(), "18446744073709551616");
    }

    #[test]
    fn test_amounts_to_json_keeps_order_and_precision() {
        let amounts = vec![
            U256::from(400_000u64),
            U256::from_str("115792089237316195423570985008687907853269984665640564039457584007913129639935").unwrap(),
        ];
        let json = amounts_to_json(&amounts);
        assert_eq!(json[0], "400000");
        assert_eq!(
            json[1],
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }
}
