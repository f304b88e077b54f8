use std::collections::HashSet;

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;

use foresight_types::{
    ContractKind, DomainEvent, EpochRootSetEvent, LockUpdatedEvent, MarketCreatedEvent,
    MarketResolvedEvent, MarketTradedEvent, RewardClaimedEvent, SponsoredLockedEvent,
    SurplusWithdrawnEvent, TokensRedeemedEvent,
};

/// ABI surfaces of the watched contracts. The reward crate reuses the
/// distributor function bindings for calldata inference.
pub mod abi {
    pub mod market {
        alloy::sol! {
            event MarketCreated(bytes32 indexed marketId, address indexed creator, address oracle, address surplusRecipient, bytes32 questionId, string[] outcomeNames, bytes metadata);
            event MarketTraded(bytes32 indexed marketId, address indexed trader, int256 usdcFlow);
            event MarketResolved(bytes32 indexed marketId, uint256 surplus, uint256[] payouts);
            event TokensRedeemed(bytes32 indexed marketId, address indexed redeemer, uint256 tokenId, uint256 shares, uint256 payout);
            event SurplusWithdrawn(bytes32 indexed marketId, address indexed recipient, uint256 amount);
        }
    }

    pub mod vault {
        alloy::sol! {
            event Locked(bytes32 indexed marketId, address indexed locker, uint256[] amounts);
            event Unlocked(bytes32 indexed marketId, address indexed locker, uint256[] amounts);
            event StakeUpdated(bytes32 indexed marketId, address indexed staker, uint256[] amounts);
            event SponsoredLocked(bytes32 indexed marketId, address indexed locker, uint256 setsAmount, uint256 userPaid, uint256 subsidyUsed, uint256 actualCost);
        }
    }

    pub mod distributor {
        alloy::sol! {
            event EpochRootSet(uint256 indexed epochId, bytes32 root);
            event RewardClaimed(uint256 indexed epochId, address indexed wallet, uint256 amount);

            function claimReward(uint256 epochId, uint256 amount) external;
            function batchClaimRewards(uint256[] calldata epochIds, uint256[] calldata amounts) external;
        }
    }

    pub mod erc20 {
        alloy::sol! {
            event Transfer(address indexed from, address indexed to, uint256 value);
        }
    }

    /// Read-only bonding-curve surface used by the snapshot flush.
    pub mod curve {
        alloy::sol! {
            function getMarketInfo(bytes32 marketId) external view returns (uint256 totalUsdc, uint256[] memory q, uint256 alpha);
        }
    }
}

/// `"0x..."` hex string -> bytes. `None` on malformed input.
pub fn parse_hex_bytes(raw: &str) -> Option<Vec<u8>> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).ok()
}

pub fn parse_topics(raw: &[String]) -> Option<Vec<B256>> {
    raw.iter()
        .map(|t| t.parse::<B256>().ok())
        .collect::<Option<Vec<_>>>()
}

/// Maps contract addresses to the ABI used against them and turns raw logs
/// into `DomainEvent`s. Logs the system does not model come back as `None`;
/// the chain emits far more event types than this store records.
pub struct EventDecoder {
    market: Address,
    vault: Address,
    distributors: HashSet<Address>,
    reward_token: Address,
}

impl EventDecoder {
    pub fn new(
        market: Address,
        vault: Address,
        distributors: impl IntoIterator<Item = Address>,
        reward_token: Address,
    ) -> Self {
        Self {
            market,
            vault,
            distributors: distributors.into_iter().collect(),
            reward_token,
        }
    }

    /// Which registered contract emitted this log, if any.
    pub fn contract_kind(&self, address: Address) -> Option<ContractKind> {
        if address == self.market {
            Some(ContractKind::Market)
        } else if address == self.vault {
            Some(ContractKind::Vault)
        } else if self.distributors.contains(&address) {
            Some(ContractKind::Distributor)
        } else if address == self.reward_token {
            Some(ContractKind::RewardToken)
        } else {
            None
        }
    }

    /// Decode one raw log against the ABI registered for its contract.
    /// Undecodable or unmodeled logs yield `None`, never an error.
    pub fn decode(
        &self,
        kind: ContractKind,
        topics: &[B256],
        data: &[u8],
    ) -> Option<DomainEvent> {
        let topic0 = topics.first()?;
        match kind {
            ContractKind::Market => Self::decode_market(*topic0, topics, data),
            ContractKind::Vault => Self::decode_vault(*topic0, topics, data),
            ContractKind::Distributor => Self::decode_distributor(*topic0, topics, data),
            // Reward-token transfers are inferred claims, handled by the
            // reward reconciler rather than modeled as domain events.
            ContractKind::RewardToken => None,
        }
    }

    fn decode_market(topic0: B256, topics: &[B256], data: &[u8]) -> Option<DomainEvent> {
        use abi::market::*;

        if topic0 == MarketCreated::SIGNATURE_HASH {
            let ev = MarketCreated::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::MarketCreated(MarketCreatedEvent {
                market_id: ev.marketId,
                creator: ev.creator,
                oracle: ev.oracle,
                surplus_recipient: ev.surplusRecipient,
                question_id: ev.questionId,
                outcome_names: ev.outcomeNames,
                metadata: ev.metadata.to_vec(),
            }))
        } else if topic0 == MarketTraded::SIGNATURE_HASH {
            let ev = MarketTraded::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::MarketTraded(MarketTradedEvent {
                market_id: ev.marketId,
                trader: ev.trader,
                usdc_flow: ev.usdcFlow,
            }))
        } else if topic0 == MarketResolved::SIGNATURE_HASH {
            let ev = MarketResolved::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::MarketResolved(MarketResolvedEvent {
                market_id: ev.marketId,
                surplus: ev.surplus,
                payouts: ev.payouts,
            }))
        } else if topic0 == TokensRedeemed::SIGNATURE_HASH {
            let ev = TokensRedeemed::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::TokensRedeemed(TokensRedeemedEvent {
                market_id: ev.marketId,
                redeemer: ev.redeemer,
                token_id: ev.tokenId,
                shares: ev.shares,
                payout: ev.payout,
            }))
        } else if topic0 == SurplusWithdrawn::SIGNATURE_HASH {
            let ev = SurplusWithdrawn::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::SurplusWithdrawn(SurplusWithdrawnEvent {
                market_id: ev.marketId,
                recipient: ev.recipient,
                amount: ev.amount,
            }))
        } else {
            None
        }
    }

    fn decode_vault(topic0: B256, topics: &[B256], data: &[u8]) -> Option<DomainEvent> {
        use abi::vault::*;

        if topic0 == Locked::SIGNATURE_HASH {
            let ev = Locked::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::LockUpdated(LockUpdatedEvent {
                market_id: ev.marketId,
                locker: ev.locker,
                amounts: ev.amounts,
            }))
        } else if topic0 == Unlocked::SIGNATURE_HASH {
            let ev = Unlocked::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::Unlocked(LockUpdatedEvent {
                market_id: ev.marketId,
                locker: ev.locker,
                amounts: ev.amounts,
            }))
        } else if topic0 == StakeUpdated::SIGNATURE_HASH {
            let ev = StakeUpdated::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::StakeUpdated(LockUpdatedEvent {
                market_id: ev.marketId,
                locker: ev.staker,
                amounts: ev.amounts,
            }))
        } else if topic0 == SponsoredLocked::SIGNATURE_HASH {
            let ev = SponsoredLocked::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::SponsoredLocked(SponsoredLockedEvent {
                market_id: ev.marketId,
                locker: ev.locker,
                sets_amount: ev.setsAmount,
                user_paid: ev.userPaid,
                subsidy_used: ev.subsidyUsed,
                actual_cost: ev.actualCost,
            }))
        } else {
            None
        }
    }

    fn decode_distributor(topic0: B256, topics: &[B256], data: &[u8]) -> Option<DomainEvent> {
        use abi::distributor::*;

        if topic0 == EpochRootSet::SIGNATURE_HASH {
            let ev = EpochRootSet::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::EpochRootSet(EpochRootSetEvent {
                epoch_id: ev.epochId,
                root: ev.root,
            }))
        } else if topic0 == RewardClaimed::SIGNATURE_HASH {
            let ev = RewardClaimed::decode_raw_log(topics.iter().copied(), data, true).ok()?;
            Some(DomainEvent::RewardClaimed(RewardClaimedEvent {
                epoch_id: ev.epochId,
                wallet: ev.wallet,
                amount: ev.amount,
            }))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{I256, U256};
    use alloy::sol_types::SolValue;
    use std::str::FromStr;

    fn decoder() -> EventDecoder {
        EventDecoder::new(
            Address::from_str("0x00000000000000000000000000000000000000a1").unwrap(),
            Address::from_str("0x00000000000000000000000000000000000000b2").unwrap(),
            [Address::from_str("0x00000000000000000000000000000000000000c3").unwrap()],
            Address::from_str("0x00000000000000000000000000000000000000d4").unwrap(),
        )
    }

    fn market_id() -> B256 {
        B256::from_str("0x1111111111111111111111111111111111111111111111111111111111111111")
            .unwrap()
    }

    #[test]
    fn test_contract_kind_registry() {
        let d = decoder();
        assert_eq!(
            d.contract_kind(
                Address::from_str("0x00000000000000000000000000000000000000a1").unwrap()
            ),
            Some(ContractKind::Market)
        );
        assert_eq!(
            d.contract_kind(
                Address::from_str("0x00000000000000000000000000000000000000c3").unwrap()
            ),
            Some(ContractKind::Distributor)
        );
        assert_eq!(
            d.contract_kind(
                Address::from_str("0x00000000000000000000000000000000000000ee").unwrap()
            ),
            None
        );
    }

    #[test]
    fn test_decode_market_traded_preserves_signed_flow() {
        let d = decoder();
        let trader = Address::from_str("0x00000000000000000000000000000000000000f5").unwrap();
        let flow = I256::from_str("-50000000").unwrap();

        let topics = vec![
            abi::market::MarketTraded::SIGNATURE_HASH,
            market_id(),
            trader.into_word(),
        ];
        let data = flow.abi_encode();

        match d.decode(ContractKind::Market, &topics, &data) {
            Some(DomainEvent::MarketTraded(ev)) => {
                assert_eq!(ev.market_id, market_id());
                assert_eq!(ev.trader, trader);
                assert_eq!(ev.usdc_flow, flow);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_sponsored_locked_cost_breakdown() {
        let d = decoder();
        let locker = Address::from_str("0x00000000000000000000000000000000000000f6").unwrap();

        let topics = vec![
            abi::vault::SponsoredLocked::SIGNATURE_HASH,
            market_id(),
            locker.into_word(),
        ];
        let data = (
            U256::from(2_000_000u64),
            U256::from(400_000u64),
            U256::from(600_000u64),
            U256::from(1_000_000u64),
        )
            .abi_encode();

        match d.decode(ContractKind::Vault, &topics, &data) {
            Some(DomainEvent::SponsoredLocked(ev)) => {
                assert_eq!(ev.sets_amount, U256::from(2_000_000u64));
                assert_eq!(ev.user_paid, U256::from(400_000u64));
                assert_eq!(ev.subsidy_used, U256::from(600_000u64));
                assert_eq!(ev.actual_cost, U256::from(1_000_000u64));
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_topic_is_skipped_not_fatal() {
        let d = decoder();
        let topics = vec![B256::repeat_byte(0x99)];
        assert!(d.decode(ContractKind::Market, &topics, &[]).is_none());
        assert!(d.decode(ContractKind::Vault, &topics, &[]).is_none());
        assert!(d.decode(ContractKind::Distributor, &topics, &[]).is_none());
    }

    #[test]
    fn test_malformed_data_is_skipped() {
        let d = decoder();
        let trader = Address::from_str("0x00000000000000000000000000000000000000f5").unwrap();
        let topics = vec![
            abi::market::MarketTraded::SIGNATURE_HASH,
            market_id(),
            trader.into_word(),
        ];
        // Truncated data word.
        assert!(d.decode(ContractKind::Market, &topics, &[0u8; 7]).is_none());
    }

    #[test]
    fn test_reward_token_logs_not_modeled() {
        let d = decoder();
        let topics = vec![abi::erc20::Transfer::SIGNATURE_HASH];
        assert!(d.decode(ContractKind::RewardToken, &topics, &[]).is_none());
    }

    #[test]
    fn test_parse_hex_bytes_lenient_prefix() {
        assert_eq!(parse_hex_bytes("0x0102"), Some(vec![1, 2]));
        assert_eq!(parse_hex_bytes("0102"), Some(vec![1, 2]));
        assert_eq!(parse_hex_bytes("0xzz"), None);
    }
}
