use alloy::primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

/// Which registered contract a raw log belongs to. Drives per-contract ABI
/// dispatch in the decoder and the replay ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ContractKind {
    Market,
    Vault,
    Distributor,
    RewardToken,
}

/// Positioning of a decoded event within the chain, carried alongside the
/// event payload so rows can be keyed by `(contract, tx_hash, log_index)`.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub contract: Address,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub block_timestamp: DateTime<Utc>,
}

/// The lock-event kinds stored in the `locks` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LockKind {
    Lock,
    Unlock,
    Stake,
    Sponsored,
}

#[derive(Debug, Clone)]
pub struct MarketCreatedEvent {
    pub market_id: B256,
    pub creator: Address,
    pub oracle: Address,
    pub surplus_recipient: Address,
    pub question_id: B256,
    pub outcome_names: Vec<String>,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MarketTradedEvent {
    pub market_id: B256,
    pub trader: Address,
    /// Signed USDC flow in 6-decimal fixed point. Positive means USDC into
    /// the market, negative means USDC out.
    pub usdc_flow: I256,
}

#[derive(Debug, Clone)]
pub struct MarketResolvedEvent {
    pub market_id: B256,
    pub surplus: U256,
    pub payouts: Vec<U256>,
}

#[derive(Debug, Clone)]
pub struct TokensRedeemedEvent {
    pub market_id: B256,
    pub redeemer: Address,
    pub token_id: U256,
    pub shares: U256,
    pub payout: U256,
}

#[derive(Debug, Clone)]
pub struct SurplusWithdrawnEvent {
    pub market_id: B256,
    pub recipient: Address,
    pub amount: U256,
}

/// Shared payload for `Locked`, `Unlocked` and `StakeUpdated` vault events:
/// raw per-outcome amounts keyed to the market's outcome ordering.
#[derive(Debug, Clone)]
pub struct LockUpdatedEvent {
    pub market_id: B256,
    pub locker: Address,
    pub amounts: Vec<U256>,
}

#[derive(Debug, Clone)]
pub struct SponsoredLockedEvent {
    pub market_id: B256,
    pub locker: Address,
    pub sets_amount: U256,
    pub user_paid: U256,
    pub subsidy_used: U256,
    pub actual_cost: U256,
}

#[derive(Debug, Clone)]
pub struct EpochRootSetEvent {
    pub epoch_id: U256,
    pub root: B256,
}

#[derive(Debug, Clone)]
pub struct RewardClaimedEvent {
    pub epoch_id: U256,
    pub wallet: Address,
    pub amount: U256,
}

/// Every event the system models, produced by the decoder. The match in the
/// ingestion engine is exhaustive, so adding a variant without handling it is
/// a compile error.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    MarketCreated(MarketCreatedEvent),
    MarketTraded(MarketTradedEvent),
    MarketResolved(MarketResolvedEvent),
    TokensRedeemed(TokensRedeemedEvent),
    SurplusWithdrawn(SurplusWithdrawnEvent),
    LockUpdated(LockUpdatedEvent),
    Unlocked(LockUpdatedEvent),
    StakeUpdated(LockUpdatedEvent),
    SponsoredLocked(SponsoredLockedEvent),
    EpochRootSet(EpochRootSetEvent),
    RewardClaimed(RewardClaimedEvent),
}

impl DomainEvent {
    /// Short name used in log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MarketCreated(_) => "market_created",
            Self::MarketTraded(_) => "market_traded",
            Self::MarketResolved(_) => "market_resolved",
            Self::TokensRedeemed(_) => "tokens_redeemed",
            Self::SurplusWithdrawn(_) => "surplus_withdrawn",
            Self::LockUpdated(_) => "lock_updated",
            Self::Unlocked(_) => "unlocked",
            Self::StakeUpdated(_) => "stake_updated",
            Self::SponsoredLocked(_) => "sponsored_locked",
            Self::EpochRootSet(_) => "epoch_root_set",
            Self::RewardClaimed(_) => "reward_claimed",
        }
    }
}
