pub mod events;
pub mod hex;
pub mod numeric;

pub use events::{
    ContractKind, DomainEvent, EpochRootSetEvent, EventContext, LockKind, LockUpdatedEvent,
    MarketCreatedEvent, MarketResolvedEvent, MarketTradedEvent, RewardClaimedEvent,
    SponsoredLockedEvent, SurplusWithdrawnEvent, TokensRedeemedEvent,
};
pub use hex::{address_to_hex, b256_to_hex};
pub use numeric::{i256_to_bigdecimal, u256_to_bigdecimal, u256_to_decimal_string};
