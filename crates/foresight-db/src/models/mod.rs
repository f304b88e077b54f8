pub mod lock_event;
pub mod market;
pub mod market_state;
pub mod meta;
pub mod price_impact;
pub mod processed_log;
pub mod redemption;
pub mod resolution;
pub mod reward;
pub mod trade;

pub use lock_event::{LockEvent, NewLockEvent};
pub use market::{Market, NewMarket};
pub use market_state::{MarketState, NewMarketState};
pub use meta::{Meta, meta_keys};
pub use price_impact::{NewPriceImpact, PriceImpact};
pub use processed_log::{NewProcessedLog, ProcessedLog};
pub use redemption::{NewRedemption, Redemption};
pub use resolution::{NewResolution, Resolution};
pub use reward::{NewRewardClaim, NewRewardEpoch, RewardClaim, RewardEpoch};
pub use trade::{NewTrade, Trade};
