use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;

/// Everything the ingestion side reads from the environment. Parsed by the
/// binary's CLI layer and passed in by value; components never touch env vars
/// themselves.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Prediction-market AMM / factory contract.
    pub market_address: Address,
    /// Liquidity vault emitting lock/unlock/stake/sponsored events.
    pub vault_address: Address,
    /// One or more reward distributors (Merkle roots + claims).
    pub distributor_addresses: Vec<Address>,
    /// ERC-20 reward token, watched for transfers out of the distributors.
    pub reward_token_address: Address,

    /// How far back to scan on a fresh store, in days.
    pub lookback_days: u64,

    /// Adaptive fetch span bounds, in blocks.
    pub span_init: u64,
    pub span_min: u64,
    pub span_max: u64,

    /// Fixed timeout raced against every RPC request.
    pub rpc_timeout: Duration,
    /// Bounded attempts for per-block timestamp resolution.
    pub timestamp_max_attempts: u32,
    /// Permits on the block-timestamp concurrency gate.
    pub timestamp_concurrency: usize,

    /// Minimum seconds between recorded snapshot requests per market.
    pub snapshot_debounce_secs: i64,
    /// Whether drained profile addresses are handed to the enrichment sink.
    pub profile_enrichment_enabled: bool,

    /// JSON-Lines log store backing replay.
    pub log_store_path: PathBuf,
    /// Sleep between chain-head polls once caught up.
    pub poll_interval: Duration,
    /// Cadence of the forced snapshot sweep over unresolved markets.
    pub snapshot_sweep_interval: Duration,
}

impl IndexerConfig {
    pub const DEFAULT_SPAN_INIT: u64 = 500;
    pub const DEFAULT_SPAN_MIN: u64 = 10;
    pub const DEFAULT_SPAN_MAX: u64 = 5_000;
    pub const DEFAULT_LOOKBACK_DAYS: u64 = 30;
    pub const DEFAULT_TIMESTAMP_CONCURRENCY: usize = 2;
    pub const DEFAULT_TIMESTAMP_MAX_ATTEMPTS: u32 = 6;
    pub const DEFAULT_SNAPSHOT_DEBOUNCE_SECS: i64 = 120;

    pub fn watched_addresses(&self) -> Vec<Address> {
        let mut addresses = vec![self.market_address, self.vault_address];
        addresses.extend(self.distributor_addresses.iter().copied());
        addresses
    }
}
