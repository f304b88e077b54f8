use std::path::PathBuf;

use alloy::primitives::Address;
use clap::Parser;
use url::Url;

use foresight_indexer::IndexerConfig;

#[derive(Parser, Debug)]
#[command(name = "foresight-indexer", about = "On-chain prediction-market indexer")]
pub struct IndexerCli {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Ordered RPC endpoints; the first healthy one is preferred.
    #[arg(long, env = "RPC_URLS", value_delimiter = ',')]
    pub rpc_urls: Vec<Url>,

    #[arg(long, env = "MARKET_ADDRESS")]
    pub market_address: Address,

    #[arg(long, env = "VAULT_ADDRESS")]
    pub vault_address: Address,

    /// One or more reward distributor contracts.
    #[arg(long, env = "DISTRIBUTOR_ADDRESSES", value_delimiter = ',')]
    pub distributor_addresses: Vec<Address>,

    #[arg(long, env = "REWARD_TOKEN_ADDRESS")]
    pub reward_token_address: Address,

    /// Historical window scanned on a fresh store, in days.
    #[arg(long, env = "LOOKBACK_DAYS", default_value_t = IndexerConfig::DEFAULT_LOOKBACK_DAYS)]
    pub lookback_days: u64,

    #[arg(long, env = "FETCH_SPAN_INIT", default_value_t = IndexerConfig::DEFAULT_SPAN_INIT)]
    pub span_init: u64,

    #[arg(long, env = "FETCH_SPAN_MIN", default_value_t = IndexerConfig::DEFAULT_SPAN_MIN)]
    pub span_min: u64,

    #[arg(long, env = "FETCH_SPAN_MAX", default_value_t = IndexerConfig::DEFAULT_SPAN_MAX)]
    pub span_max: u64,

    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 15)]
    pub rpc_timeout_secs: u64,

    #[arg(
        long,
        env = "TIMESTAMP_CONCURRENCY",
        default_value_t = IndexerConfig::DEFAULT_TIMESTAMP_CONCURRENCY
    )]
    pub timestamp_concurrency: usize,

    #[arg(
        long,
        env = "TIMESTAMP_MAX_ATTEMPTS",
        default_value_t = IndexerConfig::DEFAULT_TIMESTAMP_MAX_ATTEMPTS
    )]
    pub timestamp_max_attempts: u32,

    #[arg(
        long,
        env = "SNAPSHOT_DEBOUNCE_SECONDS",
        default_value_t = IndexerConfig::DEFAULT_SNAPSHOT_DEBOUNCE_SECS
    )]
    pub snapshot_debounce_secs: i64,

    #[arg(long, env = "ENABLE_PROFILE_ENRICHMENT", default_value_t = false)]
    pub enable_profile_enrichment: bool,

    #[arg(long, env = "LOG_STORE_PATH", default_value = "foresight-logs.jsonl")]
    pub log_store_path: PathBuf,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 15)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "SNAPSHOT_SWEEP_INTERVAL_SECS", default_value_t = 600)]
    pub snapshot_sweep_interval_secs: u64,

    #[arg(long, env = "REWARDS_INTERVAL_SECS", default_value_t = 300)]
    pub rewards_interval_secs: u64,

    #[arg(long, env = "PRICE_IMPACT_INTERVAL_SECS", default_value_t = 600)]
    pub price_impact_interval_secs: u64,

    /// Re-apply the whole log store from byte 0 and exit. Offline backfill
    /// entry point; the dedup ledger makes it a no-op for known records.
    #[arg(long, default_value_t = false)]
    pub backfill_rescan: bool,
}

impl IndexerCli {
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            market_address: self.market_address,
            vault_address: self.vault_address,
            distributor_addresses: self.distributor_addresses.clone(),
            reward_token_address: self.reward_token_address,
            lookback_days: self.lookback_days,
            span_init: self.span_init,
            span_min: self.span_min,
            span_max: self.span_max,
            rpc_timeout: std::time::Duration::from_secs(self.rpc_timeout_secs),
            timestamp_max_attempts: self.timestamp_max_attempts,
            timestamp_concurrency: self.timestamp_concurrency,
            snapshot_debounce_secs: self.snapshot_debounce_secs,
            profile_enrichment_enabled: self.enable_profile_enrichment,
            log_store_path: self.log_store_path.clone(),
            poll_interval: std::time::Duration::from_secs(self.poll_interval_secs),
            snapshot_sweep_interval: std::time::Duration::from_secs(
                self.snapshot_sweep_interval_secs,
            ),
        }
    }
}
