mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use task_supervisor::SupervisorBuilder;
use tracing_subscriber::EnvFilter;

use crate::cli::IndexerCli;
use foresight_db::{init_pool, run_migrations};
use foresight_indexer::{
    EventDecoder, IngestionEngine, IngestionTask, LogStore, LoggingProfileSink, ReplayLedger,
    TimestampResolver,
};
use foresight_indexer::fetch::SpanConfig;
use foresight_quoting::{OnChainQuoter, PriceImpactSolver, PriceImpactTask};
use foresight_rewards::{RewardReconciler, RewardsTask};
use foresight_rpc::{EthRpc, JsonRpcClient};

const APP_NAME: &str = "foresight_indexer";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = IndexerCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = cli.indexer_config();

    let rpc: Arc<dyn EthRpc> = Arc::new(JsonRpcClient::new(
        cli.rpc_urls.clone(),
        config.rpc_timeout,
    )?);

    let pool = init_pool(APP_NAME, &cli.database_url)?;
    run_migrations(&pool).await?;

    let decoder = Arc::new(EventDecoder::new(
        config.market_address,
        config.vault_address,
        config.distributor_addresses.iter().copied(),
        config.reward_token_address,
    ));
    let timestamps = Arc::new(TimestampResolver::new(
        rpc.clone(),
        config.timestamp_concurrency,
        config.timestamp_max_attempts,
    ));
    let engine = Arc::new(IngestionEngine::new(
        pool.clone(),
        rpc.clone(),
        Arc::new(LoggingProfileSink),
        config.clone(),
    ));
    let store = LogStore::new(&config.log_store_path);
    let ledger = Arc::new(ReplayLedger::new(
        pool.clone(),
        store.clone(),
        engine.clone(),
        decoder.clone(),
        timestamps.clone(),
    ));

    if cli.backfill_rescan {
        let processed = ledger.replay(true).await?;
        tracing::info!("🧯 Full rescan dispatched {processed} record(s)");
        return Ok(());
    }

    let spans = SpanConfig {
        init: config.span_init,
        min: config.span_min,
        max: config.span_max,
    };

    let ingestion_task = IngestionTask {
        pool: pool.clone(),
        rpc: rpc.clone(),
        config: config.clone(),
        engine: engine.clone(),
        ledger,
        store,
    };

    let reconciler = Arc::new(RewardReconciler::new(
        pool.clone(),
        rpc.clone(),
        engine.clone(),
        decoder,
        timestamps,
        config.distributor_addresses.iter().copied(),
        config.reward_token_address,
        spans,
        config.lookback_days,
    ));
    let rewards_task = RewardsTask::new(
        reconciler,
        Duration::from_secs(cli.rewards_interval_secs),
    );

    let quoter = OnChainQuoter::new(rpc.clone(), config.market_address);
    let price_impact_task = PriceImpactTask::new(
        pool.clone(),
        PriceImpactSolver::new(quoter),
        Duration::from_secs(cli.price_impact_interval_secs),
    );

    let supervisor = SupervisorBuilder::default()
        .with_dead_tasks_threshold(Some(0.5))
        .with_base_restart_delay(Duration::from_millis(500))
        .with_max_restart_attempts(5)
        .with_task_being_stable_after(Duration::from_secs(120))
        .with_health_check_interval(Duration::from_secs(5))
        .with_task("ingestion", ingestion_task)
        .with_task("rewards", rewards_task)
        .with_task("price_impact", price_impact_task)
        .build();

    let handle = supervisor.run();
    handle.wait().await?;
    anyhow::bail!("Indexer supervisor stopped! 😨");
}
