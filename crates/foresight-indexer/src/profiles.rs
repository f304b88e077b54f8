use async_trait::async_trait;

use crate::engine::IngestionEngine;

/// Consumer of drained profile addresses. The real enrichment pipeline
/// (third-party profile scraping) lives outside this system; the indexer only
/// guarantees every touched address is offered to the sink at flush time.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    async fn enrich(&self, addresses: Vec<String>) -> anyhow::Result<()>;
}

/// Default sink: record the batch and move on.
pub struct LoggingProfileSink;

#[async_trait]
impl ProfileSink for LoggingProfileSink {
    async fn enrich(&self, addresses: Vec<String>) -> anyhow::Result<()> {
        tracing::info!(
            "[ProfileSink] 👤 {} address(es) queued for enrichment",
            addresses.len()
        );
        Ok(())
    }
}

impl IngestionEngine {
    pub fn enqueue_profile(&self, address: String) {
        if !self.config.profile_enrichment_enabled {
            return;
        }
        self.profile_queue
            .lock()
            .expect("profile queue poisoned")
            .insert(address);
    }

    /// Hand the queued addresses to the sink. A sink failure requeues the
    /// whole batch for the next flush cycle instead of dropping it.
    pub async fn flush_profiles(&self) -> usize {
        let drained: Vec<String> = {
            let mut queue = self.profile_queue.lock().expect("profile queue poisoned");
            queue.drain().collect()
        };

        if drained.is_empty() {
            return 0;
        }

        let count = drained.len();
        if let Err(e) = self.profile_sink.enrich(drained.clone()).await {
            tracing::warn!(
                error = %e,
                "[IngestionEngine] ♻️ Profile enrichment failed, requeueing {count} address(es)"
            );
            let mut queue = self.profile_queue.lock().expect("profile queue poisoned");
            queue.extend(drained);
            return 0;
        }

        count
    }
}
