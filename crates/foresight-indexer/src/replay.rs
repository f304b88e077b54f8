use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::Context;
use chrono::DateTime;
use deadpool_diesel::postgres::Pool;
use serde_json::{Value as JsonValue, json};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use foresight_db::ForesightPool;
use foresight_db::models::{Meta, NewProcessedLog, ProcessedLog, meta_keys};
use foresight_rpc::RawLog;
use foresight_types::EventContext;

use crate::decode::{EventDecoder, parse_hex_bytes, parse_topics};
use crate::engine::IngestionEngine;
use crate::timestamps::TimestampResolver;

/// One line of the persisted log file, already validated. Field coercion is
/// deliberately lenient: numbers may arrive as JSON numbers or decimal
/// strings, and the tx hash may appear under either historical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLog {
    pub address: Address,
    /// Lowercase hex form of `address`, reused for dedup keys.
    pub address_hex: String,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    pub data: String,
    pub topics: Vec<String>,
    pub removed: bool,
}

fn coerce_u64(value: &JsonValue) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Parse one JSONL line. `None` means the line is skipped: not JSON, or its
/// address / block number / log index / tx hash fail to coerce.
pub fn parse_stored_line(line: &str) -> Option<StoredLog> {
    let value: JsonValue = serde_json::from_str(line).ok()?;

    let address_hex = value.get("address")?.as_str()?.to_lowercase();
    let address: Address = address_hex.parse().ok()?;

    let block_number = coerce_u64(value.get("blockNumber")?)?;
    let log_index = coerce_u64(value.get("logIndex")?)?;

    let tx_hash = value
        .get("txHash")
        .or_else(|| value.get("transactionHash"))?
        .as_str()?
        .to_lowercase();
    tx_hash.parse::<B256>().ok()?;

    let data = value
        .get("data")
        .and_then(JsonValue::as_str)
        .unwrap_or("0x")
        .to_string();

    let topics = value
        .get("topics")
        .and_then(JsonValue::as_array)
        .map(|raw| {
            raw.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let removed = value
        .get("removed")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);

    Some(StoredLog {
        address,
        address_hex,
        block_number,
        log_index,
        tx_hash,
        data,
        topics,
        removed,
    })
}

/// Result of scanning the log file from a byte offset.
#[derive(Debug)]
pub struct ScanOutcome {
    pub records: Vec<StoredLog>,
    /// Offset the scan actually started from (0 after a truncation reset).
    pub start_offset: u64,
    /// Bytes consumed by fully-read lines; the next offset is
    /// `start_offset + consumed_bytes`.
    pub consumed_bytes: u64,
    pub malformed: usize,
}

/// Append-only JSON-Lines store of every raw log the network loop observes.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a batch in arrival order, one JSON object per line.
    pub async fn append(&self, logs: &[RawLog]) -> anyhow::Result<usize> {
        if logs.is_empty() {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open log store {}", self.path.display()))?;

        let mut buffer = String::new();
        for log in logs {
            let line = json!({
                "blockNumber": log.block_number,
                "blockHash": log.block_hash,
                "transactionIndex": log.transaction_index,
                "logIndex": log.log_index,
                "txHash": log.transaction_hash.to_lowercase(),
                "address": log.address.to_lowercase(),
                "data": log.data,
                "topics": log.topics,
                "removed": log.removed,
            });
            buffer.push_str(&line.to_string());
            buffer.push('\n');
        }

        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(logs.len())
    }

    /// Read every complete line from `offset` onward. An offset past the
    /// current file size means the file was rotated or truncated externally;
    /// the scan restarts from 0. A trailing line without a newline is an
    /// in-progress append and is left for the next scan.
    pub async fn scan_from(&self, offset: u64) -> anyhow::Result<ScanOutcome> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ScanOutcome {
                    records: Vec::new(),
                    start_offset: 0,
                    consumed_bytes: 0,
                    malformed: 0,
                });
            }
            Err(e) => return Err(e).context("open log store for replay"),
        };

        let file_size = file.metadata().await?.len();
        let start_offset = if offset > file_size {
            tracing::warn!(
                "[LogStore] 🔄 Stored offset {offset} exceeds file size {file_size}, rescanning from 0"
            );
            0
        } else {
            offset
        };

        file.seek(SeekFrom::Start(start_offset)).await?;
        let mut reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut consumed_bytes = 0u64;
        let mut malformed = 0usize;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes = reader.read_line(&mut line).await?;
            if bytes == 0 {
                break;
            }
            if !line.ends_with('\n') {
                // Partial tail from a concurrent append; do not consume it.
                break;
            }
            consumed_bytes += bytes as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_stored_line(trimmed) {
                Some(record) => records.push(record),
                None => malformed += 1,
            }
        }

        Ok(ScanOutcome {
            records,
            start_offset,
            consumed_bytes,
            malformed,
        })
    }
}

/// Resumable, idempotent re-application of the persisted log store. The
/// store plus the durable offset make this the crash-recovery path: a crash
/// mid-replay only repeats records the dedup ledger already no-ops.
pub struct ReplayLedger {
    pool: Pool,
    store: LogStore,
    engine: Arc<IngestionEngine>,
    decoder: Arc<EventDecoder>,
    timestamps: Arc<TimestampResolver>,
}

impl ReplayLedger {
    pub fn new(
        pool: Pool,
        store: LogStore,
        engine: Arc<IngestionEngine>,
        decoder: Arc<EventDecoder>,
        timestamps: Arc<TimestampResolver>,
    ) -> Self {
        Self {
            pool,
            store,
            engine,
            decoder,
            timestamps,
        }
    }

    /// Apply every not-yet-processed record from the stored offset (or from
    /// the beginning when forced). Returns how many records were dispatched.
    pub async fn replay(&self, force_full_rescan: bool) -> anyhow::Result<usize> {
        let offset = if force_full_rescan {
            0
        } else {
            self.pool
                .interact_with_context("load jsonl offset".to_string(), |conn| {
                    Meta::get_u64(meta_keys::JSONL_OFFSET, conn)
                })
                .await?
                .unwrap_or(0)
        };

        let outcome = self.store.scan_from(offset).await?;
        if outcome.malformed > 0 {
            tracing::warn!(
                "[ReplayLedger] 🗑️ Skipped {} malformed line(s) in log store",
                outcome.malformed
            );
        }

        // Guards against duplicate lines within this file read; the
        // processed-log table guards across runs.
        let mut seen_keys: HashSet<(String, String, u64)> = HashSet::new();
        let mut processed = 0usize;

        for record in &outcome.records {
            let key = (
                record.address_hex.clone(),
                record.tx_hash.clone(),
                record.log_index,
            );
            if !seen_keys.insert(key) {
                continue;
            }

            let Some(kind) = self.decoder.contract_kind(record.address) else {
                continue;
            };

            let (contract, tx_hash, log_index) = (
                record.address_hex.clone(),
                record.tx_hash.clone(),
                i64::try_from(record.log_index)?,
            );
            let already = self
                .pool
                .interact_with_context(
                    format!("check processed log {tx_hash}#{log_index}"),
                    move |conn| ProcessedLog::is_processed(&contract, &tx_hash, log_index, conn),
                )
                .await?;
            if already {
                continue;
            }

            let ts = self.timestamps.resolve(record.block_number).await?;
            let block_timestamp = DateTime::from_timestamp(i64::try_from(ts)?, 0)
                .with_context(|| format!("invalid timestamp {ts} for block {}", record.block_number))?;

            let ctx = EventContext {
                contract: record.address,
                tx_hash: record.tx_hash.parse()?,
                log_index: record.log_index,
                block_number: record.block_number,
                block_timestamp,
            };

            let decoded = parse_topics(&record.topics)
                .zip(parse_hex_bytes(&record.data))
                .and_then(|(topics, data)| self.decoder.decode(kind, &topics, &data));

            match decoded {
                Some(event) => {
                    tracing::debug!(
                        "[ReplayLedger] ⚙️ Applying {} from block {}",
                        event.name(),
                        record.block_number
                    );
                    self.engine.apply(&event, &ctx).await?;
                }
                None => {
                    tracing::debug!(
                        "[ReplayLedger] 🫥 Unmodeled log at {}#{} skipped",
                        record.tx_hash,
                        record.log_index
                    );
                }
            }

            let dedup = NewProcessedLog {
                contract: record.address_hex.clone(),
                tx_hash: record.tx_hash.clone(),
                log_index: i64::try_from(record.log_index)?,
                block_number: i64::try_from(record.block_number)?,
            };
            self.pool
                .interact_with_context(
                    format!("record processed log {}#{}", dedup.tx_hash, dedup.log_index),
                    move |conn| ProcessedLog::record(&dedup, conn),
                )
                .await?;

            processed += 1;
        }

        // Offset advances by exactly the bytes consumed, never recomputed
        // from the file size (appends may have landed mid-scan).
        let next_offset = outcome.start_offset + outcome.consumed_bytes;
        self.pool
            .interact_with_context("store jsonl offset".to_string(), move |conn| {
                Meta::set_u64(meta_keys::JSONL_OFFSET, next_offset, conn)
            })
            .await?;

        self.engine.flush_snapshots().await;
        self.engine.flush_profiles().await;

        if processed > 0 {
            tracing::info!("[ReplayLedger] ✅ Dispatched {processed} record(s) from log store");
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_numeric_fields() {
        let line = r#"{"blockNumber": 123, "logIndex": 4, "txHash": "0xAA00000000000000000000000000000000000000000000000000000000000011", "address": "0x00000000000000000000000000000000000000A1", "data": "0x", "topics": []}"#;
        let record = parse_stored_line(line).unwrap();
        assert_eq!(record.block_number, 123);
        assert_eq!(record.log_index, 4);
        // Hash and address are normalized to lowercase.
        assert_eq!(
            record.tx_hash,
            "0xaa00000000000000000000000000000000000000000000000000000000000011"
        );
        assert_eq!(
            record.address_hex,
            "0x00000000000000000000000000000000000000a1"
        );
        assert!(!record.removed);
    }

    #[test]
    fn test_parse_line_with_decimal_string_fields_and_alias() {
        let line = r#"{"blockNumber": "456", "logIndex": "0", "transactionHash": "0xbb00000000000000000000000000000000000000000000000000000000000022", "address": "0x00000000000000000000000000000000000000b2", "topics": ["0x1111111111111111111111111111111111111111111111111111111111111111"]}"#;
        let record = parse_stored_line(line).unwrap();
        assert_eq!(record.block_number, 456);
        assert_eq!(record.log_index, 0);
        assert_eq!(record.data, "0x");
        assert_eq!(record.topics.len(), 1);
    }

    #[test]
    fn test_parse_line_rejects_bad_address_and_numbers() {
        // Not hex.
        assert!(parse_stored_line(
            r#"{"blockNumber": 1, "logIndex": 0, "txHash": "0xcc00000000000000000000000000000000000000000000000000000000000033", "address": "not-an-address"}"#
        )
        .is_none());
        // Unparsable block number.
        assert!(parse_stored_line(
            r#"{"blockNumber": "12x", "logIndex": 0, "txHash": "0xcc00000000000000000000000000000000000000000000000000000000000033", "address": "0x00000000000000000000000000000000000000a1"}"#
        )
        .is_none());
        // Not JSON at all.
        assert!(parse_stored_line("garbage").is_none());
    }

    fn raw_log(block: u64, index: u64, tx: &str) -> RawLog {
        serde_json::from_value(json!({
            "address": "0x00000000000000000000000000000000000000A1",
            "topics": ["0x1111111111111111111111111111111111111111111111111111111111111111"],
            "data": "0x01",
            "blockNumber": format!("{block:#x}"),
            "transactionHash": tx,
            "logIndex": format!("{index:#x}"),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_append_then_scan_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("logs.jsonl"));

        let tx = "0xDD00000000000000000000000000000000000000000000000000000000000044";
        store
            .append(&[raw_log(10, 0, tx), raw_log(10, 1, tx)])
            .await
            .unwrap();

        let outcome = store.scan_from(0).await.unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.malformed, 0);
        assert_eq!(outcome.records[0].block_number, 10);
        // Writer lowercases hashes on the way in.
        assert!(outcome.records[0].tx_hash.starts_with("0xdd"));

        // A second scan from the consumed offset sees nothing new.
        let next = store
            .scan_from(outcome.start_offset + outcome.consumed_bytes)
            .await
            .unwrap();
        assert!(next.records.is_empty());
        assert_eq!(next.consumed_bytes, 0);
    }

    #[tokio::test]
    async fn test_scan_resets_offset_past_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("logs.jsonl"));
        store
            .append(&[raw_log(
                5,
                0,
                "0xee00000000000000000000000000000000000000000000000000000000000055",
            )])
            .await
            .unwrap();

        let outcome = store.scan_from(1_000_000).await.unwrap();
        assert_eq!(outcome.start_offset, 0);
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_skips_malformed_but_consumes_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.jsonl");
        let store = LogStore::new(path.clone());
        store
            .append(&[raw_log(
                5,
                0,
                "0xee00000000000000000000000000000000000000000000000000000000000055",
            )])
            .await
            .unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"not json\n")
            .await
            .unwrap();

        let outcome = store.scan_from(0).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.malformed, 1);

        let size = tokio::fs::metadata(&path).await.unwrap().len();
        assert_eq!(outcome.consumed_bytes, size);
    }

    #[tokio::test]
    async fn test_scan_leaves_partial_tail_for_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.jsonl");
        let store = LogStore::new(path.clone());
        store
            .append(&[raw_log(
                5,
                0,
                "0xee00000000000000000000000000000000000000000000000000000000000055",
            )])
            .await
            .unwrap();

        let complete_size = tokio::fs::metadata(&path).await.unwrap().len();

        // Simulate an in-progress append: no trailing newline yet.
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"{\"blockNumber\": 6")
            .await
            .unwrap();

        let outcome = store.scan_from(0).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.malformed, 0);
        assert_eq!(outcome.consumed_bytes, complete_size);
    }
}
