use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::meta;

/// Keys for every cursor/offset/watermark the indexer persists.
pub mod meta_keys {
    /// Network-driven cursor: highest block fully fetched into the log store.
    pub const LAST_BLOCK_SYNCED: &str = "last_block_synced";
    /// Byte offset into the JSONL log file consumed by replay.
    pub const JSONL_OFFSET: &str = "jsonl_offset";
    /// Reward-reconciler block watermark.
    pub const REWARDS_LAST_BLOCK: &str = "rewards_last_block";
    /// Wall-clock timestamp of the last successful reconciliation pass.
    pub const REWARDS_LAST_SYNCED_AT: &str = "rewards_last_synced_at";
}

/// Generic key/value row backing all cursor state. Values are strings; the
/// typed accessors parse on the way out.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = meta)]
#[diesel(primary_key(key))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Meta {
    pub key: String,
    pub value: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Meta {
    pub fn get(key: &str, conn: &mut diesel::PgConnection) -> QueryResult<Option<String>> {
        meta::table
            .find(key)
            .select(meta::value)
            .first(conn)
            .optional()
    }

    pub fn set(key: &str, value: &str, conn: &mut diesel::PgConnection) -> QueryResult<usize> {
        diesel::insert_into(meta::table)
            .values((
                meta::key.eq(key),
                meta::value.eq(value),
                meta::updated_at.eq(Utc::now()),
            ))
            .on_conflict(meta::key)
            .do_update()
            .set((meta::value.eq(value), meta::updated_at.eq(Utc::now())))
            .execute(conn)
    }

    /// Missing or unparsable values read as `None`; a corrupt cursor must not
    /// wedge startup.
    pub fn get_u64(key: &str, conn: &mut diesel::PgConnection) -> QueryResult<Option<u64>> {
        Ok(Self::get(key, conn)?.and_then(|v| v.parse::<u64>().ok()))
    }

    pub fn set_u64(key: &str, value: u64, conn: &mut diesel::PgConnection) -> QueryResult<usize> {
        Self::set(key, &value.to_string(), conn)
    }
}
