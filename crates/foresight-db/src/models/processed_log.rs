use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use serde::{Deserialize, Serialize};

use crate::schema::processed_logs;

/// The idempotence boundary for replay: a row here means "already applied,
/// skip on re-observation".
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = processed_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProcessedLog {
    pub id: i32,
    pub contract: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = processed_logs)]
pub struct NewProcessedLog {
    pub contract: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
}

impl ProcessedLog {
    pub fn is_processed(
        contract: &str,
        tx_hash: &str,
        log_index: i64,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<bool> {
        select(exists(
            processed_logs::table
                .filter(processed_logs::contract.eq(contract))
                .filter(processed_logs::tx_hash.eq(tx_hash))
                .filter(processed_logs::log_index.eq(log_index)),
        ))
        .get_result(conn)
    }

    pub fn record(
        new_record: &NewProcessedLog,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(processed_logs::table)
            .values(new_record)
            .on_conflict((
                processed_logs::contract,
                processed_logs::tx_hash,
                processed_logs::log_index,
            ))
            .do_nothing()
            .execute(conn)
    }

    pub fn count(conn: &mut diesel::PgConnection) -> QueryResult<i64> {
        processed_logs::table.count().get_result(conn)
    }
}
