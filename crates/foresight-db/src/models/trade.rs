use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::trades;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Trade {
    pub id: i32,
    pub market_id: String,
    pub trader: String,
    /// Exactly one of `usdc_in` / `usdc_out` is non-zero; the non-zero side
    /// equals the absolute value of the signed on-chain flow.
    pub usdc_in: BigDecimal,
    pub usdc_out: BigDecimal,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = trades)]
pub struct NewTrade {
    pub market_id: String,
    pub trader: String,
    pub usdc_in: BigDecimal,
    pub usdc_out: BigDecimal,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

impl Trade {
    /// Append-only insert; replays of the same `(tx_hash, log_index)` no-op.
    pub fn insert_or_ignore(
        new_trade: &NewTrade,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(trades::table)
            .values(new_trade)
            .on_conflict((trades::tx_hash, trades::log_index))
            .do_nothing()
            .execute(conn)
    }

    pub fn find_by_market(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Vec<Self>> {
        trades::table
            .filter(trades::market_id.eq(market_id))
            .order(trades::block_number.asc())
            .load(conn)
    }

    pub fn count_for_market(market_id: &str, conn: &mut diesel::PgConnection) -> QueryResult<i64> {
        trades::table
            .filter(trades::market_id.eq(market_id))
            .count()
            .get_result(conn)
    }
}
