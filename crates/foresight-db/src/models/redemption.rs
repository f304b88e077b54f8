use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::redemptions;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = redemptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Redemption {
    pub id: i32,
    pub market_id: String,
    pub redeemer: String,
    pub token_id: BigDecimal,
    pub shares: BigDecimal,
    pub payout: BigDecimal,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = redemptions)]
pub struct NewRedemption {
    pub market_id: String,
    pub redeemer: String,
    pub token_id: BigDecimal,
    pub shares: BigDecimal,
    pub payout: BigDecimal,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

impl Redemption {
    pub fn insert_or_ignore(
        new_redemption: &NewRedemption,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(redemptions::table)
            .values(new_redemption)
            .on_conflict((redemptions::tx_hash, redemptions::log_index))
            .do_nothing()
            .execute(conn)
    }

    pub fn find_by_market(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Vec<Self>> {
        redemptions::table
            .filter(redemptions::market_id.eq(market_id))
            .order(redemptions::block_number.asc())
            .load(conn)
    }
}
