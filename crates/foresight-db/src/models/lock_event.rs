use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::locks;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = locks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LockEvent {
    pub id: i32,
    pub market_id: String,
    pub locker: String,
    /// One of `lock`, `unlock`, `stake`, `sponsored`.
    pub kind: String,
    /// Raw per-outcome amounts as a JSON array of decimal strings
    /// (lock/unlock/stake kinds only).
    pub amounts: Option<JsonValue>,
    pub total_amount: Option<BigDecimal>,
    pub sets_amount: Option<BigDecimal>,
    pub user_paid: Option<BigDecimal>,
    pub subsidy_used: Option<BigDecimal>,
    pub actual_cost: Option<BigDecimal>,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = locks)]
pub struct NewLockEvent {
    pub market_id: String,
    pub locker: String,
    pub kind: String,
    pub amounts: Option<JsonValue>,
    pub total_amount: Option<BigDecimal>,
    pub sets_amount: Option<BigDecimal>,
    pub user_paid: Option<BigDecimal>,
    pub subsidy_used: Option<BigDecimal>,
    pub actual_cost: Option<BigDecimal>,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub ts: DateTime<Utc>,
}

impl LockEvent {
    pub fn insert_or_ignore(
        new_event: &NewLockEvent,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(locks::table)
            .values(new_event)
            .on_conflict((locks::tx_hash, locks::log_index))
            .do_nothing()
            .execute(conn)
    }

    /// Net sponsored liquidity still locked for a market: cumulative sponsored
    /// cost minus cumulative unlocked amount, floored at zero. Unlocks observed
    /// out of order (or exceeding sponsored cost) never drive this negative.
    pub fn outstanding_boost(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<BigDecimal> {
        let sponsored: Option<BigDecimal> = locks::table
            .filter(locks::market_id.eq(market_id))
            .filter(locks::kind.eq("sponsored"))
            .select(sum(locks::actual_cost))
            .first(conn)?;

        let unlocked: Option<BigDecimal> = locks::table
            .filter(locks::market_id.eq(market_id))
            .filter(locks::kind.eq("unlock"))
            .select(sum(locks::total_amount))
            .first(conn)?;

        Ok(clamp_boost(sponsored, unlocked))
    }

    pub fn find_by_market(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Vec<Self>> {
        locks::table
            .filter(locks::market_id.eq(market_id))
            .order(locks::block_number.asc())
            .load(conn)
    }
}

fn clamp_boost(sponsored: Option<BigDecimal>, unlocked: Option<BigDecimal>) -> BigDecimal {
    let net = sponsored.unwrap_or_default() - unlocked.unwrap_or_default();
    if net < BigDecimal::default() {
        BigDecimal::default()
    } else {
        net
    }
}
