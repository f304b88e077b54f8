use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::market_state;

/// A point-in-time read of on-chain bonding-curve state. Rows are appended,
/// never updated.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = market_state)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MarketState {
    pub id: i32,
    pub market_id: String,
    pub ts: DateTime<Utc>,
    pub total_usdc: BigDecimal,
    /// Outstanding per-outcome share quantities as a JSON array of decimal
    /// strings.
    pub total_q: JsonValue,
    pub alpha: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = market_state)]
pub struct NewMarketState {
    pub market_id: String,
    pub ts: DateTime<Utc>,
    pub total_usdc: BigDecimal,
    pub total_q: JsonValue,
    pub alpha: BigDecimal,
}

impl MarketState {
    pub fn append(
        new_state: &NewMarketState,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Self> {
        diesel::insert_into(market_state::table)
            .values(new_state)
            .get_result(conn)
    }

    pub fn latest_for_market(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Self> {
        market_state::table
            .filter(market_state::market_id.eq(market_id))
            .order(market_state::ts.desc())
            .first(conn)
    }
}
