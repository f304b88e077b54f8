use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::resolutions;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = resolutions)]
#[diesel(primary_key(market_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Resolution {
    pub market_id: String,
    pub surplus: BigDecimal,
    /// Per-outcome payout fractions as a JSON array of decimal strings.
    pub payouts: JsonValue,
    pub tx_hash: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = resolutions)]
pub struct NewResolution {
    pub market_id: String,
    pub surplus: BigDecimal,
    pub payouts: JsonValue,
    pub tx_hash: String,
    pub ts: DateTime<Utc>,
}

impl Resolution {
    /// A market resolves exactly once; replays no-op.
    pub fn insert_or_ignore(
        new_resolution: &NewResolution,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(resolutions::table)
            .values(new_resolution)
            .on_conflict(resolutions::market_id)
            .do_nothing()
            .execute(conn)
    }

    pub fn find(market_id: &str, conn: &mut diesel::PgConnection) -> QueryResult<Self> {
        resolutions::table.find(market_id).first(conn)
    }
}
