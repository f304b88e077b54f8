use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::{markets, resolutions};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = markets)]
#[diesel(primary_key(market_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Market {
    pub market_id: String,
    pub creator: String,
    pub oracle: String,
    pub surplus_recipient: String,
    pub question_id: String,
    /// Ordered outcome names, as a JSON array of strings.
    pub outcome_names: JsonValue,
    pub metadata: Option<Vec<u8>>,
    pub created_tx_hash: String,
    pub created_block: i64,
    pub created_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = markets)]
pub struct NewMarket {
    pub market_id: String,
    pub creator: String,
    pub oracle: String,
    pub surplus_recipient: String,
    pub question_id: String,
    pub outcome_names: JsonValue,
    pub metadata: Option<Vec<u8>>,
    pub created_tx_hash: String,
    pub created_block: i64,
    pub created_ts: DateTime<Utc>,
}

impl Market {
    /// First-writer-wins creation: a market row is immutable once observed.
    /// Returns the number of rows actually inserted (0 or 1).
    pub fn insert_or_ignore(
        new_market: &NewMarket,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(markets::table)
            .values(new_market)
            .on_conflict(markets::market_id)
            .do_nothing()
            .execute(conn)
    }

    pub fn exists(market_id: &str, conn: &mut diesel::PgConnection) -> QueryResult<bool> {
        select(exists(
            markets::table.filter(markets::market_id.eq(market_id)),
        ))
        .get_result(conn)
    }

    pub fn find(market_id: &str, conn: &mut diesel::PgConnection) -> QueryResult<Self> {
        markets::table.find(market_id).first(conn)
    }

    pub fn find_all(conn: &mut diesel::PgConnection) -> QueryResult<Vec<Self>> {
        markets::table.order(markets::created_block.asc()).load(conn)
    }

    /// Markets with no resolution row yet. These are the markets the snapshot
    /// sweep and the price-impact refresh iterate over.
    pub fn find_unresolved(conn: &mut diesel::PgConnection) -> QueryResult<Vec<Self>> {
        markets::table
            .filter(markets::market_id.ne_all(resolutions::table.select(resolutions::market_id)))
            .order(markets::created_block.asc())
            .load(conn)
    }
}
