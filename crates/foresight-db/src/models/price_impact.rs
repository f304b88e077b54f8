use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::price_impacts;

/// "Cost to move the top outcome" rows, one per (market, clip). Clips whose
/// binary search hit the share cap have no row at all.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = price_impacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PriceImpact {
    pub id: i32,
    pub market_id: String,
    pub clip_usdc: BigDecimal,
    pub shares: BigDecimal,
    pub delta_prob: BigDecimal,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = price_impacts)]
pub struct NewPriceImpact {
    pub market_id: String,
    pub clip_usdc: BigDecimal,
    pub shares: BigDecimal,
    pub delta_prob: BigDecimal,
    pub computed_at: DateTime<Utc>,
}

impl PriceImpact {
    /// Swap out a market's impact rows atomically. The delete and insert run
    /// in one transaction so readers see the fully-old or fully-new set,
    /// never a mix.
    pub fn replace_for_market(
        market_id: &str,
        rows: &[NewPriceImpact],
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        conn.transaction(|conn| {
            diesel::delete(price_impacts::table.filter(price_impacts::market_id.eq(market_id)))
                .execute(conn)?;
            diesel::insert_into(price_impacts::table)
                .values(rows)
                .execute(conn)
        })
    }

    pub fn find_by_market(
        market_id: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Vec<Self>> {
        price_impacts::table
            .filter(price_impacts::market_id.eq(market_id))
            .order(price_impacts::clip_usdc.asc())
            .load(conn)
    }
}
