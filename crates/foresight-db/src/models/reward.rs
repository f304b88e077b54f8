use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use serde::{Deserialize, Serialize};

use crate::schema::{reward_claims, reward_epochs};

/// One Merkle-root publication per epoch.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = reward_epochs)]
#[diesel(primary_key(epoch_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RewardEpoch {
    /// Decimal-string epoch id, normalized from the chain-native integer.
    pub epoch_id: String,
    pub root: String,
    pub tx_hash: String,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = reward_epochs)]
pub struct NewRewardEpoch {
    pub epoch_id: String,
    pub root: String,
    pub tx_hash: String,
    pub block_time: DateTime<Utc>,
}

impl RewardEpoch {
    /// A re-published root for the same epoch replaces the previous one.
    pub fn upsert(
        new_epoch: &NewRewardEpoch,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Self> {
        diesel::insert_into(reward_epochs::table)
            .values(new_epoch)
            .on_conflict(reward_epochs::epoch_id)
            .do_update()
            .set((
                reward_epochs::root.eq(&new_epoch.root),
                reward_epochs::tx_hash.eq(&new_epoch.tx_hash),
                reward_epochs::block_time.eq(new_epoch.block_time),
            ))
            .get_result(conn)
    }

    pub fn find_all(conn: &mut diesel::PgConnection) -> QueryResult<Vec<Self>> {
        reward_epochs::table
            .order(reward_epochs::block_time.asc())
            .load(conn)
    }
}

/// One recorded claim per `(epoch_id, wallet)`, however it was observed.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = reward_claims)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RewardClaim {
    pub id: i32,
    pub epoch_id: String,
    pub wallet: String,
    pub amount: BigDecimal,
    pub tx_hash: String,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = reward_claims)]
pub struct NewRewardClaim {
    pub epoch_id: String,
    pub wallet: String,
    pub amount: BigDecimal,
    pub tx_hash: String,
    pub block_time: DateTime<Utc>,
}

impl RewardClaim {
    /// First observation wins; the direct-event path and the
    /// transfer-inference path both funnel through this insert.
    pub fn insert_or_ignore(
        new_claim: &NewRewardClaim,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(reward_claims::table)
            .values(new_claim)
            .on_conflict((reward_claims::epoch_id, reward_claims::wallet))
            .do_nothing()
            .execute(conn)
    }

    /// Claim-by-tx index used to skip transfer-inferred claims whose
    /// transaction already produced a direct-event claim.
    pub fn exists_by_tx_hash(tx_hash: &str, conn: &mut diesel::PgConnection) -> QueryResult<bool> {
        select(exists(
            reward_claims::table.filter(reward_claims::tx_hash.eq(tx_hash)),
        ))
        .get_result(conn)
    }

    pub fn find_by_wallet(
        wallet: &str,
        conn: &mut diesel::PgConnection,
    ) -> QueryResult<Vec<Self>> {
        reward_claims::table
            .filter(reward_claims::wallet.eq(wallet))
            .order(reward_claims::block_time.asc())
            .load(conn)
    }
}
