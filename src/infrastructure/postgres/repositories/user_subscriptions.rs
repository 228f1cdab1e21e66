use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, insert_into, prelude::*, update, upsert::excluded,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::user_subscriptions::{InsertUserSubscriptionEntity, UserSubscriptionEntity},
    repositories::user_subscriptions::UserSubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad, schema::user_subscriptions,
};

const ACTIVE_LIKE_STATUSES: [&str; 3] = ["active", "trialing", "past_due"];

pub struct UserSubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserSubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserSubscriptionRepository for UserSubscriptionPostgres {
    async fn find_active_like_by_user_and_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .filter(user_subscriptions::plan_id.eq(plan_id))
            .filter(user_subscriptions::status.eq_any(ACTIVE_LIKE_STATUSES))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn upsert_by_stripe_subscription_id(
        &self,
        subscription: InsertUserSubscriptionEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // A replayed completion event conflicts on the provider reference and
        // degrades into a status/period sync of the existing row.
        let subscription_id = insert_into(user_subscriptions::table)
            .values(&subscription)
            .on_conflict(user_subscriptions::stripe_subscription_id)
            .do_update()
            .set((
                user_subscriptions::status.eq(excluded(user_subscriptions::status)),
                user_subscriptions::ends_at.eq(excluded(user_subscriptions::ends_at)),
                user_subscriptions::updated_at.eq(Utc::now()),
            ))
            .returning(user_subscriptions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(subscription_id)
    }

    async fn update_status_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated_rows = update(
            user_subscriptions::table
                .filter(user_subscriptions::stripe_subscription_id.eq(stripe_subscription_id)),
        )
        .set((
            user_subscriptions::status.eq(status.to_string()),
            user_subscriptions::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated_rows > 0)
    }
}
