use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_subscriptions::{
    InsertUserSubscriptionEntity, UserSubscriptionEntity,
};
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

#[async_trait]
#[automock]
pub trait UserSubscriptionRepository {
    /// Finds a subscription in an active-like status (active, trialing,
    /// past_due) for the given user and plan.
    async fn find_active_like_by_user_and_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<UserSubscriptionEntity>>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>>;

    /// Creates the subscription row, or on a provider-reference conflict
    /// updates status and period end instead. Replayed completion events
    /// therefore degrade into a status sync.
    async fn upsert_by_stripe_subscription_id(
        &self,
        subscription: InsertUserSubscriptionEntity,
    ) -> Result<Uuid>;

    /// Returns false when no row carries the provider reference.
    async fn update_status_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool>;
}
