use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::plans::PlanEntity;

#[async_trait]
#[automock]
pub trait PlanRepository {
    async fn find_active_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;

    /// Resolves the public `productId` of the checkout form (the Stripe
    /// product reference) to an active plan.
    async fn find_active_by_product_ref(
        &self,
        stripe_product_id: &str,
    ) -> Result<Option<PlanEntity>>;

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>>;
}
