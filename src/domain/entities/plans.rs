use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::plans;

/// A purchasable catalog entry mapping to a Stripe product/price pair.
/// Immutable once referenced by a purchase; `price_minor` is the
/// authoritative unit price for credit computation.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub price_minor: i32,
    pub currency: String,
    pub interval: Option<String>,
    pub stripe_product_id: String,
    pub stripe_price_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
