use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::credit_purchases;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = credit_purchases)]
pub struct CreditPurchaseEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub quantity: i32,
    pub amount_minor: i32,
    pub stripe_payment_intent_id: String,
    pub created_at: DateTime<Utc>,
}

/// `stripe_payment_intent_id` is the idempotency key: the unique index on it
/// turns a replayed insert into a no-op.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_purchases)]
pub struct InsertCreditPurchaseEntity {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub quantity: i32,
    pub amount_minor: i32,
    pub stripe_payment_intent_id: String,
}
