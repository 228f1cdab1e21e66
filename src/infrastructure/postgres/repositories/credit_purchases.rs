use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::{
        credit_purchases::InsertCreditPurchaseEntity, invoices::InsertInvoiceEntity,
    },
    repositories::credit_purchases::{
        CreditPurchaseRepository, PurchaseInvoiceDraft, PurchaseOutcome,
    },
    value_objects::enums::invoice_statuses::InvoiceStatus,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{credit_purchases, invoices, users},
};

pub struct CreditPurchasePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditPurchasePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CreditPurchaseRepository for CreditPurchasePostgres {
    async fn record_completed_purchase(
        &self,
        purchase: InsertCreditPurchaseEntity,
        credits_delta: i32,
        invoice: PurchaseInvoiceDraft,
    ) -> Result<PurchaseOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The unique index on stripe_payment_intent_id is the idempotency
        // guard: a concurrent or replayed delivery loses the insert and the
        // whole transaction degrades into a no-op.
        let outcome = conn.transaction::<PurchaseOutcome, anyhow::Error, _>(|conn| {
            let inserted_purchase_id = insert_into(credit_purchases::table)
                .values(&purchase)
                .on_conflict(credit_purchases::stripe_payment_intent_id)
                .do_nothing()
                .returning(credit_purchases::id)
                .get_result::<Uuid>(conn)
                .optional()?;

            let purchase_id = match inserted_purchase_id {
                Some(purchase_id) => purchase_id,
                None => return Ok(PurchaseOutcome::AlreadyProcessed),
            };

            update(users::table.filter(users::id.eq(purchase.user_id)))
                .set((
                    users::credits.eq(users::credits + credits_delta),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            insert_into(invoices::table)
                .values(&InsertInvoiceEntity {
                    user_id: purchase.user_id,
                    credit_purchase_id: Some(purchase_id),
                    user_subscription_id: None,
                    stripe_invoice_id: invoice.stripe_invoice_id.clone(),
                    amount_minor: invoice.amount_minor,
                    status: InvoiceStatus::Paid.to_string(),
                    pdf_url: None,
                    due_at: None,
                    paid_at: Some(Utc::now()),
                })
                .execute(conn)?;

            Ok(PurchaseOutcome::Applied)
        })?;

        Ok(outcome)
    }
}
